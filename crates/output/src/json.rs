use report_core::{
    stats::{self, merge_stats},
    HostStats, OutcomeCounts, ReportResult,
};
use serde::Serialize;

use crate::format::is_reportable;
use crate::{ReportEvent, ReportOptions, ReportRenderer};

/// 机器可读的JSON报告
pub struct JsonRenderer;

#[derive(Serialize)]
struct JsonReport<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    events: Option<Vec<&'a ReportEvent>>,
    stats: HostStats,
    totals: OutcomeCounts,
}

impl ReportRenderer for JsonRenderer {
    fn name(&self) -> &'static str {
        "json"
    }

    fn produce_report(&self, events: &[ReportEvent], options: &ReportOptions) -> ReportResult<String> {
        let mut host_stats = HostStats::new();
        for event in events {
            match event {
                ReportEvent::Playbook(report) => {
                    merge_stats(&mut host_stats, &stats::playbook_stats(&report.tasks));
                }
                ReportEvent::Task(task) if is_reportable(task, options.verbose) => {
                    merge_stats(&mut host_stats, &stats::task_stats(task));
                }
                ReportEvent::Task(_) => {}
            }
        }

        let report = JsonReport {
            events: (!options.stats_only).then(|| events.iter().collect()),
            totals: stats::totals(&host_stats),
            stats: host_stats,
        };
        Ok(serde_json::to_string_pretty(&report)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{playbook, task};
    use crate::PlaybookReport;
    use report_core::TaskResult;
    use serde_json::Value;

    #[test]
    fn test_json_report() {
        let events = vec![
            ReportEvent::Playbook(PlaybookReport {
                playbook: playbook("/srv/site.yml", None),
                user: None,
                tasks: vec![task("web1", Some("copy"), TaskResult::Ok, true)],
            }),
            ReportEvent::Task(task("db1", None, TaskResult::Failed, false)),
        ];

        let rendered = JsonRenderer
            .produce_report(&events, &ReportOptions::default())
            .unwrap();
        let value: Value = serde_json::from_str(&rendered).unwrap();

        assert_eq!(value["events"][0]["type"], "playbook");
        assert_eq!(value["events"][0]["playbook"]["path"], "/srv/site.yml");
        assert_eq!(value["events"][0]["tasks"][0]["result"], "OK");
        assert_eq!(value["events"][1]["type"], "task");
        assert_eq!(value["events"][1]["hostname"], "db1");
        assert_eq!(value["stats"]["web1"]["changed"], 1);
        assert_eq!(value["totals"]["failed"], 1);
    }

    #[test]
    fn test_stats_only_omits_events() {
        let events = vec![ReportEvent::Task(task("db1", None, TaskResult::Failed, false))];
        let options = ReportOptions {
            stats_only: true,
            ..ReportOptions::default()
        };
        let value: Value =
            serde_json::from_str(&JsonRenderer.produce_report(&events, &options).unwrap()).unwrap();
        assert!(value.get("events").is_none());
        assert_eq!(value["stats"]["db1"]["failed"], 1);
    }
}
