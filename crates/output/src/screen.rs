use report_core::{
    stats::{self, merge_stats},
    HostStats, ReportResult, Task,
};
use tracing::debug;

use crate::format::{format_playbook_report, format_stats, format_task_report, is_reportable};
use crate::{ReportEvent, ReportOptions, ReportRenderer};

/// 终端文本报告
///
/// 运行按块输出，不属于运行的任务集中输出，最后是按主机统计和合计。
/// 没有可报告任务的运行不出现在报告中，也不计入统计。
pub struct ScreenRenderer;

impl ReportRenderer for ScreenRenderer {
    fn name(&self) -> &'static str {
        "screen"
    }

    fn produce_report(&self, events: &[ReportEvent], options: &ReportOptions) -> ReportResult<String> {
        let mut sections = Vec::new();
        let mut loose_tasks: Vec<&Task> = Vec::new();
        let mut report_stats = HostStats::new();

        debug!("生成终端报告，共 {} 个条目", events.len());
        for event in events {
            match event {
                ReportEvent::Playbook(report) => {
                    let tasks: Vec<&Task> = report
                        .tasks
                        .iter()
                        .filter(|task| is_reportable(task, options.verbose))
                        .collect();
                    if tasks.is_empty() {
                        continue;
                    }

                    let playbook_stats = stats::playbook_stats(&report.tasks);
                    merge_stats(&mut report_stats, &playbook_stats);
                    if !options.stats_only {
                        sections.push(format_playbook_report(report, &tasks, &playbook_stats));
                    }
                }
                ReportEvent::Task(task) => {
                    if !is_reportable(task, options.verbose) {
                        continue;
                    }
                    merge_stats(&mut report_stats, &stats::task_stats(task));
                    if !options.stats_only {
                        loose_tasks.push(task);
                    }
                }
            }
        }

        if !loose_tasks.is_empty() {
            sections.push(format_task_report(&loose_tasks));
        }

        if !report_stats.is_empty() {
            let totals = HostStats::from([("total".to_string(), stats::totals(&report_stats))]);
            sections.push(format!(
                "{}{}",
                format_stats(&report_stats, true),
                format_stats(&totals, false)
            ));
        }

        Ok(sections.join("\n"))
    }
}
