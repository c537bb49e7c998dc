use report_core::{ReportResult, Task};

use crate::format::is_reportable;
use crate::{ReportEvent, ReportOptions, ReportRenderer};

/// logstalgia 自定义日志格式
///
/// 每个任务一行 `时间戳|主机|/模块[/参数]|结果|-`，按时间从旧到新排列，
/// 可以直接通过管道交给 `logstalgia -`。
pub struct LogstalgiaRenderer;

impl LogstalgiaRenderer {
    fn custom_log(task: &Task) -> String {
        let mut request = format!("/{}", task.module.as_deref().unwrap_or("NA"));
        if let Some(args) = task.data.as_ref().and_then(|data| data.module_args()) {
            if !args.is_empty() {
                request.push('/');
                request.push_str(&args.replace(' ', "%20"));
            }
        }

        format!(
            "{}|{}|{}|{}|-",
            task.timestamp.timestamp(),
            task.hostname,
            request,
            task.result
        )
    }
}

impl ReportRenderer for LogstalgiaRenderer {
    fn name(&self) -> &'static str {
        "logstalgia"
    }

    fn produce_report(&self, events: &[ReportEvent], options: &ReportOptions) -> ReportResult<String> {
        let mut tasks: Vec<&Task> = events
            .iter()
            .flat_map(|event| match event {
                ReportEvent::Playbook(report) => report.tasks.iter().collect::<Vec<_>>(),
                ReportEvent::Task(task) => vec![task],
            })
            .filter(|task| is_reportable(task, options.verbose))
            .collect();
        tasks.sort_by_key(|task| (task.timestamp, task.id));

        Ok(tasks
            .into_iter()
            .map(Self::custom_log)
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::task;
    use chrono::{Duration, TimeZone, Utc};
    use report_core::{Payload, TaskResult};
    use serde_json::json;

    #[test]
    fn test_custom_log_line() {
        let mut t = task("web1", Some("command"), TaskResult::Failed, false);
        t.timestamp = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        t.data = Some(Payload::Structured(json!({
            "invocation": {"module_name": "command", "module_args": "ls -la /tmp"}
        })));

        assert_eq!(
            LogstalgiaRenderer::custom_log(&t),
            "1709294400|web1|/command/ls%20-la%20/tmp|FAILED|-"
        );

        let mut bare = task("db1", None, TaskResult::Unreachable, false);
        bare.timestamp = t.timestamp;
        bare.data = None;
        assert_eq!(
            LogstalgiaRenderer::custom_log(&bare),
            "1709294400|db1|/NA|UNREACHABLE|-"
        );
    }

    #[test]
    fn test_oldest_first() {
        let now = Utc::now();
        let mut newer = task("web2", Some("copy"), TaskResult::Failed, false);
        newer.timestamp = now;
        let mut older = task("web1", Some("copy"), TaskResult::Failed, false);
        older.timestamp = now - Duration::minutes(5);
        let quiet = task("web3", Some("ping"), TaskResult::Ok, false);

        // 查询结果按时间降序
        let events = vec![
            ReportEvent::Task(newer),
            ReportEvent::Task(quiet),
            ReportEvent::Task(older),
        ];
        let report = LogstalgiaRenderer
            .produce_report(&events, &ReportOptions::default())
            .unwrap();
        let hosts: Vec<&str> = report
            .lines()
            .map(|line| line.split('|').nth(1).unwrap())
            .collect();
        assert_eq!(hosts, vec!["web1", "web2"]);
    }
}
