//! 文本报告的公共格式
//!
//! 时间以本地时区显示。

use chrono::{DateTime, Local, Utc};
use report_core::{HostStats, OutcomeCounts, Task, TaskResult};

use crate::PlaybookReport;

pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const SHORT_TIME_FORMAT: &str = "%H:%M:%S";

const HEADING_WIDTH: usize = 50;
const SECTION_WIDTH: usize = 25;

pub fn local_time(timestamp: &DateTime<Utc>, format: &str) -> String {
    timestamp.with_timezone(&Local).format(format).to_string()
}

/// 任务是否出现在报告中
///
/// 详细模式下输出全部任务，否则只输出告警类结果和有变更的任务。
pub fn is_reportable(task: &Task, verbose: bool) -> bool {
    verbose || task.result.is_warning() || task.changed || task.result == TaskResult::Changed
}

/// `HH:MM:SS host module: RESULT`
pub fn format_task_brief(task: &Task) -> String {
    format!(
        "{} {} {}: {}",
        local_time(&task.timestamp, SHORT_TIME_FORMAT),
        task.hostname,
        task.module.as_deref().unwrap_or("-"),
        task.result
    )
}

/// 不属于任何运行的任务
pub fn format_task_report(tasks: &[&Task]) -> String {
    let mut report = format!("{:=^width$}\n\n", " Tasks ", width = HEADING_WIDTH);
    for task in tasks {
        report.push_str(&format_task_brief(task));
        report.push('\n');
    }
    report
}

/// 单次运行的报告块
pub fn format_playbook_report(report: &PlaybookReport, tasks: &[&Task], stats: &HostStats) -> String {
    let playbook = &report.playbook;
    let mut out = format!("{}:\n", playbook.path);

    let user = match &report.user {
        Some(user) => format!("{} ({})", user.username, user.euid),
        None => format!("#{}", playbook.user_id),
    };
    out.push_str(&format!("  {:>10}: {}\n", "User", user));
    out.push_str(&format!("  {:>10}: {}\n", "Checksum", playbook.checksum));
    out.push_str(&format!(
        "  {:>10}: {}\n",
        "Start time",
        local_time(&playbook.starttime, TIME_FORMAT)
    ));
    let endtime = playbook
        .endtime
        .map(|end| local_time(&end, TIME_FORMAT))
        .unwrap_or_else(|| "-".to_string());
    out.push_str(&format!("  {:>10}: {}\n", "End time", endtime));

    out.push_str(&format!("\n  {:-^width$}\n\n", " Tasks ", width = SECTION_WIDTH));
    for task in tasks {
        out.push_str(&format!("  {}\n", format_task_brief(task)));
    }

    out.push_str(&format!("\n  {:-^width$}\n\n", " Summary ", width = SECTION_WIDTH));
    for (host, counts) in stats {
        out.push_str(&format!("  {}\t: {}\n", host, format_summary_line(counts)));
    }
    out
}

/// `ok=1  changed=0  failed=1 ...`，ok在最前
pub fn format_summary_line(counts: &OutcomeCounts) -> String {
    let ok = TaskResult::Ok.key();
    counts
        .get(ok)
        .map(|count| (ok, count))
        .into_iter()
        .chain(counts.iter().filter(|(key, _)| *key != ok).map(|(k, v)| (k.as_str(), v)))
        .map(|(key, count)| format!("{key}={count}"))
        .collect::<Vec<_>>()
        .join("  ")
}

/// 按主机的统计表
///
/// `heading` 为false时不输出表头，用于紧接在主机表之后输出合计行。
pub fn format_stats(stats: &HostStats, heading: bool) -> String {
    let host_width = stats.keys().map(String::len).max().unwrap_or(0).max(10);
    let columns: Vec<&str> = TaskResult::ALL.iter().map(TaskResult::key).collect();

    let mut out = String::new();
    if heading {
        out.push_str(&format!("{:=^width$}\n\n", " Summary ", width = HEADING_WIDTH));
        out.push_str(&format!("{:<host_width$}", "host"));
        for column in &columns {
            out.push_str(&format!("  {:>width$}", column, width = column.len().max(3)));
        }
        out.push('\n');
    }

    for (host, counts) in stats {
        out.push_str(&format!("{host:<host_width$}"));
        for column in &columns {
            let count = counts.get(*column).copied().unwrap_or(0);
            out.push_str(&format!("  {:>width$}", count, width = column.len().max(3)));
        }
        out.push('\n');
    }
    out
}
