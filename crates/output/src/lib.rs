//! 报告输出
//!
//! 渲染器按名称静态注册，每个渲染器把查询得到的事件序列转换为文本。
//! 写到哪里（终端、文件、管道）由调用者决定。

pub mod format;
pub mod json;
pub mod logstalgia;
pub mod screen;

use report_core::{Playbook, ReportError, ReportResult, Task, User};
use serde::Serialize;

pub use json::JsonRenderer;
pub use logstalgia::LogstalgiaRenderer;
pub use screen::ScreenRenderer;

/// 一次运行及其任务
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybookReport {
    pub playbook: Playbook,
    pub user: Option<User>,
    /// 按时间升序
    pub tasks: Vec<Task>,
}

/// 报告中的一个条目
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReportEvent {
    Playbook(PlaybookReport),
    Task(Task),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportOptions {
    /// 输出全部任务，而不只是告警和有变更的任务
    pub verbose: bool,
    /// 只输出统计
    pub stats_only: bool,
}

/// 报告渲染器
pub trait ReportRenderer: Send + Sync {
    fn name(&self) -> &'static str;

    fn produce_report(&self, events: &[ReportEvent], options: &ReportOptions)
        -> ReportResult<String>;
}

static RENDERERS: &[&dyn ReportRenderer] = &[&ScreenRenderer, &LogstalgiaRenderer, &JsonRenderer];

/// 按名称查找渲染器
pub fn renderer(name: &str) -> ReportResult<&'static dyn ReportRenderer> {
    RENDERERS
        .iter()
        .copied()
        .find(|renderer| renderer.name() == name)
        .ok_or_else(|| {
            ReportError::Output(format!(
                "未知的输出方式 '{}'，可选: {}",
                name,
                renderer_names().join(", ")
            ))
        })
}

pub fn renderer_names() -> Vec<&'static str> {
    RENDERERS.iter().map(|renderer| renderer.name()).collect()
}

#[cfg(test)]
pub(crate) mod testing {
    use chrono::{DateTime, Utc};
    use report_core::{Payload, Playbook, Task, TaskResult};
    use serde_json::json;

    pub fn task(host: &str, module: Option<&str>, result: TaskResult, changed: bool) -> Task {
        Task {
            id: 1,
            timestamp: Utc::now(),
            hostname: host.to_string(),
            module: module.map(str::to_string),
            result,
            changed,
            data: Some(Payload::Structured(json!({"changed": changed}))),
            user_id: 1,
            playbook_id: None,
        }
    }

    pub fn playbook(path: &str, endtime: Option<DateTime<Utc>>) -> Playbook {
        Playbook {
            id: 3,
            path: path.to_string(),
            uuid: "0190c3a2-7e1f-7cc4-9a51-2b8f1d0e6a11".to_string(),
            user_id: 1,
            connection: "ssh".to_string(),
            starttime: Utc::now(),
            endtime,
            checksum: "NA".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lookup() {
        assert_eq!(renderer("screen").unwrap().name(), "screen");
        assert_eq!(renderer("logstalgia").unwrap().name(), "logstalgia");
        assert_eq!(renderer("json").unwrap().name(), "json");
        assert!(matches!(renderer("email"), Err(ReportError::Output(_))));
        assert_eq!(renderer_names(), vec!["screen", "logstalgia", "json"]);
    }
}
