//! 事件接收
//!
//! 自动化工具通过回调把执行结果交给 [`EventRecorder`]。每种结果对应一个回调，
//! 运行开始后记录的任务都归属于当前运行。

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info};

use report_core::{Payload, Playbook, ReportResult, Task, TaskResult};

use crate::database::DatabaseManager;

/// 一行JSON编码的回调事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CallbackEvent {
    TaskOk {
        host: String,
        #[serde(default)]
        result: Value,
    },
    TaskFailed {
        host: String,
        #[serde(default)]
        result: Value,
    },
    TaskError {
        host: String,
        #[serde(default)]
        result: Value,
    },
    TaskSkipped {
        host: String,
        #[serde(default)]
        result: Value,
    },
    TaskUnreachable {
        host: String,
        #[serde(default)]
        result: Value,
    },
    AsyncFailed {
        host: String,
        #[serde(default)]
        result: Value,
    },
    PlaybookStart {
        path: String,
        #[serde(default = "default_connection")]
        connection: String,
    },
    PlaybookEnd,
}

fn default_connection() -> String {
    "smart".to_string()
}

/// 把回调转换为数据库记录
pub struct EventRecorder<'a> {
    manager: &'a DatabaseManager,
    current: Mutex<Option<Playbook>>,
}

impl<'a> EventRecorder<'a> {
    pub fn new(manager: &'a DatabaseManager) -> Self {
        Self {
            manager,
            current: Mutex::new(None),
        }
    }

    /// 当前进行中的运行
    pub async fn current_playbook(&self) -> Option<Playbook> {
        self.current.lock().await.clone()
    }

    pub async fn on_task_ok(&self, host: &str, result: Value) -> ReportResult<Task> {
        self.record(host, TaskResult::Ok, result).await
    }

    pub async fn on_task_failed(&self, host: &str, result: Value) -> ReportResult<Task> {
        self.record(host, TaskResult::Failed, result).await
    }

    pub async fn on_task_error(&self, host: &str, result: Value) -> ReportResult<Task> {
        self.record(host, TaskResult::Error, result).await
    }

    pub async fn on_task_skipped(&self, host: &str, result: Value) -> ReportResult<Task> {
        self.record(host, TaskResult::Skipped, result).await
    }

    pub async fn on_task_unreachable(&self, host: &str, result: Value) -> ReportResult<Task> {
        self.record(host, TaskResult::Unreachable, result).await
    }

    pub async fn on_async_failed(&self, host: &str, result: Value) -> ReportResult<Task> {
        self.record(host, TaskResult::AsyncFailed, result).await
    }

    pub async fn on_playbook_start(&self, path: &str, connection: &str) -> ReportResult<Playbook> {
        let playbook = self
            .manager
            .log_playbook_start(path, connection, None)
            .await?;
        info!("运行开始: {}", playbook.entity_description());
        *self.current.lock().await = Some(playbook.clone());
        Ok(playbook)
    }

    /// 结束当前运行；没有进行中的运行时返回None
    pub async fn on_playbook_end(&self) -> ReportResult<Option<Playbook>> {
        let Some(playbook) = self.current.lock().await.take() else {
            debug!("没有进行中的运行，忽略结束事件");
            return Ok(None);
        };
        let finished = self.manager.log_playbook_end(&playbook).await?;
        info!("运行结束: {}", finished.entity_description());
        Ok(Some(finished))
    }

    /// 分发一条解析后的事件
    pub async fn dispatch(&self, event: CallbackEvent) -> ReportResult<()> {
        match event {
            CallbackEvent::TaskOk { host, result } => {
                self.on_task_ok(&host, result).await?;
            }
            CallbackEvent::TaskFailed { host, result } => {
                self.on_task_failed(&host, result).await?;
            }
            CallbackEvent::TaskError { host, result } => {
                self.on_task_error(&host, result).await?;
            }
            CallbackEvent::TaskSkipped { host, result } => {
                self.on_task_skipped(&host, result).await?;
            }
            CallbackEvent::TaskUnreachable { host, result } => {
                self.on_task_unreachable(&host, result).await?;
            }
            CallbackEvent::AsyncFailed { host, result } => {
                self.on_async_failed(&host, result).await?;
            }
            CallbackEvent::PlaybookStart { path, connection } => {
                self.on_playbook_start(&path, &connection).await?;
            }
            CallbackEvent::PlaybookEnd => {
                self.on_playbook_end().await?;
            }
        }
        Ok(())
    }

    async fn record(&self, host: &str, result: TaskResult, data: Value) -> ReportResult<Task> {
        let payload = normalize_payload(data);
        let module = payload.module_name().map(str::to_string);
        let playbook = self.current.lock().await.clone();

        self.manager
            .log_task(host, module.as_deref(), result, Some(payload), playbook.as_ref())
            .await
    }
}

/// 非对象的结果（例如不可达时的错误字符串）包装为 `{"msg": ...}`
fn normalize_payload(data: Value) -> Payload {
    match data {
        Value::Object(_) => Payload::Structured(data),
        Value::Null => Payload::Structured(json!({})),
        other => Payload::Structured(json!({ "msg": other })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_payload() {
        assert_eq!(
            normalize_payload(json!("ssh: connect to host timed out")),
            Payload::Structured(json!({"msg": "ssh: connect to host timed out"}))
        );
        assert_eq!(
            normalize_payload(json!({"rc": 1})),
            Payload::Structured(json!({"rc": 1}))
        );
        assert_eq!(normalize_payload(Value::Null), Payload::Structured(json!({})));
    }

    #[test]
    fn test_callback_event_json() {
        let event: CallbackEvent = serde_json::from_str(
            r#"{"event": "task_unreachable", "host": "db1", "result": "timed out"}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            CallbackEvent::TaskUnreachable {
                host: "db1".to_string(),
                result: json!("timed out"),
            }
        );

        let start: CallbackEvent =
            serde_json::from_str(r#"{"event": "playbook_start", "path": "site.yml"}"#).unwrap();
        assert_eq!(
            start,
            CallbackEvent::PlaybookStart {
                path: "site.yml".to_string(),
                connection: "smart".to_string(),
            }
        );

        let end: CallbackEvent = serde_json::from_str(r#"{"event": "playbook_end"}"#).unwrap();
        assert_eq!(end, CallbackEvent::PlaybookEnd);
    }
}
