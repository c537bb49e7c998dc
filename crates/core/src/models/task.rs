use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{ReportError, ReportResult};

/// 任务执行结果分类
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskResult {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "FAILED")]
    Failed,
    #[serde(rename = "ERROR")]
    Error,
    #[serde(rename = "UNREACHABLE")]
    Unreachable,
    #[serde(rename = "SKIPPED")]
    Skipped,
    #[serde(rename = "ASYNC_FAILED")]
    AsyncFailed,
    #[serde(rename = "CHANGED")]
    Changed,
}

impl TaskResult {
    pub const ALL: [TaskResult; 7] = [
        TaskResult::Ok,
        TaskResult::Failed,
        TaskResult::Error,
        TaskResult::Unreachable,
        TaskResult::Skipped,
        TaskResult::AsyncFailed,
        TaskResult::Changed,
    ];

    /// 数据库中存储的形式
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskResult::Ok => "OK",
            TaskResult::Failed => "FAILED",
            TaskResult::Error => "ERROR",
            TaskResult::Unreachable => "UNREACHABLE",
            TaskResult::Skipped => "SKIPPED",
            TaskResult::AsyncFailed => "ASYNC_FAILED",
            TaskResult::Changed => "CHANGED",
        }
    }

    /// 统计表中使用的小写键
    pub fn key(&self) -> &'static str {
        match self {
            TaskResult::Ok => "ok",
            TaskResult::Failed => "failed",
            TaskResult::Error => "error",
            TaskResult::Unreachable => "unreachable",
            TaskResult::Skipped => "skipped",
            TaskResult::AsyncFailed => "async_failed",
            TaskResult::Changed => "changed",
        }
    }

    /// 需要引起注意的结果（报告中默认只展示这些）
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            TaskResult::Failed | TaskResult::Error | TaskResult::Unreachable | TaskResult::AsyncFailed
        )
    }

    /// changed标志只对这些结果有实际意义
    pub fn tracks_changes(&self) -> bool {
        matches!(self, TaskResult::Ok | TaskResult::Changed)
    }
}

impl std::fmt::Display for TaskResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskResult {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "OK" => Ok(TaskResult::Ok),
            "FAILED" => Ok(TaskResult::Failed),
            "ERROR" => Ok(TaskResult::Error),
            "UNREACHABLE" => Ok(TaskResult::Unreachable),
            "SKIPPED" => Ok(TaskResult::Skipped),
            "ASYNC_FAILED" => Ok(TaskResult::AsyncFailed),
            "CHANGED" => Ok(TaskResult::Changed),
            _ => Err(ReportError::InvalidFilter(format!("未知的任务结果: {s}"))),
        }
    }
}

impl sqlx::Type<sqlx::Sqlite> for TaskResult {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <str as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <str as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for TaskResult {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        s.parse::<TaskResult>()
            .map_err(|_| format!("Invalid task result: {s}").into())
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for TaskResult {
    fn encode_by_ref(
        &self,
        buf: &mut <sqlx::Sqlite as sqlx::Database>::ArgumentBuffer<'q>,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <&str as sqlx::Encode<sqlx::Sqlite>>::encode(self.as_str(), buf)
    }
}

impl sqlx::Type<sqlx::Postgres> for TaskResult {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <str as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <str as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for TaskResult {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        s.parse::<TaskResult>()
            .map_err(|_| format!("Invalid task result: {s}").into())
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for TaskResult {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode(self.as_str(), buf)
    }
}

/// 任务附带的结构化输出
///
/// 写入前总是合法JSON；读取时如果存储内容无法解析，则以 `Raw` 原样保留，
/// 保证读取不会失败，也不会改写已存储的字节。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Structured(Value),
    Raw(String),
}

impl Payload {
    /// 从数据库中的文本恢复
    pub fn from_stored(raw: String) -> Self {
        match serde_json::from_str::<Value>(&raw) {
            Ok(value) => Payload::Structured(value),
            Err(e) => {
                tracing::debug!("任务数据不是合法JSON，保留原始文本: {e}");
                Payload::Raw(raw)
            }
        }
    }

    /// 转换为数据库中存储的文本
    pub fn to_stored(&self) -> ReportResult<String> {
        match self {
            Payload::Structured(value) => Ok(serde_json::to_string(value)?),
            Payload::Raw(raw) => Ok(raw.clone()),
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Payload::Structured(value) => Some(value),
            Payload::Raw(_) => None,
        }
    }

    /// 按JSON真值规则读取 `changed` 字段
    pub fn changed(&self) -> bool {
        self.as_value()
            .and_then(|value| value.get("changed"))
            .map(is_truthy)
            .unwrap_or(false)
    }

    /// `invocation.module_name`
    pub fn module_name(&self) -> Option<&str> {
        self.as_value()?
            .get("invocation")?
            .get("module_name")?
            .as_str()
    }

    /// `invocation.module_args`
    pub fn module_args(&self) -> Option<&str> {
        self.as_value()?
            .get("invocation")?
            .get("module_args")?
            .as_str()
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Structured(value)
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// 已持久化的任务记录
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub hostname: String,
    pub module: Option<String>,
    pub result: TaskResult,
    pub changed: bool,
    pub data: Option<Payload>,
    pub user_id: i64,
    pub playbook_id: Option<i64>,
}

impl Task {
    pub fn entity_description(&self) -> String {
        format!(
            "任务 {} {} (ID: {}, 结果: {})",
            self.hostname,
            self.module.as_deref().unwrap_or("-"),
            self.id,
            self.result
        )
    }
}

/// 待写入的任务事件
#[derive(Debug, Clone)]
pub struct NewTask {
    pub hostname: String,
    pub module: Option<String>,
    pub result: TaskResult,
    pub data: Option<Payload>,
}

impl NewTask {
    pub fn new(hostname: impl Into<String>, result: TaskResult) -> Self {
        Self {
            hostname: hostname.into(),
            module: None,
            result,
            data: None,
        }
    }

    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    pub fn with_payload(mut self, payload: impl Into<Payload>) -> Self {
        self.data = Some(payload.into());
        self
    }

    /// changed标志由载荷推导
    pub fn changed(&self) -> bool {
        self.data.as_ref().map(Payload::changed).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_task_result_parse_is_case_insensitive() {
        assert_eq!("failed".parse::<TaskResult>().unwrap(), TaskResult::Failed);
        assert_eq!("Async_Failed".parse::<TaskResult>().unwrap(), TaskResult::AsyncFailed);
        assert!("bogus".parse::<TaskResult>().is_err());

        for result in TaskResult::ALL {
            assert_eq!(result.as_str().parse::<TaskResult>().unwrap(), result);
            assert_eq!(result.key(), result.as_str().to_lowercase());
        }
    }

    #[test]
    fn test_payload_changed_truthiness() {
        assert!(Payload::from(json!({"changed": true})).changed());
        assert!(Payload::from(json!({"changed": 1})).changed());
        assert!(Payload::from(json!({"changed": "yes"})).changed());
        assert!(!Payload::from(json!({"changed": false})).changed());
        assert!(!Payload::from(json!({"changed": 0})).changed());
        assert!(!Payload::from(json!({"rc": 0})).changed());
        assert!(!Payload::Raw("{\"changed\": true".to_string()).changed());
    }

    #[test]
    fn test_payload_keeps_malformed_text() {
        let raw = "{not json at all".to_string();
        let payload = Payload::from_stored(raw.clone());
        assert_eq!(payload, Payload::Raw(raw.clone()));
        assert_eq!(payload.to_stored().unwrap(), raw);
    }

    #[test]
    fn test_payload_nested_round_trip() {
        let value = json!({
            "changed": true,
            "invocation": {"module_name": "copy", "module_args": "src=a dest=b"},
            "results": [1, {"nested": [true, null]}],
        });
        let stored = Payload::from(value.clone()).to_stored().unwrap();
        let restored = Payload::from_stored(stored);

        assert_eq!(restored.as_value(), Some(&value));
        assert_eq!(restored.module_name(), Some("copy"));
        assert_eq!(restored.module_args(), Some("src=a dest=b"));
    }

    #[test]
    fn test_payload_float_round_trip() {
        let mut floats = vec![
            30.366074329203574,
            997.6354335106961,
            442.17838485859284,
            0.1 + 0.2,
            1e-300,
            f64::MAX,
        ];
        // 线性同余序列，覆盖 [0, 1000) 内的大量小数
        let mut state: u64 = 0x2545_f491_4f6c_dd1d;
        for _ in 0..20_000 {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            floats.push((state >> 11) as f64 / (1u64 << 53) as f64 * 1000.0);
        }

        for delta in floats {
            let payload = Payload::from(json!({"delta": delta, "timings": [delta, {"end": delta}]}));
            let restored = Payload::from_stored(payload.to_stored().unwrap());
            assert_eq!(restored, payload, "浮点数 {delta} 读回后发生变化");
        }
    }

    #[test]
    fn test_new_task_derives_changed() {
        let task = NewTask::new("web1", TaskResult::Ok)
            .with_module("file")
            .with_payload(json!({"changed": true}));
        assert!(task.changed());
        assert!(!NewTask::new("web1", TaskResult::Skipped).changed());
    }
}
