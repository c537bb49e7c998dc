use serde::{Deserialize, Serialize};

use crate::errors::ReportResult;
use crate::logging::{parse_level, LogFormat};

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Text,
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> ReportResult<()> {
        parse_level(&self.level).map(|_| ())
    }
}
