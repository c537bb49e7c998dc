use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{ReportError, ReportResult};

/// 重试退避配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// 首次退避时长
    pub backoff_start_ms: u64,
    /// 每次重试后退避时长的倍数
    pub backoff_multiplier: f64,
    /// 从首次尝试起允许的最长耗时，超过后放弃
    pub backoff_max_ms: u64,
    /// 抖动因子 (0.0-1.0)
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            backoff_start_ms: 100,
            backoff_multiplier: 2.0,
            backoff_max_ms: 60_000,
            jitter_factor: 0.1,
        }
    }
}

impl RetryConfig {
    pub fn backoff_start(&self) -> Duration {
        Duration::from_millis(self.backoff_start_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }

    pub fn validate(&self) -> ReportResult<()> {
        if self.backoff_start_ms == 0 {
            return Err(ReportError::configuration("初始退避时长必须大于0"));
        }

        if self.backoff_multiplier < 1.0 {
            return Err(ReportError::configuration("退避倍数不能小于1.0"));
        }

        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(ReportError::configuration("抖动因子必须在0.0到1.0之间"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_defaults() {
        let config = RetryConfig::default();
        assert_eq!(config.backoff_start(), Duration::from_millis(100));
        assert_eq!(config.backoff_max(), Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_retry_validation() {
        let config = RetryConfig {
            backoff_multiplier: 0.5,
            ..RetryConfig::default()
        };
        assert!(config.validate().is_err());

        let config = RetryConfig {
            jitter_factor: 1.5,
            ..RetryConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
