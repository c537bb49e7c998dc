use serde::{Deserialize, Serialize};

use crate::errors::{ReportError, ReportResult};

/// 报告生成默认值
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// 渲染器名称：screen / logstalgia / json
    pub output: Vec<String>,
    /// 展示所有任务，而不只是失败和变更的任务
    pub verbose: bool,
    /// 只输出统计汇总
    pub stats_only: bool,
    /// 最多返回的记录数，0表示不限制
    pub limit: u64,
    /// 默认的时间范围表达式，例如 "1 day ago"
    pub since: Option<String>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output: vec!["screen".to_string()],
            verbose: false,
            stats_only: false,
            limit: 0,
            since: None,
        }
    }
}

impl ReportConfig {
    pub fn validate(&self) -> ReportResult<()> {
        if self.output.is_empty() {
            return Err(ReportError::configuration("至少需要一个报告输出"));
        }
        Ok(())
    }
}
