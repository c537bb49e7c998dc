//! 报告系统配置
//!
//! 进程启动时构建一次 [`AppConfig`]，随后以引用传入数据库管理器和重试执行器。
//! 加载顺序：内置默认值、TOML配置文件、`ANSIBLE_REPORT_` 前缀的环境变量。

pub mod models;

pub use models::{
    AppConfig, DatabaseConfig, DatabaseEngine, LoggingConfig, ReportConfig, RetryConfig,
};
