use std::path::Path;

use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use super::{
    database::DatabaseConfig, logging::LoggingConfig, report::ReportConfig, retry::RetryConfig,
};
use crate::errors::ReportResult;

/// 未显式指定配置文件时依次查找的路径
pub const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "ansible-report.toml",
    "config/ansible-report.toml",
    "/etc/ansible/report.toml",
];

/// 环境变量前缀
pub const ENV_PREFIX: &str = "ANSIBLE_REPORT";

/// System configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub retry: RetryConfig,
    pub report: ReportConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from config file and environment variables
    ///
    /// Load order:
    /// 1. Default configuration
    /// 2. Config file (TOML format)
    /// 3. Environment variable overrides (prefix: ANSIBLE_REPORT_, nesting: `__`)
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        Self::load_with_env(config_path, Self::environment())
    }

    fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("report.output")
            .try_parsing(true)
    }

    fn load_with_env(config_path: Option<&str>, env: Environment) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_path {
            if !Path::new(path).exists() {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        } else if let Some(path) = DEFAULT_CONFIG_PATHS
            .iter()
            .find(|path| Path::new(path).exists())
        {
            tracing::debug!("使用配置文件: {}", path);
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        }

        builder = builder.add_source(env);

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate().context("配置验证失败")?;

        Ok(config)
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }

    pub fn validate(&self) -> ReportResult<()> {
        self.database.validate()?;
        self.retry.validate()?;
        self.report.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}
