use anyhow::{Context, Result};
use clap::Parser;
use report_core::{
    logging::{init_logging, level_for_verbosity},
    AppConfig,
};
use tracing::debug;

mod app;
mod cli;

use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref()).with_context(|| match &cli.config {
        Some(path) => format!("加载配置文件失败: {path}"),
        None => "加载配置失败".to_string(),
    })?;

    let level = level_for_verbosity(&config.logging.level, cli.verbosity);
    let format = cli.log_format.unwrap_or(config.logging.format);
    init_logging(level, format).context("初始化日志失败")?;

    debug!("使用 {} 数据库 {}", config.database.engine, config.database.name);
    app::run(&config, cli.command).await
}
