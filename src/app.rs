use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use report_core::{
    parse_time_expression, AppConfig, CombineMode, ComparisonOp, FilterArgs, ReportConfig,
};
use report_infrastructure::{CallbackEvent, DatabaseManager, EventRecorder, FindOptions, MigrationDirection};
use report_output::{renderer, PlaybookReport, ReportEvent, ReportOptions};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};

use crate::cli::{Commands, CreatedbArgs, MigrateArgs, PruneArgs, ReportArgs};

/// 执行一个子命令
pub async fn run(config: &AppConfig, command: Commands) -> Result<()> {
    let manager = DatabaseManager::connect(config)
        .await
        .with_context(|| format!("无法连接数据库 {}", config.database.name))?;

    let result = dispatch(config, &manager, command).await;
    manager.close().await;
    result
}

async fn dispatch(config: &AppConfig, manager: &DatabaseManager, command: Commands) -> Result<()> {
    match command {
        Commands::Createdb(args) => createdb(config, manager, &args).await,
        Commands::Migrate(args) => {
            let executed = migrate(manager, &args).await?;
            if executed.is_empty() {
                println!("没有需要执行的迁移");
            }
            for name in executed {
                println!("{name}");
            }
            Ok(())
        }
        Commands::Log => {
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            let count = log_events(manager, stdin).await?;
            info!("已记录 {} 条事件", count);
            Ok(())
        }
        Commands::Report(args) => {
            for rendered in report(manager, &args, &config.report).await? {
                if !rendered.is_empty() {
                    println!("{rendered}");
                }
            }
            Ok(())
        }
        Commands::Prune(args) => {
            let removed = prune(manager, &args, Utc::now()).await?;
            println!("已删除 {removed} 条记录");
            Ok(())
        }
        Commands::Vacuum => manager.vacuum().await.context("回收空间失败"),
    }
}

async fn createdb(config: &AppConfig, manager: &DatabaseManager, args: &CreatedbArgs) -> Result<()> {
    manager.create_tables().await.context("建表失败")?;
    info!("数据库表已就绪");

    if let Some(mode) = args.mode {
        if !manager.engine().is_embedded() || config.database.is_memory() {
            warn!("--mode 只对SQLite数据库文件有效，已忽略");
            return Ok(());
        }
        set_file_mode(&config.database.name, mode)?;
    }
    Ok(())
}

#[cfg(unix)]
fn set_file_mode(path: &str, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .with_context(|| format!("无法设置 {path} 的权限为 {mode:o}"))
}

#[cfg(not(unix))]
fn set_file_mode(_path: &str, _mode: u32) -> Result<()> {
    warn!("当前平台不支持设置文件权限");
    Ok(())
}

async fn migrate(manager: &DatabaseManager, args: &MigrateArgs) -> Result<Vec<&'static str>> {
    let direction: MigrationDirection = args.direction.parse()?;
    let executed = manager
        .migrate(direction, args.migration.as_deref())
        .await
        .context("迁移失败")?;
    Ok(executed)
}

/// 逐行读取JSON事件并记录，返回处理的事件数
///
/// 任意一行解析或写入失败都会终止处理。
pub async fn log_events<R>(manager: &DatabaseManager, reader: R) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let recorder = EventRecorder::new(manager);
    let mut lines = reader.lines();
    let mut count = 0;
    let mut line_no = 0;

    while let Some(line) = lines.next_line().await.context("读取输入失败")? {
        line_no += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let event: CallbackEvent = serde_json::from_str(line)
            .with_context(|| format!("第 {line_no} 行不是有效的事件"))?;
        recorder
            .dispatch(event)
            .await
            .with_context(|| format!("第 {line_no} 行的事件写入失败"))?;
        count += 1;
    }

    if let Some(playbook) = recorder.current_playbook().await {
        warn!("输入结束时运行仍未结束: {}", playbook.entity_description());
    }
    Ok(count)
}

fn parse_since(expression: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    parse_time_expression(expression, now).ok_or_else(|| anyhow!("无法解析时间表达式: {expression}"))
}

/// 生成报告，每个输出方式一份
pub async fn report(
    manager: &DatabaseManager,
    args: &ReportArgs,
    defaults: &ReportConfig,
) -> Result<Vec<String>> {
    let outputs = if args.output.is_empty() {
        defaults.output.clone()
    } else {
        args.output.clone()
    };
    let renderers = outputs
        .iter()
        .map(|name| renderer(name))
        .collect::<Result<Vec<_>, _>>()?;

    let mode = if args.union {
        CombineMode::Union
    } else {
        CombineMode::Intersection
    };
    let options = FindOptions::default()
        .with_limit(args.limit.unwrap_or(defaults.limit))
        .with_mode(mode)
        .with_op(ComparisonOp::Ge);

    let mut filter = args.filter_args();
    if let Some(since) = args.since.as_ref().or(defaults.since.as_ref()) {
        let instant = parse_since(since, Utc::now())?;
        let column = if args.playbooks { "starttime" } else { "timestamp" };
        filter
            .get_or_insert_with(FilterArgs::new)
            .insert(column, instant);
    }

    let events = if args.playbooks {
        let playbooks = manager
            .find_playbooks(filter.as_ref(), options)
            .await
            .context("查询运行失败")?;
        let mut events = Vec::with_capacity(playbooks.len());
        for playbook in playbooks {
            let tasks = manager.tasks_for_playbook(&playbook).await?;
            let user = manager.get_user(playbook.user_id).await?;
            events.push(ReportEvent::Playbook(PlaybookReport {
                playbook,
                user,
                tasks,
            }));
        }
        events
    } else {
        manager
            .find_tasks(filter.as_ref(), options)
            .await
            .context("查询任务失败")?
            .into_iter()
            .map(ReportEvent::Task)
            .collect()
    };

    let report_options = ReportOptions {
        verbose: args.verbose || defaults.verbose,
        stats_only: args.stats || defaults.stats_only,
    };
    renderers
        .into_iter()
        .map(|renderer| {
            renderer
                .produce_report(&events, &report_options)
                .with_context(|| format!("{} 输出失败", renderer.name()))
        })
        .collect()
}

/// 删除早于给定时间的任务或运行
pub async fn prune(manager: &DatabaseManager, args: &PruneArgs, now: DateTime<Utc>) -> Result<u64> {
    let cutoff = parse_since(&args.older_than, now)?;
    let removed = if args.playbooks {
        let filter = FilterArgs::new().with("endtime", cutoff);
        manager.remove_playbooks(Some(&filter), ComparisonOp::Lt).await?
    } else {
        let filter = FilterArgs::new().with("timestamp", cutoff);
        manager.remove_tasks(Some(&filter), ComparisonOp::Lt).await?
    };
    Ok(removed.unwrap_or(0))
}
