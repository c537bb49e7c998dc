use clap::{ArgAction, Args, Parser, Subcommand};
use report_core::{logging::LogFormat, FilterArgs, FilterValue};

/// 命令行参数
#[derive(Parser, Debug)]
#[command(name = "ansible-report")]
#[command(version)]
#[command(about = "记录自动化运行事件并生成报告")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 配置文件路径
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// 提高日志级别，可重复 (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', action = ArgAction::Count, global = true)]
    pub verbosity: u8,

    /// 日志格式: text / pretty / json
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 创建数据库表
    Createdb(CreatedbArgs),
    /// 执行表结构迁移
    Migrate(MigrateArgs),
    /// 从标准输入读取JSON事件并写入数据库
    Log,
    /// 查询并输出报告
    Report(ReportArgs),
    /// 删除过期记录
    Prune(PruneArgs),
    /// 回收数据库文件空间
    Vacuum,
}

#[derive(Args, Debug)]
pub struct CreatedbArgs {
    /// SQLite数据库文件的权限（八进制），例如 0640
    #[arg(long, value_parser = parse_mode)]
    pub mode: Option<u32>,
}

#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// up 或 down
    #[arg(long, default_value = "up")]
    pub direction: String,

    /// 只执行指定的迁移
    #[arg(long)]
    pub migration: Option<String>,
}

#[derive(Args, Debug, Default)]
pub struct ReportArgs {
    /// 按主机过滤，可重复
    #[arg(long)]
    pub hostname: Vec<String>,

    /// 按模块过滤，可重复
    #[arg(long)]
    pub module: Vec<String>,

    /// 按结果过滤，可重复
    #[arg(long)]
    pub result: Vec<String>,

    /// 按运行的脚本路径过滤，可重复
    #[arg(long)]
    pub path: Vec<String>,

    /// 只包含此时间之后的记录，例如 "2 hours ago"
    #[arg(long)]
    pub since: Option<String>,

    /// 最多返回的记录数，0表示不限制
    #[arg(long)]
    pub limit: Option<u64>,

    /// 按运行输出，而不是按单个任务
    #[arg(long)]
    pub playbooks: bool,

    /// 任一条件满足即可（默认要求全部满足）
    #[arg(long)]
    pub union: bool,

    /// 输出方式: screen / logstalgia / json，可重复
    #[arg(short, long)]
    pub output: Vec<String>,

    /// 列出全部任务
    #[arg(long)]
    pub verbose: bool,

    /// 只输出统计
    #[arg(long)]
    pub stats: bool,
}

impl ReportArgs {
    /// 命令行上给出的列过滤条件，没有时返回None
    pub fn filter_args(&self) -> Option<FilterArgs> {
        let mut args = FilterArgs::new();
        for (column, values) in [
            ("hostname", &self.hostname),
            ("module", &self.module),
            ("result", &self.result),
            ("path", &self.path),
        ] {
            if let Some(value) = list_value(values) {
                args.insert(column, value);
            }
        }
        (!args.is_empty()).then_some(args)
    }
}

#[derive(Args, Debug)]
pub struct PruneArgs {
    /// 删除早于此时间的记录，例如 "30 days ago"
    #[arg(long)]
    pub older_than: String,

    /// 删除运行（及其任务），而不是单个任务
    #[arg(long)]
    pub playbooks: bool,
}

/// 单个值按相等比较，多个值按成员测试
fn list_value(values: &[String]) -> Option<FilterValue> {
    match values {
        [] => None,
        [single] => Some(single.clone().into()),
        many => Some(many.to_vec().into()),
    }
}

fn parse_mode(s: &str) -> Result<u32, String> {
    let digits = s.trim_start_matches("0o");
    u32::from_str_radix(digits, 8).map_err(|e| format!("无效的文件权限 '{s}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_report_command() {
        let cli = Cli::try_parse_from([
            "ansible-report",
            "-vv",
            "report",
            "--hostname",
            "web1",
            "--hostname",
            "web2",
            "--result",
            "failed",
            "--since",
            "1 day ago",
            "--union",
            "-o",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.verbosity, 2);
        let Commands::Report(args) = cli.command else {
            panic!("应当解析为report命令");
        };
        assert!(args.union);
        assert_eq!(args.output, vec!["json"]);
        assert_eq!(args.since.as_deref(), Some("1 day ago"));

        let filter = args.filter_args().unwrap();
        assert_eq!(filter.len(), 2);
        assert!(matches!(filter.get("hostname"), Some(FilterValue::Many(v)) if v.len() == 2));
        assert!(matches!(filter.get("result"), Some(FilterValue::One(_))));
    }

    #[test]
    fn test_report_without_filters() {
        assert!(ReportArgs::default().filter_args().is_none());
    }

    #[test]
    fn test_createdb_mode() {
        let cli = Cli::try_parse_from(["ansible-report", "createdb", "--mode", "0640"]).unwrap();
        let Commands::Createdb(args) = cli.command else {
            panic!("应当解析为createdb命令");
        };
        assert_eq!(args.mode, Some(0o640));

        assert!(Cli::try_parse_from(["ansible-report", "createdb", "--mode", "rw-r"]).is_err());
    }

    #[test]
    fn test_prune_requires_cutoff() {
        assert!(Cli::try_parse_from(["ansible-report", "prune"]).is_err());

        let cli = Cli::try_parse_from([
            "ansible-report",
            "--log-format",
            "json",
            "prune",
            "--older-than",
            "30 days ago",
            "--playbooks",
        ])
        .unwrap();
        assert_eq!(cli.log_format, Some(LogFormat::Json));
        assert!(matches!(cli.command, Commands::Prune(PruneArgs { playbooks: true, .. })));
    }
}
