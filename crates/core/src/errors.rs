use thiserror::Error;

/// 驱动错误信息中表示瞬时故障的片段
///
/// 命中任一片段的错误会被重试执行器重试，其余错误一律视为致命错误。
pub const TRANSIENT_ERROR_MARKERS: &[&str] = &[
    "database is locked",
    "database table is locked",
    "lost connection",
    "connection reset",
    "transaction has been rolled back",
    "could not serialize access",
    "deadlock detected",
];

/// 报告系统错误类型定义
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("数据库连接失败: {0}")]
    Connection(String),

    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("唯一约束冲突: {0}")]
    ConstraintViolation(String),

    #[error("文件锁错误: {0}")]
    Lock(String),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("迁移错误: {0}")]
    Migration(String),

    #[error("无效的过滤条件: {0}")]
    InvalidFilter(String),

    #[error("报告输出错误: {0}")]
    Output(String),

    #[error("I/O错误: {0}")]
    Io(#[from] std::io::Error),
}

impl ReportError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn lock(msg: impl Into<String>) -> Self {
        Self::Lock(msg.into())
    }

    pub fn migration(msg: impl Into<String>) -> Self {
        Self::Migration(msg.into())
    }

    /// 底层驱动给出的原始错误信息
    fn driver_message(&self) -> Option<String> {
        match self {
            Self::Database(sqlx::Error::Database(db_err)) => Some(db_err.message().to_string()),
            Self::Database(err) => Some(err.to_string()),
            _ => None,
        }
    }

    /// 是否为可重试的瞬时错误（锁竞争、连接中断、并发写导致的回滚）
    pub fn is_transient(&self) -> bool {
        match self.driver_message() {
            Some(message) => {
                let message = message.to_lowercase();
                TRANSIENT_ERROR_MARKERS
                    .iter()
                    .any(|marker| message.contains(marker))
            }
            None => false,
        }
    }

    /// 是否为唯一约束冲突
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::ConstraintViolation(_) => true,
            Self::Database(sqlx::Error::Database(db_err)) => db_err.is_unique_violation(),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for ReportError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// 统一的Result类型
pub type ReportResult<T> = std::result::Result<T, ReportError>;
