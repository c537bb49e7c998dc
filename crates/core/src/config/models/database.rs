use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{ReportError, ReportResult};

/// 支持的数据库引擎
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseEngine {
    /// 单写者的嵌入式数据库，并发写入需要文件锁
    Sqlite,
    Postgres,
}

impl DatabaseEngine {
    pub fn is_embedded(&self) -> bool {
        matches!(self, DatabaseEngine::Sqlite)
    }
}

impl FromStr for DatabaseEngine {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(DatabaseEngine::Sqlite),
            "postgres" | "postgresql" => Ok(DatabaseEngine::Postgres),
            other => Err(ReportError::configuration(format!(
                "不支持的数据库引擎: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for DatabaseEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseEngine::Sqlite => write!(f, "sqlite"),
            DatabaseEngine::Postgres => write!(f, "postgres"),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// sqlite / sqlite3 / postgres / postgresql
    pub engine: String,
    /// SQLite文件路径（或 `:memory:`），PostgreSQL数据库名
    pub name: String,
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub max_connections: u32,
    pub busy_timeout_ms: u64,
    /// 文件锁路径，默认位于数据库文件所在目录
    pub lock_path: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            engine: "sqlite".to_string(),
            name: "ansible-report.db".to_string(),
            host: "localhost".to_string(),
            port: 5432,
            user: None,
            password: None,
            max_connections: 5,
            busy_timeout_ms: 5000,
            lock_path: None,
        }
    }
}

impl DatabaseConfig {
    /// SQLite配置的便捷构造
    pub fn sqlite(path: impl Into<String>) -> Self {
        Self {
            name: path.into(),
            ..Self::default()
        }
    }

    pub fn engine_kind(&self) -> ReportResult<DatabaseEngine> {
        self.engine.parse()
    }

    pub fn is_memory(&self) -> bool {
        self.name == ":memory:"
    }

    /// 实际使用的连接池大小，内存数据库只能使用单个连接
    pub fn pool_size(&self) -> u32 {
        if self.is_memory() {
            1
        } else {
            self.max_connections
        }
    }

    /// Validate database configuration
    pub fn validate(&self) -> ReportResult<()> {
        let engine = self.engine_kind()?;

        if self.name.trim().is_empty() {
            return Err(ReportError::configuration("数据库名不能为空"));
        }

        if self.max_connections == 0 {
            return Err(ReportError::configuration("最大连接数必须大于0"));
        }

        if engine == DatabaseEngine::Postgres {
            if self.user.as_deref().map(str::is_empty).unwrap_or(true) {
                return Err(ReportError::configuration("PostgreSQL需要配置用户名"));
            }
            if self.host.is_empty() {
                return Err(ReportError::configuration("PostgreSQL需要配置主机地址"));
            }
        }

        Ok(())
    }
}
