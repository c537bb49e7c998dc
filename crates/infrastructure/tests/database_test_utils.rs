#![allow(dead_code)]

use anyhow::Result;
use report_core::{DatabaseConfig, Identity, RetryConfig};
use report_infrastructure::DatabaseManager;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tempfile::TempDir;
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::postgres::Postgres;
use tokio::time::{sleep, Duration};

/// 临时目录中的SQLite数据库
pub struct SqliteTestDatabase {
    _dir: TempDir,
    pub config: DatabaseConfig,
}

impl SqliteTestDatabase {
    pub fn new() -> Result<Self> {
        let dir = TempDir::new()?;
        let path = dir.path().join("report.db");
        let config = DatabaseConfig::sqlite(path.to_string_lossy().into_owned());
        Ok(Self { _dir: dir, config })
    }

    pub fn with_busy_timeout(mut self, busy_timeout_ms: u64) -> Self {
        self.config.busy_timeout_ms = busy_timeout_ms;
        self
    }

    /// 连接并建表
    pub async fn manager(&self, identity: Identity) -> Result<DatabaseManager> {
        let manager = DatabaseManager::connect_with(&self.config, fast_retry(), identity).await?;
        manager.create_tables().await?;
        Ok(manager)
    }

    /// 绕过管理器的原始连接，用于制造锁竞争或直接写入数据
    pub async fn raw_pool(&self) -> Result<SqlitePool> {
        let options = SqliteConnectOptions::new()
            .filename(&self.config.name)
            .create_if_missing(true)
            .busy_timeout(Duration::from_millis(0));
        Ok(SqlitePoolOptions::new()
            .max_connections(2)
            .connect_with(options)
            .await?)
    }
}

/// 测试用的短退避
pub fn fast_retry() -> RetryConfig {
    RetryConfig {
        backoff_start_ms: 10,
        backoff_multiplier: 2.0,
        backoff_max_ms: 5_000,
        jitter_factor: 0.1,
    }
}

pub fn alice() -> Identity {
    Identity::new("alice", "alice")
}

/// PostgreSQL测试容器
pub struct PostgresTestContainer {
    #[allow(dead_code)]
    container: ContainerAsync<Postgres>,
    pub config: DatabaseConfig,
}

impl PostgresTestContainer {
    pub async fn new() -> Result<Self> {
        let container = Postgres::default()
            .with_db_name("report_test")
            .with_user("test_user")
            .with_password("test_password")
            .start()
            .await?;
        let port = container.get_host_port_ipv4(5432).await?;

        let config = DatabaseConfig {
            engine: "postgres".to_string(),
            name: "report_test".to_string(),
            host: "127.0.0.1".to_string(),
            port,
            user: Some("test_user".to_string()),
            password: Some("test_password".to_string()),
            ..DatabaseConfig::default()
        };

        // 等待数据库就绪
        let mut retry_count = 0;
        loop {
            match report_infrastructure::DatabasePool::connect(&config).await {
                Ok(_) => break,
                Err(_) if retry_count < 30 => {
                    retry_count += 1;
                    sleep(Duration::from_millis(500)).await;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(Self { container, config })
    }

    pub async fn manager(&self, identity: Identity) -> Result<DatabaseManager> {
        let manager = DatabaseManager::connect_with(&self.config, fast_retry(), identity).await?;
        manager.create_tables().await?;
        Ok(manager)
    }
}
