use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use report_core::{
    stats::{self, HostStats},
    AppConfig, CombineMode, ComparisonOp, DatabaseConfig, DatabaseEngine, FilterArgs, Identity,
    NewPlaybook, NewTask, Payload, Playbook, ReportError, ReportResult, RetryConfig, Task,
    TaskResult, User,
};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use tracing::{debug, info, instrument};

use super::lock::FileLock;
use super::postgres::PostgresReportRepository;
use super::query_builder::{build_filter, Entity, Filter};
use super::repository::ReportRepository;
use super::retry::RetryExecutor;
use super::sqlite::SqliteReportRepository;
use crate::checksum::playbook_checksum;
use crate::identity::current_identity;
use crate::migrations::{self, Migration, MigrationDirection, MIGRATIONS};

/// Database connection pool enum
#[derive(Debug, Clone)]
pub enum DatabasePool {
    PostgreSQL(sqlx::PgPool),
    SQLite(sqlx::SqlitePool),
}

impl DatabasePool {
    /// 按配置打开连接池，引擎名无效或连接失败时立即返回错误
    pub async fn connect(config: &DatabaseConfig) -> ReportResult<Self> {
        config.validate()?;

        match config.engine_kind()? {
            DatabaseEngine::Sqlite => {
                let options = if config.is_memory() {
                    SqliteConnectOptions::from_str("sqlite::memory:")?
                } else {
                    SqliteConnectOptions::new()
                        .filename(&config.name)
                        .create_if_missing(true)
                        .journal_mode(SqliteJournalMode::Wal)
                };
                let options = options
                    .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
                    .foreign_keys(true);

                let mut pool_options =
                    SqlitePoolOptions::new().max_connections(config.pool_size());
                if config.is_memory() {
                    // 内存数据库随最后一个连接消失
                    pool_options = pool_options
                        .min_connections(1)
                        .idle_timeout(None)
                        .max_lifetime(None);
                }

                let pool = pool_options.connect_with(options).await.map_err(|e| {
                    ReportError::Connection(format!("无法打开SQLite数据库 {}: {e}", config.name))
                })?;
                Ok(DatabasePool::SQLite(pool))
            }
            DatabaseEngine::Postgres => {
                let mut options = PgConnectOptions::new()
                    .host(&config.host)
                    .port(config.port)
                    .database(&config.name);
                if let Some(user) = &config.user {
                    options = options.username(user);
                }
                if let Some(password) = &config.password {
                    options = options.password(password);
                }

                let pool = PgPoolOptions::new()
                    .max_connections(config.pool_size())
                    .connect_with(options)
                    .await
                    .map_err(|e| {
                        ReportError::Connection(format!(
                            "无法连接PostgreSQL {}:{}/{}: {e}",
                            config.host, config.port, config.name
                        ))
                    })?;
                Ok(DatabasePool::PostgreSQL(pool))
            }
        }
    }

    pub fn engine(&self) -> DatabaseEngine {
        match self {
            DatabasePool::PostgreSQL(_) => DatabaseEngine::Postgres,
            DatabasePool::SQLite(_) => DatabaseEngine::Sqlite,
        }
    }

    /// Factory method for the report repository
    pub fn repository(&self) -> Arc<dyn ReportRepository> {
        match self {
            DatabasePool::PostgreSQL(pool) => Arc::new(PostgresReportRepository::new(pool.clone())),
            DatabasePool::SQLite(pool) => Arc::new(SqliteReportRepository::new(pool.clone())),
        }
    }
}

/// 查询选项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FindOptions {
    /// 0表示不限制
    pub limit: u64,
    /// 时间列的比较运算符
    pub op: ComparisonOp,
    pub mode: CombineMode,
}

impl Default for FindOptions {
    fn default() -> Self {
        Self {
            limit: 0,
            op: ComparisonOp::Ge,
            mode: CombineMode::Intersection,
        }
    }
}

impl FindOptions {
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_op(mut self, op: ComparisonOp) -> Self {
        self.op = op;
        self
    }

    pub fn with_mode(mut self, mode: CombineMode) -> Self {
        self.mode = mode;
        self
    }
}

/// 持久化的统一入口
///
/// 写操作（用户解析、任务和运行的写入、删除）都经过重试执行器，嵌入式引擎下每次尝试
/// 都持有跨进程文件锁；读操作同样重试瞬时错误，但不加锁。
pub struct DatabaseManager {
    repository: Arc<dyn ReportRepository>,
    writer: RetryExecutor,
    reader: RetryExecutor,
    identity: Identity,
}

impl DatabaseManager {
    /// 按应用配置连接数据库，调用者身份取自当前进程
    pub async fn connect(config: &AppConfig) -> ReportResult<Self> {
        Self::connect_with(&config.database, config.retry.clone(), current_identity()).await
    }

    pub async fn connect_with(
        database: &DatabaseConfig,
        retry: RetryConfig,
        identity: Identity,
    ) -> ReportResult<Self> {
        retry.validate()?;
        let pool = DatabasePool::connect(database).await?;

        let lock = pool
            .engine()
            .is_embedded()
            .then(|| FileLock::for_database(database));
        if let Some(lock) = &lock {
            debug!("嵌入式数据库写锁: {}", lock.path().display());
        }

        info!(
            "已连接 {} 数据库 {} (身份: {})",
            pool.engine(),
            database.name,
            identity
        );
        Ok(Self::with_repository(pool.repository(), retry, lock, identity))
    }

    /// 使用现成的仓库构造管理器
    pub fn with_repository(
        repository: Arc<dyn ReportRepository>,
        retry: RetryConfig,
        lock: Option<FileLock>,
        identity: Identity,
    ) -> Self {
        Self {
            repository,
            writer: RetryExecutor::new(retry.clone(), lock),
            reader: RetryExecutor::new(retry, None),
            identity,
        }
    }

    pub fn engine(&self) -> DatabaseEngine {
        self.repository.engine()
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn lock(&self) -> Option<&FileLock> {
        self.writer.lock()
    }

    pub async fn health_check(&self) -> ReportResult<()> {
        self.repository.health_check().await
    }

    pub async fn close(&self) {
        self.repository.close().await
    }

    /// 幂等地创建表和索引
    #[instrument(skip(self))]
    pub async fn create_tables(&self) -> ReportResult<()> {
        let names: Vec<&str> = MIGRATIONS.iter().map(|m| m.name).collect();
        self.writer
            .run("建表", || self.repository.create_tables(&names))
            .await
    }

    /// 按 (username, euid) 获取或创建用户
    ///
    /// 并发创建同一身份时唯一约束只允许一行成功，失败方重新读取已存在的记录。
    pub async fn resolve_user(&self, identity: &Identity) -> ReportResult<User> {
        self.writer
            .run("解析用户", || self.resolve_user_once(identity))
            .await
    }

    /// 当前进程身份对应的用户
    pub async fn current_user(&self) -> ReportResult<User> {
        self.resolve_user(&self.identity).await
    }

    pub async fn get_user(&self, id: i64) -> ReportResult<Option<User>> {
        self.reader
            .run("读取用户", || self.repository.get_user(id))
            .await
    }

    async fn resolve_user_once(&self, identity: &Identity) -> ReportResult<User> {
        if let Some(user) = self.repository.find_user(identity).await? {
            return Ok(user);
        }

        match self.repository.insert_user(identity).await {
            Ok(user) => Ok(user),
            Err(e) if e.is_unique_violation() => {
                debug!("用户 {} 已被并发创建，重新读取", identity);
                self.repository.find_user(identity).await?.ok_or_else(|| {
                    ReportError::ConstraintViolation(format!("用户 {identity} 冲突后仍不存在"))
                })
            }
            Err(e) => Err(e),
        }
    }

    /// 记录一条任务结果
    ///
    /// changed由载荷推导；提供 `playbook` 时任务归属于该运行。
    pub async fn log_task(
        &self,
        hostname: &str,
        module: Option<&str>,
        result: TaskResult,
        payload: Option<Payload>,
        playbook: Option<&Playbook>,
    ) -> ReportResult<Task> {
        let task = NewTask {
            hostname: hostname.to_string(),
            module: module.map(str::to_string),
            result,
            data: payload,
        };
        self.save_task(&task, playbook).await
    }

    #[instrument(skip(self, task, playbook), fields(hostname = %task.hostname, result = %task.result))]
    pub async fn save_task(&self, task: &NewTask, playbook: Option<&Playbook>) -> ReportResult<Task> {
        let playbook_id = playbook.map(|p| p.id);

        self.writer
            .run("记录任务", || async move {
                let user = self.resolve_user_once(&self.identity).await?;
                self.repository
                    .insert_task(task, user.id, playbook_id, Utc::now())
                    .await
            })
            .await
    }

    /// 记录一次运行的开始
    ///
    /// 校验值来自脚本所在目录的版本控制状态，无法获取时为 "NA"。
    #[instrument(skip(self))]
    pub async fn log_playbook_start(
        &self,
        path: &str,
        connection: &str,
        starttime: Option<DateTime<Utc>>,
    ) -> ReportResult<Playbook> {
        let checksum = playbook_checksum(path).await;
        let playbook = NewPlaybook::new(path, connection)
            .with_starttime(starttime.unwrap_or_else(Utc::now))
            .with_checksum(checksum);

        let playbook = &playbook;
        self.writer
            .run("记录运行开始", || async move {
                let user = self.resolve_user_once(&self.identity).await?;
                self.repository.insert_playbook(playbook, user.id).await
            })
            .await
    }

    /// 记录运行结束，结束时间不早于开始时间
    #[instrument(skip(self, playbook), fields(playbook_id = playbook.id))]
    pub async fn log_playbook_end(&self, playbook: &Playbook) -> ReportResult<Playbook> {
        let endtime = Utc::now().max(playbook.starttime);
        self.writer
            .run("记录运行结束", || {
                self.repository.finish_playbook(playbook.id, endtime)
            })
            .await
    }

    pub async fn get_playbook(&self, id: i64) -> ReportResult<Option<Playbook>> {
        self.reader
            .run("读取运行", || self.repository.get_playbook(id))
            .await
    }

    /// 按过滤条件查询任务，按时间降序
    pub async fn find_tasks(
        &self,
        args: Option<&FilterArgs>,
        options: FindOptions,
    ) -> ReportResult<Vec<Task>> {
        let filter = Self::filter_for(Entity::Task, args, options.op, options.mode)?;
        self.reader
            .run("查询任务", || self.repository.find_tasks(&filter, options.limit))
            .await
    }

    /// 按过滤条件查询运行，按结束时间降序
    pub async fn find_playbooks(
        &self,
        args: Option<&FilterArgs>,
        options: FindOptions,
    ) -> ReportResult<Vec<Playbook>> {
        let filter = Self::filter_for(Entity::Playbook, args, options.op, options.mode)?;
        self.reader
            .run("查询运行", || {
                self.repository.find_playbooks(&filter, options.limit)
            })
            .await
    }

    /// 运行下的全部任务，按时间升序
    pub async fn tasks_for_playbook(&self, playbook: &Playbook) -> ReportResult<Vec<Task>> {
        self.reader
            .run("查询运行任务", || self.repository.tasks_for_playbook(playbook.id))
            .await
    }

    pub async fn playbook_stats(&self, playbook: &Playbook) -> ReportResult<HostStats> {
        let tasks = self.tasks_for_playbook(playbook).await?;
        Ok(stats::playbook_stats(&tasks))
    }

    pub fn task_stats(&self, task: &Task) -> HostStats {
        stats::task_stats(task)
    }

    /// 删除匹配的任务
    ///
    /// 没有过滤条件（或条件中没有可识别的列）时拒绝执行并返回None。
    pub async fn remove_tasks(
        &self,
        args: Option<&FilterArgs>,
        op: ComparisonOp,
    ) -> ReportResult<Option<u64>> {
        self.remove(Entity::Task, args, op).await
    }

    /// 删除匹配的运行，其下的任务级联删除
    pub async fn remove_playbooks(
        &self,
        args: Option<&FilterArgs>,
        op: ComparisonOp,
    ) -> ReportResult<Option<u64>> {
        self.remove(Entity::Playbook, args, op).await
    }

    async fn remove(
        &self,
        entity: Entity,
        args: Option<&FilterArgs>,
        op: ComparisonOp,
    ) -> ReportResult<Option<u64>> {
        let Some(args) = args else {
            tracing::warn!("拒绝无过滤条件的删除 ({})", entity.table());
            return Ok(None);
        };

        let filter = build_filter(entity, args, op, CombineMode::Intersection)?;
        if filter.is_unscoped() {
            tracing::warn!("过滤条件中没有可识别的列，拒绝删除 ({})", entity.table());
            return Ok(None);
        }

        let removed = self
            .writer
            .run("删除记录", || self.repository.delete(&filter))
            .await?;
        Ok(Some(removed))
    }

    /// 回收存储空间，仅对嵌入式引擎有意义
    pub async fn vacuum(&self) -> ReportResult<()> {
        self.writer
            .run("回收空间", || self.repository.vacuum())
            .await
    }

    pub async fn applied_migrations(&self) -> ReportResult<Vec<String>> {
        self.reader
            .run("读取迁移记录", || self.repository.applied_migrations())
            .await
    }

    pub async fn apply_migration(
        &self,
        migration: &Migration,
        direction: MigrationDirection,
    ) -> ReportResult<()> {
        self.writer
            .run("执行迁移", || {
                self.repository.apply_migration(migration, direction)
            })
            .await
    }

    /// 执行内置迁移，返回实际执行的迁移名称
    pub async fn migrate(
        &self,
        direction: MigrationDirection,
        only: Option<&str>,
    ) -> ReportResult<Vec<&'static str>> {
        migrations::run_migrations(self, direction, only).await
    }

    fn filter_for(
        entity: Entity,
        args: Option<&FilterArgs>,
        op: ComparisonOp,
        mode: CombineMode,
    ) -> ReportResult<Filter> {
        match args {
            Some(args) => build_filter(entity, args, op, mode),
            None => Ok(Filter::all(entity)),
        }
    }
}
