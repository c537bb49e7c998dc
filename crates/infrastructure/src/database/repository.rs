use async_trait::async_trait;
use chrono::{DateTime, Utc};
use report_core::{
    DatabaseEngine, Identity, NewPlaybook, NewTask, Playbook, ReportResult, Task, User,
};

use super::query_builder::Filter;
use crate::migrations::{Migration, MigrationDirection};

/// 单次数据库操作
///
/// 每个方法只做一次尝试，不加锁也不重试；这两者由 [`super::DatabaseManager`]
/// 通过重试执行器统一处理。
#[async_trait]
pub trait ReportRepository: Send + Sync {
    fn engine(&self) -> DatabaseEngine;

    /// 幂等地创建表和索引；新建数据库时标记全部内置迁移为已执行
    async fn create_tables(&self, migrations: &[&str]) -> ReportResult<()>;

    async fn find_user(&self, identity: &Identity) -> ReportResult<Option<User>>;

    async fn get_user(&self, id: i64) -> ReportResult<Option<User>>;

    /// 插入用户，身份已存在时返回唯一约束冲突
    async fn insert_user(&self, identity: &Identity) -> ReportResult<User>;

    async fn insert_task(
        &self,
        task: &NewTask,
        user_id: i64,
        playbook_id: Option<i64>,
        timestamp: DateTime<Utc>,
    ) -> ReportResult<Task>;

    async fn insert_playbook(&self, playbook: &NewPlaybook, user_id: i64)
        -> ReportResult<Playbook>;

    async fn finish_playbook(&self, id: i64, endtime: DateTime<Utc>) -> ReportResult<Playbook>;

    async fn get_playbook(&self, id: i64) -> ReportResult<Option<Playbook>>;

    async fn find_tasks(&self, filter: &Filter, limit: u64) -> ReportResult<Vec<Task>>;

    async fn find_playbooks(&self, filter: &Filter, limit: u64) -> ReportResult<Vec<Playbook>>;

    /// 运行下的全部任务，按时间升序
    async fn tasks_for_playbook(&self, playbook_id: i64) -> ReportResult<Vec<Task>>;

    /// 删除匹配的记录，返回删除数量
    async fn delete(&self, filter: &Filter) -> ReportResult<u64>;

    async fn vacuum(&self) -> ReportResult<()>;

    async fn applied_migrations(&self) -> ReportResult<Vec<String>>;

    /// 在一个事务中执行迁移语句并更新迁移记录
    async fn apply_migration(
        &self,
        migration: &Migration,
        direction: MigrationDirection,
    ) -> ReportResult<()>;

    async fn health_check(&self) -> ReportResult<()>;

    async fn close(&self);
}
