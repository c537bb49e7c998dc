use async_trait::async_trait;
use chrono::{DateTime, Utc};
use report_core::{
    DatabaseEngine, Identity, NewPlaybook, NewTask, Playbook, ReportResult, Task, User,
};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tracing::{debug, instrument};

use crate::{
    database::{
        mapping::{MappingHelpers, PLAYBOOK_COLUMNS, TASK_COLUMNS, USER_COLUMNS},
        query_builder::{push_order_and_limit, push_where, Entity, Filter},
        repository::ReportRepository,
        schema,
    },
    error_handling::{RepositoryErrorHelpers, RepositoryOperation},
    migrations::{Migration, MigrationDirection},
    op_context,
};

pub struct PostgresReportRepository {
    pool: PgPool,
}

impl PostgresReportRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ReportRepository for PostgresReportRepository {
    fn engine(&self) -> DatabaseEngine {
        DatabaseEngine::Postgres
    }

    #[instrument(skip(self))]
    async fn create_tables(&self, migrations: &[&str]) -> ReportResult<()> {
        let context = op_context!(RepositoryOperation::Schema, "表结构");
        let map_err = |e: sqlx::Error| RepositoryErrorHelpers::database_error(&context, e);

        let mut tx = self.pool.begin().await.map_err(map_err)?;

        let existing: i64 = sqlx::query_scalar(schema::POSTGRES_TASK_TABLE_EXISTS)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_err)?;
        let fresh = existing == 0;

        for statement in schema::POSTGRES_SCHEMA.iter().chain(schema::COMMON_SCHEMA) {
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .map_err(map_err)?;
        }

        if fresh {
            for statement in schema::FRESH_SCHEMA {
                sqlx::query(statement)
                    .execute(&mut *tx)
                    .await
                    .map_err(map_err)?;
            }
            let applied_at = Utc::now().to_rfc3339();
            for name in migrations {
                sqlx::query(schema::STAMP_MIGRATION)
                    .bind(*name)
                    .bind(&applied_at)
                    .execute(&mut *tx)
                    .await
                    .map_err(map_err)?;
            }
        }

        tx.commit().await.map_err(map_err)?;
        debug!("PostgreSQL表结构就绪 (新建: {})", fresh);
        Ok(())
    }

    async fn find_user(&self, identity: &Identity) -> ReportResult<Option<User>> {
        let context = op_context!(RepositoryOperation::Read, "用户", info = identity.to_string());

        let row = sqlx::query(&format!(
            r#"SELECT {USER_COLUMNS} FROM "user" WHERE username = $1 AND euid = $2"#
        ))
        .bind(&identity.username)
        .bind(&identity.euid)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        row.as_ref().map(MappingHelpers::postgres_user).transpose()
    }

    async fn get_user(&self, id: i64) -> ReportResult<Option<User>> {
        let context = op_context!(RepositoryOperation::Read, "用户", id = id);

        let row = sqlx::query(&format!(r#"SELECT {USER_COLUMNS} FROM "user" WHERE id = $1"#))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        row.as_ref().map(MappingHelpers::postgres_user).transpose()
    }

    #[instrument(skip(self), fields(username = %identity.username, euid = %identity.euid))]
    async fn insert_user(&self, identity: &Identity) -> ReportResult<User> {
        let context = op_context!(RepositoryOperation::Create, "用户", info = identity.to_string());

        let row = sqlx::query(&format!(
            r#"INSERT INTO "user" (username, euid) VALUES ($1, $2) RETURNING {USER_COLUMNS}"#
        ))
        .bind(&identity.username)
        .bind(&identity.euid)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        let user = MappingHelpers::postgres_user(&row)?;
        RepositoryErrorHelpers::log_operation_success(&context.with_id(user.id), None);
        Ok(user)
    }

    #[instrument(skip(self, task), fields(hostname = %task.hostname, result = %task.result))]
    async fn insert_task(
        &self,
        task: &NewTask,
        user_id: i64,
        playbook_id: Option<i64>,
        timestamp: DateTime<Utc>,
    ) -> ReportResult<Task> {
        let context = op_context!(RepositoryOperation::Create, "任务", info = task.hostname.clone());
        let data = task.data.as_ref().map(|d| d.to_stored()).transpose()?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO task (timestamp, hostname, module, result, changed, data, user_id, playbook_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(timestamp)
        .bind(&task.hostname)
        .bind(&task.module)
        .bind(task.result)
        .bind(task.changed())
        .bind(data)
        .bind(user_id)
        .bind(playbook_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        let created = MappingHelpers::postgres_task(&row)?;
        debug!("{}", created.entity_description());
        Ok(created)
    }

    #[instrument(skip(self, playbook), fields(path = %playbook.path, uuid = %playbook.uuid))]
    async fn insert_playbook(
        &self,
        playbook: &NewPlaybook,
        user_id: i64,
    ) -> ReportResult<Playbook> {
        let context = op_context!(RepositoryOperation::Create, "运行", info = playbook.path.clone());

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO playbook (path, uuid, user_id, connection, starttime, endtime, checksum)
            VALUES ($1, $2, $3, $4, $5, NULL, $6)
            RETURNING {PLAYBOOK_COLUMNS}
            "#
        ))
        .bind(&playbook.path)
        .bind(&playbook.uuid)
        .bind(user_id)
        .bind(&playbook.connection)
        .bind(playbook.starttime)
        .bind(&playbook.checksum)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        let created = MappingHelpers::postgres_playbook(&row)?;
        RepositoryErrorHelpers::log_operation_success(
            &context.with_id(created.id),
            Some(&format!("校验值: {}", created.checksum)),
        );
        Ok(created)
    }

    #[instrument(skip(self))]
    async fn finish_playbook(&self, id: i64, endtime: DateTime<Utc>) -> ReportResult<Playbook> {
        let context = op_context!(RepositoryOperation::Update, "运行", id = id);

        let row = sqlx::query(&format!(
            "UPDATE playbook SET endtime = $2 WHERE id = $1 RETURNING {PLAYBOOK_COLUMNS}"
        ))
        .bind(id)
        .bind(endtime)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        let updated = MappingHelpers::postgres_playbook(&row)?;
        RepositoryErrorHelpers::log_operation_success(&context, None);
        Ok(updated)
    }

    async fn get_playbook(&self, id: i64) -> ReportResult<Option<Playbook>> {
        let context = op_context!(RepositoryOperation::Read, "运行", id = id);

        let row = sqlx::query(&format!(
            "SELECT {PLAYBOOK_COLUMNS} FROM playbook WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        row.as_ref().map(MappingHelpers::postgres_playbook).transpose()
    }

    async fn find_tasks(&self, filter: &Filter, limit: u64) -> ReportResult<Vec<Task>> {
        let context = op_context!(RepositoryOperation::Query, "任务");

        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {TASK_COLUMNS} FROM task"));
        push_where(&mut qb, filter);
        push_order_and_limit(&mut qb, Entity::Task, limit);
        debug!("执行查询: {}", qb.sql());

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        rows.iter().map(MappingHelpers::postgres_task).collect()
    }

    async fn find_playbooks(&self, filter: &Filter, limit: u64) -> ReportResult<Vec<Playbook>> {
        let context = op_context!(RepositoryOperation::Query, "运行");

        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {PLAYBOOK_COLUMNS} FROM playbook"));
        push_where(&mut qb, filter);
        push_order_and_limit(&mut qb, Entity::Playbook, limit);
        debug!("执行查询: {}", qb.sql());

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        rows.iter().map(MappingHelpers::postgres_playbook).collect()
    }

    async fn tasks_for_playbook(&self, playbook_id: i64) -> ReportResult<Vec<Task>> {
        let context = op_context!(RepositoryOperation::Query, "任务", id = playbook_id);

        let rows = sqlx::query(&format!(
            "SELECT {TASK_COLUMNS} FROM task WHERE playbook_id = $1 ORDER BY timestamp ASC, id ASC"
        ))
        .bind(playbook_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        rows.iter().map(MappingHelpers::postgres_task).collect()
    }

    #[instrument(skip(self, filter), fields(table = filter.entity.table()))]
    async fn delete(&self, filter: &Filter) -> ReportResult<u64> {
        let context = op_context!(RepositoryOperation::Delete, filter.entity.table());

        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("DELETE FROM {}", filter.entity.table()));
        push_where(&mut qb, filter);
        debug!("执行删除: {}", qb.sql());

        let result = qb
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        RepositoryErrorHelpers::log_operation_success(
            &context,
            Some(&format!("删除 {} 条记录", result.rows_affected())),
        );
        Ok(result.rows_affected())
    }

    /// PostgreSQL由autovacuum回收空间
    async fn vacuum(&self) -> ReportResult<()> {
        debug!("PostgreSQL无需手动VACUUM，跳过");
        Ok(())
    }

    async fn applied_migrations(&self) -> ReportResult<Vec<String>> {
        let context = op_context!(RepositoryOperation::Query, "迁移记录");

        let rows = sqlx::query(schema::APPLIED_MIGRATIONS)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        Ok(rows
            .iter()
            .map(|row| row.try_get("name"))
            .collect::<Result<Vec<String>, _>>()?)
    }

    #[instrument(skip(self, migration), fields(migration = migration.name))]
    async fn apply_migration(
        &self,
        migration: &Migration,
        direction: MigrationDirection,
    ) -> ReportResult<()> {
        let context = op_context!(RepositoryOperation::Migrate, "迁移", info = migration.name);
        let map_err = |e: sqlx::Error| RepositoryErrorHelpers::database_error(&context, e);

        let mut tx = self.pool.begin().await.map_err(map_err)?;

        for statement in direction.statements(migration) {
            let result = sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .map_err(map_err)?;
            debug!("{} 影响 {} 行", statement, result.rows_affected());
        }

        match direction {
            MigrationDirection::Up => {
                sqlx::query(schema::STAMP_MIGRATION)
                    .bind(migration.name)
                    .bind(Utc::now().to_rfc3339())
                    .execute(&mut *tx)
                    .await
                    .map_err(map_err)?;
            }
            MigrationDirection::Down => {
                sqlx::query(schema::UNSTAMP_MIGRATION)
                    .bind(migration.name)
                    .execute(&mut *tx)
                    .await
                    .map_err(map_err)?;
            }
        }

        tx.commit().await.map_err(map_err)?;
        RepositoryErrorHelpers::log_operation_success(&context, None);
        Ok(())
    }

    async fn health_check(&self) -> ReportResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
