use anyhow::Result;
use chrono::Utc;
use report_core::{FilterArgs, ReportError};
use report_infrastructure::{FindOptions, MigrationDirection};
use sqlx::SqlitePool;

mod database_test_utils;
use database_test_utils::{alice, SqliteTestDatabase};

async fn has_changed_column(pool: &SqlitePool) -> Result<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM pragma_table_info('task') WHERE name = 'changed'")
            .fetch_one(pool)
            .await?;
    Ok(count == 1)
}

#[tokio::test]
async fn test_fresh_database_is_stamped() -> Result<()> {
    let db = SqliteTestDatabase::new()?;
    let manager = db.manager(alice()).await?;

    assert_eq!(manager.applied_migrations().await?, vec!["001_add_changed"]);
    // 已标记的迁移不会重复执行
    assert!(manager.migrate(MigrationDirection::Up, None).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_downgrade_then_upgrade_backfills_changed() -> Result<()> {
    let db = SqliteTestDatabase::new()?;
    let manager = db.manager(alice()).await?;
    let user = manager.current_user().await?;
    let pool = db.raw_pool().await?;

    let executed = manager.migrate(MigrationDirection::Down, None).await?;
    assert_eq!(executed, vec!["001_add_changed"]);
    assert!(!has_changed_column(&pool).await?);
    assert!(manager.applied_migrations().await?.is_empty());

    // 降级后按旧结构写入
    for (host, data) in [
        ("web1", r#"{"changed": true, "rc": 0}"#),
        ("web2", r#"{"changed":true}"#),
        ("web3", r#"{"changed": false}"#),
    ] {
        sqlx::query(
            "INSERT INTO task (timestamp, hostname, result, data, user_id) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(Utc::now())
        .bind(host)
        .bind("OK")
        .bind(data)
        .bind(user.id)
        .execute(&pool)
        .await?;
    }

    let executed = manager.migrate(MigrationDirection::Up, None).await?;
    assert_eq!(executed, vec!["001_add_changed"]);
    assert!(has_changed_column(&pool).await?);
    assert_eq!(manager.applied_migrations().await?, vec!["001_add_changed"]);

    let changed = manager
        .find_tasks(
            Some(&FilterArgs::new().with("changed", true)),
            FindOptions::default(),
        )
        .await?;
    let mut hosts: Vec<_> = changed.iter().map(|t| t.hostname.clone()).collect();
    hosts.sort();
    assert_eq!(hosts, vec!["web1", "web2"]);
    Ok(())
}

#[tokio::test]
async fn test_downgrade_twice_is_skipped() -> Result<()> {
    let db = SqliteTestDatabase::new()?;
    let manager = db.manager(alice()).await?;

    manager
        .migrate(MigrationDirection::Down, Some("001_add_changed"))
        .await?;
    let second = manager
        .migrate(MigrationDirection::Down, Some("001_add_changed"))
        .await?;
    assert!(second.is_empty());

    let unknown = manager.migrate(MigrationDirection::Up, Some("042_missing")).await;
    assert!(matches!(unknown, Err(ReportError::Migration(_))));
    Ok(())
}
