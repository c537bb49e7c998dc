//! 版本化的表结构升级
//!
//! 迁移按名称顺序执行（降级时逆序），已执行的迁移记录在 `migration` 表中。
//! 新建的数据库在建表时就会把全部内置迁移标记为已执行。

use std::str::FromStr;

use report_core::{ReportError, ReportResult};
use tracing::{info, warn};

use crate::database::DatabaseManager;

/// 单个迁移
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Migration {
    pub name: &'static str,
    pub description: &'static str,
    pub up: &'static [&'static str],
    pub down: &'static [&'static str],
}

/// 内置迁移，按名称排序
pub const MIGRATIONS: &[Migration] = &[Migration {
    name: "001_add_changed",
    description: "为任务增加changed列并根据已有数据回填",
    up: &[
        "ALTER TABLE task ADD COLUMN changed BOOLEAN NOT NULL DEFAULT FALSE",
        r#"UPDATE task SET changed = TRUE WHERE data LIKE '%"changed": true%' OR data LIKE '%"changed":true%'"#,
        "CREATE INDEX IF NOT EXISTS ix_task_changed ON task (changed)",
    ],
    down: &[
        "DROP INDEX IF EXISTS ix_task_changed",
        "ALTER TABLE task DROP COLUMN changed",
    ],
}];

/// 迁移方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationDirection {
    Up,
    Down,
}

impl MigrationDirection {
    pub fn statements(&self, migration: &Migration) -> &'static [&'static str] {
        match self {
            MigrationDirection::Up => migration.up,
            MigrationDirection::Down => migration.down,
        }
    }
}

impl FromStr for MigrationDirection {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "up" | "upgrade" => Ok(MigrationDirection::Up),
            "down" | "downgrade" => Ok(MigrationDirection::Down),
            _ => Err(ReportError::migration(format!("未知的迁移方向: {s}"))),
        }
    }
}

/// 选出需要执行的迁移，保证执行顺序
pub fn plan(
    direction: MigrationDirection,
    only: Option<&str>,
) -> ReportResult<Vec<&'static Migration>> {
    let mut selected: Vec<&'static Migration> = match only {
        Some(name) => {
            let migration = MIGRATIONS
                .iter()
                .find(|m| m.name == name)
                .ok_or_else(|| ReportError::migration(format!("未知的迁移: {name}")))?;
            vec![migration]
        }
        None => MIGRATIONS.iter().collect(),
    };

    selected.sort_by_key(|m| m.name);
    if direction == MigrationDirection::Down {
        selected.reverse();
    }
    Ok(selected)
}

/// 执行迁移，返回实际执行的迁移名称
///
/// 升级时跳过已执行的迁移，降级时跳过未执行的迁移，两者都只记录警告。
pub async fn run_migrations(
    manager: &DatabaseManager,
    direction: MigrationDirection,
    only: Option<&str>,
) -> ReportResult<Vec<&'static str>> {
    let planned = plan(direction, only)?;
    let applied = manager.applied_migrations().await?;
    let mut executed = Vec::new();

    for migration in planned {
        let is_applied = applied.iter().any(|name| name == migration.name);
        match (direction, is_applied) {
            (MigrationDirection::Up, true) => {
                warn!("迁移 {} 已执行，跳过", migration.name);
                continue;
            }
            (MigrationDirection::Down, false) => {
                warn!("迁移 {} 尚未执行，跳过", migration.name);
                continue;
            }
            _ => {}
        }

        info!(
            "执行迁移 {} ({:?}): {}",
            migration.name, direction, migration.description
        );
        manager.apply_migration(migration, direction).await?;
        executed.push(migration.name);
    }

    Ok(executed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_order() {
        let up = plan(MigrationDirection::Up, None).unwrap();
        assert_eq!(up.first().map(|m| m.name), Some("001_add_changed"));

        let down = plan(MigrationDirection::Down, None).unwrap();
        assert_eq!(down.len(), MIGRATIONS.len());
    }

    #[test]
    fn test_plan_unknown_migration() {
        assert!(matches!(
            plan(MigrationDirection::Up, Some("999_nothing")),
            Err(ReportError::Migration(_))
        ));
    }

    #[test]
    fn test_direction_parse() {
        assert_eq!("UP".parse::<MigrationDirection>().unwrap(), MigrationDirection::Up);
        assert_eq!(
            "downgrade".parse::<MigrationDirection>().unwrap(),
            MigrationDirection::Down
        );
        assert!("sideways".parse::<MigrationDirection>().is_err());
    }
}
