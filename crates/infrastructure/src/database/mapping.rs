//! 行到模型的映射
//!
//! SQLite和PostgreSQL的行类型不同，映射逻辑相同，由宏为两种行类型各生成一份。

use report_core::{Payload, Playbook, ReportResult, Task, User};
use sqlx::Row;

pub const USER_COLUMNS: &str = "id, username, euid";
pub const PLAYBOOK_COLUMNS: &str = "id, path, uuid, user_id, connection, starttime, endtime, checksum";
pub const TASK_COLUMNS: &str =
    "id, timestamp, hostname, module, result, changed, data, user_id, playbook_id";

/// Helper functions for mapping rows of both backends
pub struct MappingHelpers;

macro_rules! row_mappers {
    ($row:ty => $user:ident, $playbook:ident, $task:ident) => {
        impl MappingHelpers {
            pub fn $user(row: &$row) -> ReportResult<User> {
                Ok(User {
                    id: row.try_get("id")?,
                    username: row.try_get("username")?,
                    euid: row.try_get("euid")?,
                })
            }

            pub fn $playbook(row: &$row) -> ReportResult<Playbook> {
                Ok(Playbook {
                    id: row.try_get("id")?,
                    path: row.try_get("path")?,
                    uuid: row.try_get("uuid")?,
                    user_id: row.try_get("user_id")?,
                    connection: row.try_get("connection")?,
                    starttime: row.try_get("starttime")?,
                    endtime: row.try_get("endtime")?,
                    checksum: row.try_get("checksum")?,
                })
            }

            pub fn $task(row: &$row) -> ReportResult<Task> {
                let data: Option<String> = row.try_get("data")?;
                Ok(Task {
                    id: row.try_get("id")?,
                    timestamp: row.try_get("timestamp")?,
                    hostname: row.try_get("hostname")?,
                    module: row.try_get("module")?,
                    result: row.try_get("result")?,
                    changed: row.try_get("changed")?,
                    data: data.map(Payload::from_stored),
                    user_id: row.try_get("user_id")?,
                    playbook_id: row.try_get("playbook_id")?,
                })
            }
        }
    };
}

row_mappers!(sqlx::sqlite::SqliteRow => sqlite_user, sqlite_playbook, sqlite_task);
row_mappers!(sqlx::postgres::PgRow => postgres_user, postgres_playbook, postgres_task);
