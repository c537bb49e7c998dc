//! 表结构定义
//!
//! `user` 是PostgreSQL的保留字，所有语句中都加引号。`task.changed` 上的索引由迁移
//! `001_add_changed` 负责，新建数据库时在建表后单独创建。

pub const SQLITE_SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS "user" (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL,
        euid TEXT NOT NULL,
        UNIQUE (username, euid)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS playbook (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        path TEXT NOT NULL,
        uuid TEXT NOT NULL,
        user_id INTEGER NOT NULL REFERENCES "user" (id) ON DELETE CASCADE,
        connection TEXT NOT NULL,
        starttime TEXT NOT NULL,
        endtime TEXT,
        checksum TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS task (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp TEXT NOT NULL,
        hostname TEXT NOT NULL,
        module TEXT,
        result TEXT NOT NULL,
        changed BOOLEAN NOT NULL DEFAULT FALSE,
        data TEXT,
        user_id INTEGER NOT NULL REFERENCES "user" (id) ON DELETE CASCADE,
        playbook_id INTEGER REFERENCES playbook (id) ON DELETE CASCADE
    )"#,
];

pub const POSTGRES_SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS "user" (
        id BIGSERIAL PRIMARY KEY,
        username TEXT NOT NULL,
        euid TEXT NOT NULL,
        UNIQUE (username, euid)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS playbook (
        id BIGSERIAL PRIMARY KEY,
        path TEXT NOT NULL,
        uuid TEXT NOT NULL,
        user_id BIGINT NOT NULL REFERENCES "user" (id) ON DELETE CASCADE,
        connection TEXT NOT NULL,
        starttime TIMESTAMPTZ NOT NULL,
        endtime TIMESTAMPTZ,
        checksum TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS task (
        id BIGSERIAL PRIMARY KEY,
        timestamp TIMESTAMPTZ NOT NULL,
        hostname TEXT NOT NULL,
        module TEXT,
        result TEXT NOT NULL,
        changed BOOLEAN NOT NULL DEFAULT FALSE,
        data TEXT,
        user_id BIGINT NOT NULL REFERENCES "user" (id) ON DELETE CASCADE,
        playbook_id BIGINT REFERENCES playbook (id) ON DELETE CASCADE
    )"#,
];

/// 两种后端通用的索引与迁移记录表
pub const COMMON_SCHEMA: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS ix_task_timestamp ON task (timestamp)",
    "CREATE INDEX IF NOT EXISTS ix_task_hostname ON task (hostname)",
    "CREATE INDEX IF NOT EXISTS ix_task_module ON task (module)",
    "CREATE INDEX IF NOT EXISTS ix_task_result ON task (result)",
    "CREATE INDEX IF NOT EXISTS ix_task_playbook_id ON task (playbook_id)",
    "CREATE INDEX IF NOT EXISTS ix_playbook_path ON playbook (path)",
    "CREATE INDEX IF NOT EXISTS ix_playbook_uuid ON playbook (uuid)",
    "CREATE INDEX IF NOT EXISTS ix_playbook_connection ON playbook (connection)",
    "CREATE INDEX IF NOT EXISTS ix_playbook_starttime ON playbook (starttime)",
    "CREATE TABLE IF NOT EXISTS migration (
        name TEXT PRIMARY KEY,
        applied_at TEXT NOT NULL
    )",
];

/// 只在新建数据库时执行
pub const FRESH_SCHEMA: &[&str] = &["CREATE INDEX IF NOT EXISTS ix_task_changed ON task (changed)"];

pub const SQLITE_TASK_TABLE_EXISTS: &str =
    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'task'";

pub const POSTGRES_TASK_TABLE_EXISTS: &str = "SELECT COUNT(*) FROM information_schema.tables \
     WHERE table_schema = current_schema() AND table_name = 'task'";

pub const STAMP_MIGRATION: &str =
    "INSERT INTO migration (name, applied_at) VALUES ($1, $2) ON CONFLICT (name) DO NOTHING";

pub const UNSTAMP_MIGRATION: &str = "DELETE FROM migration WHERE name = $1";

pub const APPLIED_MIGRATIONS: &str = "SELECT name FROM migration ORDER BY name";
