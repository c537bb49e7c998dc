pub mod lock;
pub mod manager;
pub mod mapping;
pub mod postgres;
pub mod query_builder;
pub mod repository;
pub mod retry;
pub mod schema;
pub mod sqlite;

pub use lock::{FileLock, LockGuard};
pub use manager::{DatabaseManager, DatabasePool, FindOptions};
pub use postgres::PostgresReportRepository;
pub use query_builder::{build_filter, BindValue, ColumnKind, Entity, Filter, Predicate};
pub use repository::ReportRepository;
pub use retry::RetryExecutor;
pub use sqlite::SqliteReportRepository;
