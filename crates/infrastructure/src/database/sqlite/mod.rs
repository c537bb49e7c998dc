pub mod sqlite_report_repository;

pub use sqlite_report_repository::SqliteReportRepository;
