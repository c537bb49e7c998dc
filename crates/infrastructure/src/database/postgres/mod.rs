pub mod postgres_report_repository;

pub use postgres_report_repository::PostgresReportRepository;
