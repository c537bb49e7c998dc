pub mod app_config;
pub mod database;
pub mod logging;
pub mod report;
pub mod retry;

pub use app_config::AppConfig;
pub use database::{DatabaseConfig, DatabaseEngine};
pub use logging::LoggingConfig;
pub use report::ReportConfig;
pub use retry::RetryConfig;
