use report_core::config::*;
use report_core::logging::LogFormat;
use std::fs;
use tempfile::NamedTempFile;

#[test]
fn test_default_config() {
    let config = AppConfig::default();
    assert!(config.validate().is_ok());

    // 验证默认值
    assert_eq!(config.database.engine_kind().unwrap(), DatabaseEngine::Sqlite);
    assert_eq!(config.database.name, "ansible-report.db");
    assert_eq!(config.retry.backoff_max_ms, 60_000);
    assert_eq!(config.report.limit, 0);
    assert_eq!(config.logging.format, LogFormat::Text);
}

#[test]
fn test_complete_config_file() {
    let toml_content = r#"
[database]
engine = "postgres"
name = "reports"
host = "db.internal"
port = 5433
user = "ansible"
password = "secret"
max_connections = 8

[retry]
backoff_start_ms = 50
backoff_multiplier = 1.5
backoff_max_ms = 30000
jitter_factor = 0.2

[report]
output = ["screen", "logstalgia"]
verbose = true
limit = 100
since = "1 day ago"

[logging]
level = "debug"
format = "json"
"#;

    let temp_file = NamedTempFile::new().unwrap();
    fs::write(temp_file.path(), toml_content).unwrap();

    let config = AppConfig::load(temp_file.path().to_str()).unwrap();

    assert_eq!(config.database.engine_kind().unwrap(), DatabaseEngine::Postgres);
    assert_eq!(config.database.host, "db.internal");
    assert_eq!(config.database.port, 5433);
    assert_eq!(config.database.pool_size(), 8);
    assert_eq!(config.retry.backoff_start().as_millis(), 50);
    assert_eq!(config.report.output, vec!["screen", "logstalgia"]);
    assert_eq!(config.report.since.as_deref(), Some("1 day ago"));
    assert_eq!(config.logging.format, LogFormat::Json);
}

#[test]
fn test_invalid_config_file() {
    let temp_file = NamedTempFile::new().unwrap();
    // PostgreSQL 需要用户名
    fs::write(temp_file.path(), "[database]\nengine = \"postgres\"\n").unwrap();

    assert!(AppConfig::load(temp_file.path().to_str()).is_err());
}
