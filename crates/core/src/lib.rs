pub mod config;
pub mod errors;
pub mod logging;
pub mod models;
pub mod stats;
pub mod time_expr;

pub use config::*;
pub use errors::*;
pub use models::*;
pub use stats::{HostStats, OutcomeCounts};
pub use time_expr::parse_time_expression;
