pub mod checksum;
pub mod database;
pub mod error_handling;
pub mod identity;
pub mod migrations;
pub mod recorder;

pub use checksum::playbook_checksum;
pub use database::*;
pub use identity::current_identity;
pub use migrations::{run_migrations, Migration, MigrationDirection, MIGRATIONS};
pub use recorder::{CallbackEvent, EventRecorder};
