//! SQLite result store for simulation campaigns.

pub mod export;
pub mod schema;
pub mod store;

pub use export::{export_csv, export_json};
pub use schema::{init_schema, load_config, SCHEMA_VERSION};
pub use store::{SqliteStore, DB_FILE_NAME};
