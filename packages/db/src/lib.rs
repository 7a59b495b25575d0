//! SurrealDB integration for the job queue audit trail.
//!
//! This crate provides database connectivity and the `queue_log`
//! repository that persists one row per queue lifecycle event.
//!
//! # Features
//!
//! - `memory` (default): Use in-memory storage for testing
//! - `rocksdb`: Use RocksDB for persistent file-based storage

mod connection;
mod schema;
pub mod repositories;

pub use connection::{Database, DbConfig, DbError, connect};
pub use schema::init_schema;

/// Connect to the database and make sure the schema exists.
///
/// Call once at application startup and pass the handle to whoever needs it.
pub async fn init(config: DbConfig) -> Result<Database, DbError> {
    let db = connect(&config).await?;
    init_schema(&db).await?;
    Ok(db)
}
