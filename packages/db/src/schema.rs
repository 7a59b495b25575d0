//! Database schema definitions using SurrealQL.

use crate::{Database, DbError};

/// Initialize the database schema.
///
/// This creates all necessary tables, fields, and indexes. Safe to run repeatedly.
pub async fn init_schema(db: &Database) -> Result<(), DbError> {
    tracing::info!("Initializing database schema...");

    db.query(QUEUE_LOG_SCHEMA).await?.check()?;

    tracing::info!("Database schema initialized");

    Ok(())
}

/// Audit trail of queue lifecycle events. Rows are only ever appended.
const QUEUE_LOG_SCHEMA: &str = r#"
DEFINE TABLE IF NOT EXISTS queue_log SCHEMAFULL;

DEFINE FIELD IF NOT EXISTS seq ON queue_log TYPE int;
DEFINE FIELD IF NOT EXISTS queue ON queue_log TYPE string;
DEFINE FIELD IF NOT EXISTS job_id ON queue_log TYPE string;
DEFINE FIELD IF NOT EXISTS event ON queue_log TYPE string
    ASSERT $value IN ["waiting", "active", "completed", "failed", "stalled"];
DEFINE FIELD IF NOT EXISTS details ON queue_log TYPE option<string>;
DEFINE FIELD IF NOT EXISTS created_at ON queue_log TYPE datetime DEFAULT time::now();
DEFINE FIELD IF NOT EXISTS modified_at ON queue_log TYPE datetime DEFAULT time::now();

-- Indexes for audit lookups
DEFINE INDEX IF NOT EXISTS queue_log_seq ON queue_log FIELDS seq UNIQUE;
DEFINE INDEX IF NOT EXISTS queue_log_job ON queue_log FIELDS queue, job_id;
DEFINE INDEX IF NOT EXISTS queue_log_event ON queue_log FIELDS event;
"#;
