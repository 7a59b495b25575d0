use db::{Database, DbConfig, DbError};

/// Fresh in-memory database with the schema applied.
pub async fn setup_db() -> Result<Database, DbError> {
    db::init(DbConfig::memory()).await
}
