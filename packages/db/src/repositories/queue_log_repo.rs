//! Queue log repository: the append-only audit trail of queue events.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use queue_core::{AuditRecord, AuditStore, JobId, PersistenceError, QueueEventKind, StoredAuditRecord};
use serde::{Deserialize, Serialize};

use crate::{Database, DbError};

/// Repository for `queue_log` rows.
///
/// Rows are inserted and read, never updated or deleted. `seq` is assigned
/// in-process, seeded from the highest stored value when the repository opens.
pub struct QueueLogRepository {
    db: Database,
    next_seq: AtomicU64,
}

/// Internal record type for SurrealDB reads.
#[derive(Debug, Deserialize)]
struct QueueLogRecord {
    seq: i64,
    queue: String,
    job_id: String,
    event: QueueEventKind,
    details: Option<String>,
    created_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
}

impl QueueLogRecord {
    fn into_stored(self) -> StoredAuditRecord {
        StoredAuditRecord {
            seq: self.seq.max(0) as u64,
            queue: self.queue,
            job_id: JobId(self.job_id),
            event: self.event,
            details: self.details,
            created_at: self.created_at,
            modified_at: self.modified_at,
        }
    }
}

/// Struct for inserts - omits datetime fields to use SurrealDB defaults.
#[derive(Debug, Clone, Serialize)]
struct QueueLogCreate {
    seq: i64,
    queue: String,
    job_id: String,
    event: QueueEventKind,
    details: Option<String>,
}

impl QueueLogRepository {
    /// Open the repository on an initialized database.
    pub async fn open(db: Database) -> Result<Self, DbError> {
        #[derive(Deserialize)]
        struct SeqOnly {
            seq: i64,
        }

        let mut result = db
            .query("SELECT seq FROM queue_log ORDER BY seq DESC LIMIT 1")
            .await?;
        let last: Vec<SeqOnly> = result.take(0)?;
        let next = last.first().map_or(1, |r| r.seq.max(0) as u64 + 1);

        Ok(Self {
            db,
            next_seq: AtomicU64::new(next),
        })
    }

    /// Append one audit row.
    pub async fn insert(&self, record: AuditRecord) -> Result<StoredAuditRecord, DbError> {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let create = QueueLogCreate {
            seq: i64::try_from(seq)
                .map_err(|_| DbError::Serialization(format!("seq overflow: {}", seq)))?,
            queue: record.queue,
            job_id: record.job_id.0,
            event: record.event,
            details: record.details,
        };

        let created: Option<QueueLogRecord> = self.db.create("queue_log").content(create).await?;

        created
            .map(QueueLogRecord::into_stored)
            .ok_or_else(|| DbError::Query("Failed to create queue log".into()))
    }

    /// All events recorded for one job, oldest first.
    pub async fn list_for_job(
        &self,
        queue: &str,
        job_id: &JobId,
    ) -> Result<Vec<StoredAuditRecord>, DbError> {
        let mut result = self
            .db
            .query("SELECT * FROM queue_log WHERE queue = $queue AND job_id = $job_id ORDER BY seq ASC")
            .bind(("queue", queue.to_string()))
            .bind(("job_id", job_id.to_string()))
            .await?;

        let records: Vec<QueueLogRecord> = result.take(0)?;

        Ok(records.into_iter().map(QueueLogRecord::into_stored).collect())
    }

    /// Most recent events for a queue, newest first.
    pub async fn list_for_queue(
        &self,
        queue: &str,
        limit: usize,
    ) -> Result<Vec<StoredAuditRecord>, DbError> {
        let mut result = self
            .db
            .query("SELECT * FROM queue_log WHERE queue = $queue ORDER BY seq DESC LIMIT $limit")
            .bind(("queue", queue.to_string()))
            .bind(("limit", limit as i64))
            .await?;

        let records: Vec<QueueLogRecord> = result.take(0)?;

        Ok(records.into_iter().map(QueueLogRecord::into_stored).collect())
    }

    /// Count events of one kind for a queue.
    pub async fn count_by_event(&self, queue: &str, event: QueueEventKind) -> Result<u64, DbError> {
        #[derive(Deserialize)]
        struct CountResult {
            count: i64,
        }

        let mut result = self
            .db
            .query("SELECT count() FROM queue_log WHERE queue = $queue AND event = $event GROUP ALL")
            .bind(("queue", queue.to_string()))
            .bind(("event", event.as_str().to_string()))
            .await?;

        let counts: Vec<CountResult> = result.take(0)?;

        Ok(counts.first().map_or(0, |c| c.count.max(0) as u64))
    }
}

#[async_trait]
impl AuditStore for QueueLogRepository {
    async fn create(&self, record: AuditRecord) -> Result<StoredAuditRecord, PersistenceError> {
        let stored = self.insert(record).await?;
        tracing::debug!(
            seq = stored.seq,
            queue = %stored.queue,
            job_id = %stored.job_id,
            event = %stored.event,
            "Queue log written"
        );
        Ok(stored)
    }
}
