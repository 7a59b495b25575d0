//! In-memory audit store.
//!
//! Used in tests and when no database is configured. Records are kept in
//! insertion order and numbered from 1.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use queue_core::{AuditRecord, AuditStore, JobId, PersistenceError, StoredAuditRecord};

#[derive(Default)]
pub struct MemoryAuditStore {
    records: Mutex<Vec<StoredAuditRecord>>,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record written so far.
    pub fn records(&self) -> Vec<StoredAuditRecord> {
        self.lock().clone()
    }

    /// Records for one job, oldest first.
    pub fn for_job(&self, queue: &str, job_id: &JobId) -> Vec<StoredAuditRecord> {
        self.lock()
            .iter()
            .filter(|r| r.queue == queue && &r.job_id == job_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<StoredAuditRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn create(&self, record: AuditRecord) -> Result<StoredAuditRecord, PersistenceError> {
        let mut records = self.lock();
        let stored = StoredAuditRecord::from_record(records.len() as u64 + 1, record);
        records.push(stored.clone());
        Ok(stored)
    }
}
