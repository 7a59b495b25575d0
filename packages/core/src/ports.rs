//! Ports to the external collaborators: the broker and the audit store.
//!
//! The runtime only talks to these traits. Delivery, leasing, stall
//! detection and retry scheduling belong to whoever implements `BrokerQueue`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::{
    AuditRecord, BrokerError, Job, JobId, JobOptions, JobTemplate, PersistenceError, QueueEvent,
    RepeatPolicy, StoredAuditRecord,
};

/// Shared handle to one named broker queue.
pub type QueueHandle = Arc<dyn BrokerQueue>;

/// A connected broker client.
#[async_trait]
pub trait Broker: Send + Sync + 'static {
    /// Create a queue named `name`, or attach to it if the broker already has one.
    async fn create_queue(&self, name: &str) -> Result<QueueHandle, BrokerError>;

    /// Release the connection. Handles created from it stop working afterwards.
    async fn close(&self) -> Result<(), BrokerError> {
        Ok(())
    }
}

/// One named queue inside the broker.
#[async_trait]
pub trait BrokerQueue: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Durably store a job; resolves once the broker acknowledged it.
    async fn add(
        &self,
        job_name: &str,
        payload: serde_json::Value,
        options: JobOptions,
    ) -> Result<Job, BrokerError>;

    /// Take a lease on the next available job, if any.
    ///
    /// The broker guarantees a job is leased to at most one worker at a time
    /// and redelivers it when the lease expires.
    async fn lease(&self, worker_id: &str) -> Result<Option<Job>, BrokerError>;

    /// How long a lease lasts unless it is extended.
    fn lease_timeout(&self) -> Duration;

    /// Renew a held lease for another [`lease_timeout`](Self::lease_timeout).
    ///
    /// Fails with `LeaseMismatch` or `JobNotFound` once the lease was lost.
    async fn extend_lease(&self, job_id: &JobId, worker_id: &str) -> Result<(), BrokerError>;

    /// Report success for a leased job.
    async fn complete(
        &self,
        job_id: &JobId,
        worker_id: &str,
        return_value: serde_json::Value,
    ) -> Result<(), BrokerError>;

    /// Report failure for a leased job. The broker decides between retry and terminal failure.
    async fn fail(&self, job_id: &JobId, worker_id: &str, reason: &str) -> Result<(), BrokerError>;

    /// Subscribe to this queue's lifecycle events, in broker emission order.
    fn subscribe(&self) -> broadcast::Receiver<QueueEvent>;

    /// Create or replace a repeatable-job scheduler. Returns the first job when produced immediately.
    async fn upsert_scheduler(
        &self,
        scheduler_id: &str,
        repeat: RepeatPolicy,
        template: JobTemplate,
    ) -> Result<Option<Job>, BrokerError>;

    /// Remove a scheduler. Returns whether one existed.
    async fn remove_scheduler(&self, scheduler_id: &str) -> Result<bool, BrokerError>;
}

/// Append-only persistence for the audit trail.
#[async_trait]
pub trait AuditStore: Send + Sync + 'static {
    async fn create(&self, record: AuditRecord) -> Result<StoredAuditRecord, PersistenceError>;
}
