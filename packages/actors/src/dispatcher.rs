//! Producer-side entry point: enqueue jobs onto declared queues.

use queue_core::{Job, JobOptions, JobTemplate, QueueError, QueueHandle, RepeatPolicy};

use crate::registry::QueueRegistry;

/// Adds jobs to queues that were created during bootstrap. Cheap to clone.
///
/// Lookups never create queues: a name that was not declared fails with
/// [`QueueError::QueueNotFound`] before the broker is contacted.
#[derive(Clone, Debug)]
pub struct JobDispatcher {
    registry: QueueRegistry,
}

impl JobDispatcher {
    pub fn new(registry: QueueRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &QueueRegistry {
        &self.registry
    }

    /// Add a job and resolve once the broker has stored it.
    pub async fn enqueue(
        &self,
        queue_name: &str,
        job_name: &str,
        payload: serde_json::Value,
        options: JobOptions,
    ) -> Result<Job, QueueError> {
        let queue = self.queue(queue_name)?;
        let job = queue.add(job_name, payload, options).await?;

        tracing::info!(
            queue = %queue_name,
            job = %job_name,
            id = %job.id,
            "Job created"
        );

        Ok(job)
    }

    /// Create or replace a repeatable job scheduler on a declared queue.
    ///
    /// Returns the first job when the policy fires immediately.
    pub async fn upsert_scheduler(
        &self,
        queue_name: &str,
        scheduler_id: &str,
        repeat: RepeatPolicy,
        template: JobTemplate,
    ) -> Result<Option<Job>, QueueError> {
        let queue = self.queue(queue_name)?;
        let first = queue.upsert_scheduler(scheduler_id, repeat, template).await?;

        tracing::info!(
            queue = %queue_name,
            scheduler = %scheduler_id,
            "Job scheduler upserted"
        );

        Ok(first)
    }

    /// Remove a scheduler. Returns false if it did not exist.
    pub async fn remove_scheduler(
        &self,
        queue_name: &str,
        scheduler_id: &str,
    ) -> Result<bool, QueueError> {
        let queue = self.queue(queue_name)?;
        Ok(queue.remove_scheduler(scheduler_id).await?)
    }

    fn queue(&self, queue_name: &str) -> Result<QueueHandle, QueueError> {
        self.registry
            .get(queue_name)
            .ok_or_else(|| QueueError::QueueNotFound(queue_name.to_string()))
    }
}
