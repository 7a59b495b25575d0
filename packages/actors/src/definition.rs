//! Typed job definitions.
//!
//! A job kind is a `(queue name, job name)` pair plus a payload type. The
//! definition serializes payloads on the way in and decodes them on the way
//! out, so producers and workers agree on the shape at compile time.

use std::marker::PhantomData;

use queue_core::{Job, JobError, JobOptions, QueueError};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::dispatcher::JobDispatcher;

/// Static identity of a job kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobKind {
    pub queue_name: &'static str,
    pub job_name: &'static str,
}

impl JobKind {
    pub const fn new(queue_name: &'static str, job_name: &'static str) -> Self {
        Self {
            queue_name,
            job_name,
        }
    }
}

/// Distinct queue names for a set of job kinds, in first-seen order.
pub fn queue_names(kinds: &[JobKind]) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(kinds.len());
    for kind in kinds {
        if !names.iter().any(|n| n == kind.queue_name) {
            names.push(kind.queue_name.to_string());
        }
    }
    names
}

/// Producer and decoder for one job kind with payload type `P`.
pub struct JobDefinition<P> {
    kind: JobKind,
    dispatcher: JobDispatcher,
    _payload: PhantomData<fn() -> P>,
}

impl<P> Clone for JobDefinition<P> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            dispatcher: self.dispatcher.clone(),
            _payload: PhantomData,
        }
    }
}

impl<P> std::fmt::Debug for JobDefinition<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobDefinition")
            .field("kind", &self.kind)
            .finish()
    }
}

impl<P> JobDefinition<P>
where
    P: Serialize + DeserializeOwned + Send + Sync,
{
    pub fn new(dispatcher: JobDispatcher, kind: JobKind) -> Self {
        Self {
            kind,
            dispatcher,
            _payload: PhantomData,
        }
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    pub fn queue_name(&self) -> &'static str {
        self.kind.queue_name
    }

    pub fn job_name(&self) -> &'static str {
        self.kind.job_name
    }

    /// Enqueue a job of this kind with default options.
    pub async fn queue(&self, payload: &P) -> Result<Job, QueueError> {
        self.queue_with(payload, JobOptions::default()).await
    }

    /// Enqueue a job of this kind with explicit broker options.
    pub async fn queue_with(&self, payload: &P, options: JobOptions) -> Result<Job, QueueError> {
        let payload =
            serde_json::to_value(payload).map_err(|e| QueueError::Serialization(e.to_string()))?;
        self.dispatcher
            .enqueue(self.kind.queue_name, self.kind.job_name, payload, options)
            .await
    }

    /// Decode a delivered job's payload.
    pub fn decode(&self, job: &Job) -> Result<P, JobError> {
        job.payload_as()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_names_are_deduplicated_in_order() {
        let kinds = [
            JobKind::new("mailQueue", "UserMailWorker"),
            JobKind::new("helloQueue", "HelloWorker"),
            JobKind::new("mailQueue", "DigestWorker"),
        ];
        assert_eq!(queue_names(&kinds), vec!["mailQueue", "helloQueue"]);
    }
}
