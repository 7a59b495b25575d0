//! Error taxonomy for the job queue system.

use thiserror::Error;

use crate::JobId;

/// The broker could not be reached or its URL is unusable.
///
/// Fatal to the owning process; there is no reconnect in-core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("Invalid broker url \"{url}\": {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Unsupported broker scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Broker unreachable at {host}:{port}: {reason}")]
    Unreachable {
        host: String,
        port: u16,
        reason: String,
    },
}

/// Errors reported by a broker client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    #[error("Broker connection lost: {0}")]
    Disconnected(String),

    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    #[error("Job {job_id} is not leased by {worker_id}")]
    LeaseMismatch { job_id: JobId, worker_id: String },

    #[error("Duplicate job id: {0}")]
    DuplicateJob(JobId),

    #[error("Broker error: {0}")]
    Other(String),
}

/// Errors surfaced to producers and bootstrap code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// Enqueue against an undeclared queue name. Programmer error, never retried.
    #[error("No queue with the name \"{0}\" was found.")]
    QueueNotFound(String),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

/// Errors returned by a worker function. Both variants fail the job at the broker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    /// Payload is missing a required field or has the wrong shape.
    #[error("Malformed job data: {0}")]
    MalformedJobData(String),

    #[error("{0}")]
    Failed(String),
}

impl JobError {
    pub fn failed(err: impl std::fmt::Display) -> Self {
        JobError::Failed(err.to_string())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        JobError::MalformedJobData(msg.into())
    }
}

/// Audit-trail write or read failure. Logged and swallowed by the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    #[error("Audit write failed: {0}")]
    Write(String),

    #[error("Audit read failed: {0}")]
    Read(String),
}
