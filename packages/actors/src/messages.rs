//! Message types for actor communication.

use queue_core::{BrokerError, Job, JobId, JobOptions, JobTemplate, QueueEvent, RepeatPolicy};
use ractor::RpcReplyPort;
use serde::{Deserialize, Serialize};

/// Messages for the in-memory broker's `QueueActor`.
#[derive(Debug)]
pub enum QueueMessage {
    /// Store a new job.
    Add {
        job_name: String,
        payload: serde_json::Value,
        options: JobOptions,
        reply: RpcReplyPort<Result<Job, BrokerError>>,
    },

    /// Lease the next available job to a worker.
    Lease {
        worker_id: String,
        reply: RpcReplyPort<Option<Job>>,
    },

    /// Renew a worker's lease on an active job.
    ExtendLease {
        job_id: JobId,
        worker_id: String,
        reply: RpcReplyPort<Result<(), BrokerError>>,
    },

    /// Report job completion.
    Complete {
        job_id: JobId,
        worker_id: String,
        return_value: serde_json::Value,
        reply: RpcReplyPort<Result<(), BrokerError>>,
    },

    /// Report job failure.
    Fail {
        job_id: JobId,
        worker_id: String,
        reason: String,
        reply: RpcReplyPort<Result<(), BrokerError>>,
    },

    /// Create or replace a repeatable job scheduler.
    UpsertScheduler {
        scheduler_id: String,
        repeat: RepeatPolicy,
        template: JobTemplate,
        reply: RpcReplyPort<Option<Job>>,
    },

    /// Remove a scheduler.
    RemoveScheduler {
        scheduler_id: String,
        reply: RpcReplyPort<bool>,
    },

    /// A scheduler interval elapsed.
    SchedulerTick {
        scheduler_id: String,
        generation: u64,
    },

    /// Get a live job by ID.
    GetJob {
        job_id: JobId,
        reply: RpcReplyPort<Option<Job>>,
    },

    /// Get queue counts.
    GetCounts { reply: RpcReplyPort<QueueCounts> },

    /// Shutdown the queue.
    Shutdown,

    /// Periodic tick: promote delayed jobs and detect stalled leases.
    Tick,
}

/// Messages for the `WorkerActor`.
#[derive(Debug)]
pub enum WorkerMessage {
    /// Ask the broker for the next job.
    Poll,

    /// Shutdown the worker once the current message is done.
    Shutdown,
}

/// Messages for the per-queue `QueueEventsActor`.
#[derive(Debug)]
pub enum TrackerMessage {
    /// A lifecycle event observed on the queue.
    Event(Box<QueueEvent>),

    /// The subscription fell behind and dropped events.
    Lagged(u64),

    /// Stop tracking.
    Shutdown,
}

/// Job counts per state for one in-memory queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub waiting: u64,
    pub delayed: u64,
    pub active: u64,
    pub completed: u64,
    pub failed: u64,
    pub schedulers: u64,
}
