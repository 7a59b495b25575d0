//! Actor runtime for the job queue.
//!
//! This crate wires producers, workers and the event tracker to a broker
//! through the ports defined in `queue_core`.
//!
//! # Architecture
//!
//! - `QueueRegistry` - One shared broker handle per queue name
//! - `JobDispatcher` / `JobDefinition` - Producer side, typed per job kind
//! - `WorkerRuntime` - Spawns `WorkerActor`s that lease and run jobs
//! - `EventTracker` - One `QueueEventsActor` per queue writing the audit trail
//! - `EventBus` - In-process republication of queue events
//! - `MemoryBroker` - In-process broker, one `QueueActor` per queue
//!
//! # Usage
//!
//! ```ignore
//! use actors::{QueueRegistry, JobDispatcher, WorkerRuntime, WorkerOptions};
//!
//! let registry = QueueRegistry::connect("memory://localhost:0", &names).await?;
//! let dispatcher = JobDispatcher::new(registry.clone());
//! let workers = WorkerRuntime::new(registry.clone())
//!     .bind("helloQueue", handler, WorkerOptions::default())
//!     .await?;
//! ```

mod bus;
mod definition;
mod dispatcher;
mod handler;
mod memory;
mod messages;
mod persistence;
mod queue_actor;
pub mod registry;
mod tracker;
mod worker;
mod worker_actor;

pub use bus::{EventBus, SubscriptionId};
pub use definition::{JobDefinition, JobKind, queue_names};
pub use dispatcher::JobDispatcher;
pub use handler::{FnHandler, HandlerFuture, HandlerResult, JobHandler, JobHandlerRegistry};
pub use memory::{MemoryBroker, MemoryBrokerConfig, MemoryQueue};
pub use messages::{QueueCounts, QueueMessage, TrackerMessage, WorkerMessage};
pub use persistence::MemoryAuditStore;
pub use queue_actor::QueueActor;
pub use registry::{QueueRegistry, connect_broker};
pub use tracker::{EventTracker, QueueEventsActor};
pub use worker::{ShutdownReport, WorkerHandle, WorkerOptions, WorkerRuntime};
pub use worker_actor::WorkerActor;

/// Re-export of the job type for handler code and the `job_handler!` macro.
pub use queue_core::Job;

/// Re-export ractor types for convenience.
pub use ractor::{Actor, ActorRef, RpcReplyPort, concurrency};
