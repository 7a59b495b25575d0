//! Core domain types for the job queue system.
//!
//! This crate contains shared types used across all packages:
//! - Job, JobId and JobOptions for units of work handed to the broker
//! - QueueEvent and QueueEventKind for lifecycle events
//! - AuditRecord for the append-only audit trail
//! - The error taxonomy shared by producers, workers and the tracker
//! - Ports (`Broker`, `BrokerQueue`, `AuditStore`) the runtime is written against

mod audit;
mod broker_url;
mod error;
mod events;
mod job;
mod ports;
mod schedule;

pub use audit::{AuditRecord, StoredAuditRecord};
pub use broker_url::BrokerUrl;
pub use error::{BrokerError, ConnectionError, JobError, PersistenceError, QueueError};
pub use events::{QueueEvent, QueueEventKind};
pub use job::{Backoff, Job, JobId, JobOptions, Priority};
pub use ports::{AuditStore, Broker, BrokerQueue, QueueHandle};
pub use schedule::{JobTemplate, RepeatPolicy};
