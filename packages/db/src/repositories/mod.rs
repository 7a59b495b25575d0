//! Repository implementations for database operations.

mod queue_log_repo;

pub use queue_log_repo::QueueLogRepository;
