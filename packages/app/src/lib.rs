//! Queue application: configuration, context and job kinds.
//!
//! The `queue-worker` binary builds an [`AppContext`] from [`AppConfig`],
//! binds a worker for each job kind and records queue events until Ctrl-C.

mod config;
mod context;
mod error;
pub mod jobs;

pub use config::AppConfig;
pub use context::{AppContext, Collaborators, Running};
pub use error::AppError;
