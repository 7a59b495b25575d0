//! Worker function trait and registry.

use queue_core::{Job, JobError};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Result type for worker functions: a JSON return value or a job error.
pub type HandlerResult = Result<serde_json::Value, JobError>;

/// Future type for async worker functions.
pub type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;

/// Trait for worker functions.
///
/// Implement this trait to define how jobs of a specific name are processed.
/// An `Err` fails the job at the broker, which then retries or fails it for good.
pub trait JobHandler: Send + Sync + 'static {
    /// The job name this handler processes.
    fn job_name(&self) -> &str;

    /// Process a job and return its return value.
    fn handle(&self, job: &Job) -> HandlerFuture;
}

/// Registry for worker functions sharing one queue.
///
/// Dispatches on `Job::job_name`. A job with no registered handler fails.
#[derive(Default)]
pub struct JobHandlerRegistry {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl JobHandlerRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler under its job name.
    pub fn register<H: JobHandler>(&mut self, handler: H) {
        let job_name = handler.job_name().to_string();
        self.handlers.insert(job_name, Arc::new(handler));
    }

    /// Register an already shared handler.
    pub fn register_arc(&mut self, handler: Arc<dyn JobHandler>) {
        self.handlers.insert(handler.job_name().to_string(), handler);
    }

    /// Get a handler for a job name.
    pub fn get(&self, job_name: &str) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(job_name).cloned()
    }

    /// List all registered job names, sorted.
    pub fn job_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

impl JobHandler for JobHandlerRegistry {
    fn job_name(&self) -> &str {
        "*"
    }

    fn handle(&self, job: &Job) -> HandlerFuture {
        match self.get(&job.job_name) {
            Some(handler) => handler.handle(job),
            None => {
                let name = job.job_name.clone();
                Box::pin(async move { Err(JobError::Failed(format!("No handler for job: {}", name))) })
            }
        }
    }
}

/// A simple function-based worker.
pub struct FnHandler<F>
where
    F: Fn(&Job) -> HandlerFuture + Send + Sync + 'static,
{
    job_name: String,
    handler: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&Job) -> HandlerFuture + Send + Sync + 'static,
{
    /// Create a new function-based handler.
    pub fn new(job_name: impl Into<String>, handler: F) -> Self {
        Self {
            job_name: job_name.into(),
            handler,
        }
    }
}

impl<F> JobHandler for FnHandler<F>
where
    F: Fn(&Job) -> HandlerFuture + Send + Sync + 'static,
{
    fn job_name(&self) -> &str {
        &self.job_name
    }

    fn handle(&self, job: &Job) -> HandlerFuture {
        (self.handler)(job)
    }
}

/// Helper macro for creating job handlers from async closures.
#[macro_export]
macro_rules! job_handler {
    ($job_name:expr, |$job:ident| $body:expr) => {
        $crate::FnHandler::new($job_name, |$job: &$crate::Job| {
            let $job = $job.clone();
            Box::pin(async move { $body })
        })
    };
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use super::*;
    use queue_core::JobOptions;
    use serde_json::json;

    fn job(name: &str) -> Job {
        Job::new(
            "1".into(),
            "helloQueue",
            name,
            json!({ "name": "Ada" }),
            JobOptions::default(),
        )
    }

    #[tokio::test]
    async fn registry_dispatches_on_job_name() {
        let mut registry = JobHandlerRegistry::new();
        registry.register(crate::job_handler!("HelloWorker", |job| {
            Ok(json!(format!("hi {}", job.payload["name"].as_str().unwrap_or_default())))
        }));

        assert_eq!(registry.job_names(), vec!["HelloWorker"]);
        let out = registry.handle(&job("HelloWorker")).await.unwrap();
        assert_eq!(out, json!("hi Ada"));
    }

    #[tokio::test]
    async fn unknown_job_name_fails() {
        let registry = JobHandlerRegistry::new();
        let err = registry.handle(&job("Nope")).await.unwrap_err();
        assert_eq!(err, JobError::Failed("No handler for job: Nope".into()));
    }
}
