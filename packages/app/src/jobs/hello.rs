//! Greeting job on `helloQueue`.

use actors::{HandlerFuture, JobDefinition, JobDispatcher, JobHandler, JobKind};
use queue_core::{Job, JobError, QueueError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HelloJobData {
    pub name: String,
}

#[derive(Clone, Debug)]
pub struct HelloJob {
    definition: JobDefinition<HelloJobData>,
}

impl HelloJob {
    pub const KIND: JobKind = JobKind::new("helloQueue", "helloWorker");

    pub fn new(dispatcher: JobDispatcher) -> Self {
        Self {
            definition: JobDefinition::new(dispatcher, Self::KIND),
        }
    }

    pub async fn queue(&self, data: &HelloJobData) -> Result<Job, QueueError> {
        self.definition.queue(data).await
    }

    /// Greet the person named in the payload.
    pub async fn worker(&self, job: &Job) -> Result<String, JobError> {
        let HelloJobData { name } = self.definition.decode(job)?;
        if name.is_empty() {
            return Err(JobError::malformed("Missing name in job data"));
        }

        let greeting = format!("Hi {}! How are you?", name);
        tracing::info!(queue = %job.queue_name, "{}", greeting);
        Ok(greeting)
    }
}

impl JobHandler for HelloJob {
    fn job_name(&self) -> &str {
        Self::KIND.job_name
    }

    fn handle(&self, job: &Job) -> HandlerFuture {
        let this = self.clone();
        let job = job.clone();
        Box::pin(async move { this.worker(&job).await.map(serde_json::Value::from) })
    }
}
