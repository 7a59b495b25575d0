//! Worker actor for executing jobs.
//!
//! Each actor leases one job at a time, so a queue bound with concurrency N
//! never has more than N jobs in flight from one runtime.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::FutureExt;
use queue_core::{Job, JobError, JobId, QueueHandle};
use ractor::{Actor, ActorProcessingErr, ActorRef};
use tokio::time::Instant;

use crate::handler::JobHandler;
use crate::messages::WorkerMessage;

/// State for the worker actor.
pub struct WorkerActorState {
    /// Unique worker ID, used as the lease owner.
    pub worker_id: String,
    /// Queue this worker leases from.
    pub queue: QueueHandle,
    /// Worker function.
    pub handler: Arc<dyn JobHandler>,
    /// Delay between polls while the queue is empty.
    pub poll_interval: Duration,
    /// Cleared when the runtime starts shutting down.
    pub accepting: Arc<AtomicBool>,
    /// Current job being processed.
    pub current_job: Option<JobId>,
}

/// Worker actor arguments.
pub struct WorkerArgs {
    pub worker_id: String,
    pub queue: QueueHandle,
    pub handler: Arc<dyn JobHandler>,
    pub poll_interval: Duration,
    pub accepting: Arc<AtomicBool>,
}

/// Worker actor that executes jobs.
pub struct WorkerActor;

impl WorkerActorState {
    /// Run the worker function and report the outcome to the broker.
    async fn process(&mut self, job: Job) {
        self.current_job = Some(job.id.clone());
        tracing::debug!(
            queue = %job.queue_name,
            job_id = %job.id,
            worker = %self.worker_id,
            "Processing job"
        );

        let handler = Arc::clone(&self.handler);
        let delivered = job.clone();
        let mut run = std::pin::pin!(
            AssertUnwindSafe(async move { handler.handle(&delivered).await }).catch_unwind()
        );

        // Renew the lease at half its timeout while the worker function runs
        let period = (self.queue.lease_timeout() / 2).max(Duration::from_millis(1));
        let mut renew = tokio::time::interval_at(Instant::now() + period, period);
        let mut lease_held = true;

        let outcome = loop {
            tokio::select! {
                result = &mut run => {
                    break result.unwrap_or_else(|panic| Err(JobError::Failed(panic_message(panic))));
                }
                _ = renew.tick(), if lease_held => {
                    if let Err(e) = self.queue.extend_lease(&job.id, &self.worker_id).await {
                        tracing::warn!(
                            queue = %job.queue_name,
                            job_id = %job.id,
                            error = %e,
                            "Lost lease on running job"
                        );
                        lease_held = false;
                    }
                }
            }
        };

        match outcome {
            Ok(return_value) => {
                if let Err(e) = self
                    .queue
                    .complete(&job.id, &self.worker_id, return_value)
                    .await
                {
                    tracing::warn!("Failed to report completion of job {}: {}", job.id, e);
                }
            }
            Err(error) => {
                tracing::error!(
                    queue = %job.queue_name,
                    job_id = %job.id,
                    job = %job.job_name,
                    attempt = job.attempts_made,
                    %error,
                    "Job failed"
                );
                if let Err(e) = self
                    .queue
                    .fail(&job.id, &self.worker_id, &error.to_string())
                    .await
                {
                    tracing::warn!("Failed to report failure of job {}: {}", job.id, e);
                }
            }
        }

        self.current_job = None;
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        format!("Worker panicked: {}", msg)
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        format!("Worker panicked: {}", msg)
    } else {
        "Worker panicked".to_string()
    }
}

/// Send `Poll` to the worker after `delay`.
fn schedule_poll(myself: &ActorRef<WorkerMessage>, delay: Duration) {
    let myself = myself.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let _ = myself.send_message(WorkerMessage::Poll);
    });
}

impl Actor for WorkerActor {
    type Msg = WorkerMessage;
    type State = WorkerActorState;
    type Arguments = WorkerArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!("Starting worker: {}", args.worker_id);

        // Start the work loop
        myself.send_message(WorkerMessage::Poll)?;

        Ok(WorkerActorState {
            worker_id: args.worker_id,
            queue: args.queue,
            handler: args.handler,
            poll_interval: args.poll_interval,
            accepting: args.accepting,
            current_job: None,
        })
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            WorkerMessage::Poll => {
                if !state.accepting.load(Ordering::SeqCst) {
                    return Ok(());
                }

                match state.queue.lease(&state.worker_id).await {
                    Ok(Some(job)) => {
                        state.process(job).await;
                        // More work may be waiting; poll again right away
                        myself.send_message(WorkerMessage::Poll)?;
                    }
                    Ok(None) => schedule_poll(&myself, state.poll_interval),
                    Err(e) => {
                        tracing::warn!("Worker {} failed to lease a job: {}", state.worker_id, e);
                        schedule_poll(&myself, state.poll_interval);
                    }
                }
            }

            WorkerMessage::Shutdown => {
                tracing::info!("Shutting down worker: {}", state.worker_id);
                myself.stop(None);
                return Ok(());
            }
        }

        Ok(())
    }
}
