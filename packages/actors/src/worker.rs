//! Worker runtime: binds worker functions to queues and drains them on shutdown.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use queue_core::QueueError;
use ractor::concurrency::JoinHandle;
use ractor::{Actor, ActorRef};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::handler::JobHandler;
use crate::messages::WorkerMessage;
use crate::registry::QueueRegistry;
use crate::worker_actor::{WorkerActor, WorkerArgs};

/// Per-binding worker settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerOptions {
    /// Maximum jobs processed concurrently by this binding.
    pub concurrency: usize,
    /// Delay between polls while the queue is empty.
    pub poll_interval: Duration,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            concurrency: 5,
            poll_interval: Duration::from_millis(100),
        }
    }
}

impl WorkerOptions {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

/// Outcome of stopping a worker binding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownReport {
    /// Workers that finished their current job and stopped.
    pub drained: usize,
    /// Workers killed after the grace period; their jobs will be redelivered.
    pub forced: usize,
}

impl ShutdownReport {
    pub fn merge(self, other: ShutdownReport) -> ShutdownReport {
        ShutdownReport {
            drained: self.drained + other.drained,
            forced: self.forced + other.forced,
        }
    }
}

/// Binds worker functions to queues created through a registry. Cheap to clone.
#[derive(Clone, Debug)]
pub struct WorkerRuntime {
    registry: QueueRegistry,
}

impl WorkerRuntime {
    pub fn new(registry: QueueRegistry) -> Self {
        Self { registry }
    }

    /// Start `options.concurrency` workers consuming `queue_name` with `handler`.
    ///
    /// The queue is created at the broker if this registry has not seen it yet.
    pub async fn bind(
        &self,
        queue_name: &str,
        handler: Arc<dyn JobHandler>,
        options: WorkerOptions,
    ) -> Result<WorkerHandle, QueueError> {
        let queue = self.registry.resolve_or_create(queue_name).await?;
        let accepting = Arc::new(AtomicBool::new(true));
        let binding = Ulid::new();
        let concurrency = options.concurrency.max(1);

        let mut handle = WorkerHandle {
            queue_name: queue_name.to_string(),
            workers: Vec::with_capacity(concurrency),
            accepting: Arc::clone(&accepting),
        };

        for index in 0..concurrency {
            let worker_id = format!("worker-{}-{}", binding, index + 1);
            let args = WorkerArgs {
                worker_id: worker_id.clone(),
                queue: Arc::clone(&queue),
                handler: Arc::clone(&handler),
                poll_interval: options.poll_interval,
                accepting: Arc::clone(&accepting),
            };

            match Actor::spawn(None, WorkerActor, args).await {
                Ok((actor, join)) => handle.workers.push(WorkerSlot {
                    worker_id,
                    actor,
                    join,
                }),
                Err(e) => {
                    handle.stop(Some(Duration::ZERO)).await;
                    return Err(QueueError::Runtime(format!(
                        "Failed to spawn worker for {}: {}",
                        queue_name, e
                    )));
                }
            }
        }

        tracing::info!(
            queue = %queue_name,
            handler = %handler.job_name(),
            concurrency,
            "Worker started"
        );

        Ok(handle)
    }
}

struct WorkerSlot {
    worker_id: String,
    actor: ActorRef<WorkerMessage>,
    join: JoinHandle<()>,
}

/// Running workers for one queue binding.
pub struct WorkerHandle {
    queue_name: String,
    workers: Vec<WorkerSlot>,
    accepting: Arc<AtomicBool>,
}

impl std::fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("queue_name", &self.queue_name)
            .field("workers", &self.worker_ids())
            .finish()
    }
}

impl WorkerHandle {
    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    pub fn concurrency(&self) -> usize {
        self.workers.len()
    }

    pub fn worker_ids(&self) -> Vec<&str> {
        self.workers.iter().map(|w| w.worker_id.as_str()).collect()
    }

    /// Stop leasing new jobs and wait for in-flight ones to finish.
    ///
    /// With `grace` set, workers still busy when it elapses are killed; the
    /// broker redelivers their jobs once the leases expire.
    pub async fn stop(self, grace: Option<Duration>) -> ShutdownReport {
        self.accepting.store(false, Ordering::SeqCst);
        for worker in &self.workers {
            let _ = worker.actor.send_message(WorkerMessage::Shutdown);
        }

        let deadline = grace.map(|g| tokio::time::Instant::now() + g);
        let mut report = ShutdownReport::default();

        for mut worker in self.workers {
            let finished = match deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, &mut worker.join)
                    .await
                    .is_ok(),
                None => {
                    let _ = (&mut worker.join).await;
                    true
                }
            };

            if finished {
                report.drained += 1;
            } else {
                tracing::warn!("Worker {} did not drain in time, killing", worker.worker_id);
                worker.actor.kill();
                let _ = worker.join.await;
                report.forced += 1;
            }
        }

        tracing::info!(
            queue = %self.queue_name,
            drained = report.drained,
            forced = report.forced,
            "Worker stopped"
        );

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 1)]
    #[case(1, 1)]
    #[case(3, 3)]
    fn concurrency_is_at_least_one(#[case] requested: usize, #[case] expected: usize) {
        let options = WorkerOptions::default().with_concurrency(requested);
        assert_eq!(options.concurrency, expected);
    }

    #[test]
    fn reports_merge() {
        let a = ShutdownReport { drained: 2, forced: 1 };
        let b = ShutdownReport { drained: 3, forced: 0 };
        let merged = a.merge(b);
        assert_eq!(merged.drained, 5);
        assert_eq!(merged.forced, 1);
    }
}
