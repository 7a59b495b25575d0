//! Event tracker: records every queue lifecycle event and republishes it.
//!
//! One `QueueEventsActor` per queue subscribes to the broker's event stream.
//! Each event is written to the audit store, then emitted on the event bus.
//! Audit failures are logged and never stop later events.

use std::sync::Arc;

use queue_core::{AuditRecord, AuditStore, QueueError, QueueEvent, QueueEventKind, QueueHandle};
use ractor::concurrency::JoinHandle;
use ractor::{Actor, ActorProcessingErr, ActorRef};
use tokio::sync::broadcast::error::RecvError;

use crate::bus::EventBus;
use crate::messages::TrackerMessage;
use crate::registry::QueueRegistry;

/// Arguments for a per-queue tracking actor.
pub struct TrackerArgs {
    pub queue: QueueHandle,
    pub store: Arc<dyn AuditStore>,
    pub bus: EventBus,
}

/// State for the per-queue tracking actor.
pub struct TrackerState {
    queue_name: String,
    store: Arc<dyn AuditStore>,
    bus: EventBus,
    forwarder: Option<tokio::task::JoinHandle<()>>,
}

impl TrackerState {
    async fn record(&self, event: QueueEvent) {
        log_event(&event);

        if let Err(e) = self.store.create(AuditRecord::from(&event)).await {
            tracing::error!(
                queue = %event.queue_name,
                job_id = %event.job_id,
                event = %event.kind,
                error = %e,
                "Failed to write queue log"
            );
        }

        self.bus.emit(event);
    }
}

fn log_event(event: &QueueEvent) {
    let reason = event
        .details
        .as_ref()
        .and_then(|d| d.get("failedReason"))
        .and_then(|r| r.as_str())
        .unwrap_or_default();

    match event.kind {
        QueueEventKind::Waiting => {
            tracing::info!(queue = %event.queue_name, job_id = %event.job_id, "Job waiting")
        }
        QueueEventKind::Active => {
            tracing::info!(queue = %event.queue_name, job_id = %event.job_id, "Job started")
        }
        QueueEventKind::Completed => {
            tracing::info!(queue = %event.queue_name, job_id = %event.job_id, "Job completed")
        }
        QueueEventKind::Failed => tracing::error!(
            queue = %event.queue_name,
            job_id = %event.job_id,
            reason = %reason,
            "Job failed"
        ),
        QueueEventKind::Stalled => {
            tracing::warn!(queue = %event.queue_name, job_id = %event.job_id, "Job stalled")
        }
    }
}

/// Actor tracking one queue's events.
pub struct QueueEventsActor;

impl Actor for QueueEventsActor {
    type Msg = TrackerMessage;
    type State = TrackerState;
    type Arguments = TrackerArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        let queue_name = args.queue.name().to_string();
        tracing::info!("Starting event tracker: {}", queue_name);

        // Subscribe before returning so no event after start is missed
        let mut events = args.queue.subscribe();
        let myself_clone = myself.clone();
        let forwarder = tokio::spawn(async move {
            loop {
                let message = match events.recv().await {
                    Ok(event) => TrackerMessage::Event(Box::new(event)),
                    Err(RecvError::Lagged(skipped)) => TrackerMessage::Lagged(skipped),
                    Err(RecvError::Closed) => break,
                };
                if myself_clone.send_message(message).is_err() {
                    break;
                }
            }
        });

        Ok(TrackerState {
            queue_name,
            store: args.store,
            bus: args.bus,
            forwarder: Some(forwarder),
        })
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        if let Some(forwarder) = state.forwarder.take() {
            forwarder.abort();
        }
        Ok(())
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            TrackerMessage::Event(event) => state.record(*event).await,

            TrackerMessage::Lagged(skipped) => {
                tracing::warn!(
                    queue = %state.queue_name,
                    skipped,
                    "Event tracker fell behind, events were not recorded"
                );
            }

            TrackerMessage::Shutdown => {
                tracing::info!("Shutting down event tracker: {}", state.queue_name);
                myself.stop(None);
            }
        }

        Ok(())
    }
}

struct TrackedQueue {
    queue_name: String,
    actor: ActorRef<TrackerMessage>,
    join: JoinHandle<()>,
}

/// Handle to the running trackers, one per queue.
pub struct EventTracker {
    queues: Vec<TrackedQueue>,
}

impl EventTracker {
    /// Subscribe to every queue in `queue_names`, creating queues as needed.
    pub async fn start(
        registry: &QueueRegistry,
        queue_names: &[String],
        store: Arc<dyn AuditStore>,
        bus: EventBus,
    ) -> Result<Self, QueueError> {
        let mut tracker = Self { queues: Vec::new() };

        for name in queue_names {
            if tracker.queues.iter().any(|q| &q.queue_name == name) {
                continue;
            }

            let queue = registry.resolve_or_create(name).await?;
            let args = TrackerArgs {
                queue,
                store: Arc::clone(&store),
                bus: bus.clone(),
            };

            match Actor::spawn(None, QueueEventsActor, args).await {
                Ok((actor, join)) => tracker.queues.push(TrackedQueue {
                    queue_name: name.clone(),
                    actor,
                    join,
                }),
                Err(e) => {
                    tracker.shutdown().await;
                    return Err(QueueError::Runtime(format!(
                        "Failed to start event tracker for {}: {}",
                        name, e
                    )));
                }
            }
        }

        Ok(tracker)
    }

    /// Names of the tracked queues.
    pub fn queue_names(&self) -> Vec<&str> {
        self.queues.iter().map(|q| q.queue_name.as_str()).collect()
    }

    /// Stop every tracker after it records the events already delivered to it.
    pub async fn shutdown(self) {
        for queue in &self.queues {
            let _ = queue.actor.send_message(TrackerMessage::Shutdown);
        }
        for queue in self.queues {
            let _ = queue.join.await;
        }
    }
}
