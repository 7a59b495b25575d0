//! In-process broker backed by one `QueueActor` per queue.
//!
//! Used for local development and tests. Jobs live only as long as the
//! process; every `MemoryQueue` handle for a name talks to the same actor.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use queue_core::{
    Broker, BrokerError, BrokerQueue, Job, JobId, JobOptions, JobTemplate, QueueEvent,
    QueueHandle, RepeatPolicy,
};
use ractor::{Actor, ActorRef, RpcReplyPort};
use tokio::sync::{Mutex, broadcast};

use crate::messages::{QueueCounts, QueueMessage};
use crate::queue_actor::{QueueActor, QueueActorArgs};

/// Tuning for the in-memory broker.
#[derive(Debug, Clone)]
pub struct MemoryBrokerConfig {
    /// How long a worker may hold a job before it is reported stalled.
    pub lease_timeout: Duration,
    /// Housekeeping period for delayed promotion and stall detection.
    pub tick_interval: Duration,
    /// Stalls tolerated per job before it fails for good.
    pub max_stalled_count: u32,
    /// Buffered events per subscriber.
    ///
    /// A subscriber that falls further behind loses the oldest events; the
    /// event tracker logs the gap and those events never reach the audit log.
    pub event_capacity: usize,
}

impl Default for MemoryBrokerConfig {
    fn default() -> Self {
        Self {
            lease_timeout: Duration::from_secs(30),
            tick_interval: Duration::from_millis(50),
            max_stalled_count: 1,
            event_capacity: 1024,
        }
    }
}

impl MemoryBrokerConfig {
    pub fn with_lease_timeout(mut self, lease_timeout: Duration) -> Self {
        self.lease_timeout = lease_timeout;
        self
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    pub fn with_max_stalled_count(mut self, max_stalled_count: u32) -> Self {
        self.max_stalled_count = max_stalled_count;
        self
    }

    pub fn with_event_capacity(mut self, event_capacity: usize) -> Self {
        self.event_capacity = event_capacity;
        self
    }
}

/// In-process broker.
pub struct MemoryBroker {
    config: MemoryBrokerConfig,
    queues: Mutex<HashMap<String, Arc<MemoryQueue>>>,
    closed: AtomicBool,
}

impl MemoryBroker {
    pub fn new(config: MemoryBrokerConfig) -> Self {
        Self {
            config,
            queues: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Typed access to a queue this broker already created.
    pub async fn queue(&self, name: &str) -> Option<Arc<MemoryQueue>> {
        self.queues.lock().await.get(name).cloned()
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new(MemoryBrokerConfig::default())
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn create_queue(&self, name: &str) -> Result<QueueHandle, BrokerError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BrokerError::Disconnected("broker closed".into()));
        }

        let mut queues = self.queues.lock().await;
        if let Some(queue) = queues.get(name) {
            return Ok(Arc::clone(queue) as QueueHandle);
        }

        let (event_tx, _) = broadcast::channel(self.config.event_capacity.max(1));
        let args = QueueActorArgs {
            queue_name: name.to_string(),
            config: self.config.clone(),
            event_tx: event_tx.clone(),
        };
        let (actor, _handle) = Actor::spawn(None, QueueActor, args)
            .await
            .map_err(|e| BrokerError::Other(format!("Failed to spawn queue: {}", e)))?;

        let queue = Arc::new(MemoryQueue {
            name: name.to_string(),
            actor,
            event_tx,
            lease_timeout: self.config.lease_timeout,
        });
        queues.insert(name.to_string(), Arc::clone(&queue));

        Ok(queue)
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.closed.store(true, Ordering::SeqCst);
        for (_, queue) in self.queues.lock().await.drain() {
            let _ = queue.actor.send_message(QueueMessage::Shutdown);
        }
        Ok(())
    }
}

/// Client handle for one in-memory queue.
pub struct MemoryQueue {
    name: String,
    actor: ActorRef<QueueMessage>,
    event_tx: broadcast::Sender<QueueEvent>,
    lease_timeout: Duration,
}

impl MemoryQueue {
    async fn request<T>(
        &self,
        build: impl FnOnce(RpcReplyPort<T>) -> QueueMessage,
    ) -> Result<T, BrokerError>
    where
        T: Send + 'static,
    {
        let (tx, rx) = ractor::concurrency::oneshot();
        self.actor
            .send_message(build(tx.into()))
            .map_err(|e| BrokerError::Disconnected(format!("queue {}: {}", self.name, e)))?;
        rx.await
            .map_err(|_| BrokerError::Disconnected(format!("queue {} stopped", self.name)))
    }

    /// Job counts per state.
    pub async fn counts(&self) -> Result<QueueCounts, BrokerError> {
        self.request(|reply| QueueMessage::GetCounts { reply }).await
    }

    /// A waiting, delayed or active job by ID.
    pub async fn get_job(&self, job_id: &JobId) -> Result<Option<Job>, BrokerError> {
        let job_id = job_id.clone();
        self.request(|reply| QueueMessage::GetJob { job_id, reply })
            .await
    }
}

#[async_trait]
impl BrokerQueue for MemoryQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn add(
        &self,
        job_name: &str,
        payload: serde_json::Value,
        options: JobOptions,
    ) -> Result<Job, BrokerError> {
        let job_name = job_name.to_string();
        self.request(|reply| QueueMessage::Add {
            job_name,
            payload,
            options,
            reply,
        })
        .await?
    }

    async fn lease(&self, worker_id: &str) -> Result<Option<Job>, BrokerError> {
        let worker_id = worker_id.to_string();
        self.request(|reply| QueueMessage::Lease { worker_id, reply })
            .await
    }

    fn lease_timeout(&self) -> Duration {
        self.lease_timeout
    }

    async fn extend_lease(&self, job_id: &JobId, worker_id: &str) -> Result<(), BrokerError> {
        let job_id = job_id.clone();
        let worker_id = worker_id.to_string();
        self.request(|reply| QueueMessage::ExtendLease {
            job_id,
            worker_id,
            reply,
        })
        .await?
    }

    async fn complete(
        &self,
        job_id: &JobId,
        worker_id: &str,
        return_value: serde_json::Value,
    ) -> Result<(), BrokerError> {
        let job_id = job_id.clone();
        let worker_id = worker_id.to_string();
        self.request(|reply| QueueMessage::Complete {
            job_id,
            worker_id,
            return_value,
            reply,
        })
        .await?
    }

    async fn fail(&self, job_id: &JobId, worker_id: &str, reason: &str) -> Result<(), BrokerError> {
        let job_id = job_id.clone();
        let worker_id = worker_id.to_string();
        let reason = reason.to_string();
        self.request(|reply| QueueMessage::Fail {
            job_id,
            worker_id,
            reason,
            reply,
        })
        .await?
    }

    fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.event_tx.subscribe()
    }

    async fn upsert_scheduler(
        &self,
        scheduler_id: &str,
        repeat: RepeatPolicy,
        template: JobTemplate,
    ) -> Result<Option<Job>, BrokerError> {
        let scheduler_id = scheduler_id.to_string();
        self.request(|reply| QueueMessage::UpsertScheduler {
            scheduler_id,
            repeat,
            template,
            reply,
        })
        .await
    }

    async fn remove_scheduler(&self, scheduler_id: &str) -> Result<bool, BrokerError> {
        let scheduler_id = scheduler_id.to_string();
        self.request(|reply| QueueMessage::RemoveScheduler {
            scheduler_id,
            reply,
        })
        .await
    }
}
