#![allow(dead_code)]

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use queue_core::{
    AuditRecord, AuditStore, Broker, BrokerError, PersistenceError, QueueEventKind, QueueHandle,
    StoredAuditRecord,
};

use actors::{MemoryAuditStore, MemoryBroker, MemoryBrokerConfig};

/// Broker wrapper that counts `create_queue` calls.
pub struct CountingBroker {
    inner: MemoryBroker,
    pub creates: AtomicUsize,
}

impl CountingBroker {
    pub fn new() -> Arc<Self> {
        Self::with_config(MemoryBrokerConfig::default())
    }

    pub fn with_config(config: MemoryBrokerConfig) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryBroker::new(config),
            creates: AtomicUsize::new(0),
        })
    }

    pub fn create_calls(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Broker for CountingBroker {
    async fn create_queue(&self, name: &str) -> Result<QueueHandle, BrokerError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        // Widen the race window for concurrent resolves
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.inner.create_queue(name).await
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.inner.close().await
    }
}

/// Audit store that rejects every record of one event kind.
pub struct FlakyAuditStore {
    pub inner: MemoryAuditStore,
    pub reject: QueueEventKind,
    pub rejected: AtomicUsize,
}

impl FlakyAuditStore {
    pub fn rejecting(reject: QueueEventKind) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryAuditStore::new(),
            reject,
            rejected: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl AuditStore for FlakyAuditStore {
    async fn create(&self, record: AuditRecord) -> Result<StoredAuditRecord, PersistenceError> {
        if record.event == self.reject {
            self.rejected.fetch_add(1, Ordering::SeqCst);
            return Err(PersistenceError::Write("database unavailable".into()));
        }
        self.inner.create(record).await
    }
}

/// Poll `check` until it returns true or `timeout` elapses.
pub async fn wait_until<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub fn names(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

/// Wait until `counter` reaches `expected`.
pub async fn wait_for_count(counter: &AtomicUsize, expected: usize, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while counter.load(Ordering::SeqCst) < expected {
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    counter.load(Ordering::SeqCst) == expected
}
