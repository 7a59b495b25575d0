//! Queue registry: one shared broker handle per queue name.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use queue_core::{Broker, BrokerUrl, ConnectionError, QueueError, QueueHandle};
use tokio::sync::OnceCell;

use crate::memory::{MemoryBroker, MemoryBrokerConfig};

/// Open a broker client for `url`.
///
/// Only the in-process `memory` scheme ships with this crate; other schemes
/// are rejected so a misconfigured deployment fails at startup.
pub fn connect_broker(
    url: &BrokerUrl,
    config: MemoryBrokerConfig,
) -> Result<Arc<dyn Broker>, ConnectionError> {
    match url.scheme.as_str() {
        "memory" => {
            tracing::info!("Using in-memory broker: {}", url);
            Ok(Arc::new(MemoryBroker::new(config)))
        }
        other => Err(ConnectionError::UnsupportedScheme(other.to_string())),
    }
}

#[derive(Default)]
struct RegistryInner {
    cells: HashMap<String, Arc<OnceCell<QueueHandle>>>,
    created: Vec<String>,
}

struct Shared {
    broker: Arc<dyn Broker>,
    inner: Mutex<RegistryInner>,
}

/// Maps queue names to broker handles. Cheap to clone.
///
/// A name is created at the broker at most once per registry, even when
/// several tasks resolve it concurrently; every caller gets the same handle.
#[derive(Clone)]
pub struct QueueRegistry {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for QueueRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueRegistry")
            .field("queues", &self.list_created_names())
            .finish()
    }
}

impl QueueRegistry {
    /// Create a registry over an already connected broker.
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self {
            shared: Arc::new(Shared {
                broker,
                inner: Mutex::new(RegistryInner::default()),
            }),
        }
    }

    /// Connect to the broker at `url` and create every queue in `queue_names`.
    ///
    /// Any failure here is fatal to the caller: a registry never exists
    /// without a working broker behind it.
    pub async fn connect(url: &str, queue_names: &[String]) -> Result<Self, ConnectionError> {
        Self::connect_with_config(url, queue_names, MemoryBrokerConfig::default()).await
    }

    /// [`connect`](Self::connect) with explicit broker tuning.
    pub async fn connect_with_config(
        url: &str,
        queue_names: &[String],
        config: MemoryBrokerConfig,
    ) -> Result<Self, ConnectionError> {
        let url = BrokerUrl::parse(url)?;
        let broker = connect_broker(&url, config)?;
        let registry = Self::new(broker);

        registry.preload(queue_names).await.map_err(|e| match e {
            QueueError::Connection(err) => err,
            other => ConnectionError::Unreachable {
                host: url.host.clone(),
                port: url.port,
                reason: other.to_string(),
            },
        })?;

        Ok(registry)
    }

    /// Create each named queue, skipping names already created.
    pub async fn preload(&self, queue_names: &[String]) -> Result<(), QueueError> {
        for name in queue_names {
            self.resolve_or_create(name).await?;
        }
        Ok(())
    }

    /// Return the handle for `name`, creating the queue on first use.
    pub async fn resolve_or_create(&self, name: &str) -> Result<QueueHandle, QueueError> {
        let cell = {
            let mut inner = self.lock();
            Arc::clone(inner.cells.entry(name.to_string()).or_default())
        };

        if let Some(handle) = cell.get() {
            tracing::debug!(queue = %name, "Using existing queue");
            return Ok(Arc::clone(handle));
        }

        let handle = cell
            .get_or_try_init(|| async {
                let handle = self.shared.broker.create_queue(name).await?;
                self.lock().created.push(name.to_string());
                tracing::info!(queue = %name, "New queue created");
                Ok::<_, QueueError>(handle)
            })
            .await?;

        Ok(Arc::clone(handle))
    }

    /// Look up a queue that was already created. Never talks to the broker.
    pub fn get(&self, name: &str) -> Option<QueueHandle> {
        self.lock()
            .cells
            .get(name)
            .and_then(|cell| cell.get().cloned())
    }

    /// Names of the queues created so far, in creation order.
    pub fn list_created_names(&self) -> Vec<String> {
        self.lock().created.clone()
    }

    /// The broker this registry creates queues on.
    pub fn broker(&self) -> Arc<dyn Broker> {
        Arc::clone(&self.shared.broker)
    }

    /// Release the broker connection.
    pub async fn close(&self) -> Result<(), QueueError> {
        self.shared.broker.close().await?;
        tracing::info!("Broker connection closed");
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.shared
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
