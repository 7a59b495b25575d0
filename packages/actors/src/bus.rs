//! In-process event bus keyed by queue event kind.
//!
//! The tracker republishes every broker event here so other components can
//! react to job lifecycle changes without talking to the broker themselves.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use queue_core::{QueueEvent, QueueEventKind};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Identifies one listener registered with [`EventBus::on`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(&QueueEvent) + Send + Sync>;

struct BusInner {
    tx: broadcast::Sender<QueueEvent>,
    listeners: RwLock<HashMap<QueueEventKind, Vec<(SubscriptionId, Listener)>>>,
    next_id: AtomicU64,
}

/// Typed publish/subscribe channel for queue events. Cheap to clone.
///
/// Listeners registered with [`on`](Self::on) run synchronously inside
/// [`emit`](Self::emit); [`subscribe`](Self::subscribe) hands out a broadcast
/// receiver for async consumers.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("receivers", &self.inner.tx.receiver_count())
            .finish()
    }
}

impl EventBus {
    /// Create a bus whose broadcast channel buffers `capacity` events per receiver.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(BusInner {
                tx,
                listeners: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Publish an event. Returns how many listeners and receivers saw it.
    pub fn emit(&self, event: QueueEvent) -> usize {
        let listeners: Vec<Listener> = {
            let guard = self
                .inner
                .listeners
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            guard
                .get(&event.kind)
                .map(|ls| ls.iter().map(|(_, l)| Arc::clone(l)).collect())
                .unwrap_or_default()
        };

        for listener in &listeners {
            listener(&event);
        }

        let topic = event.topic();
        let receivers = self.inner.tx.send(event).unwrap_or(0);
        tracing::trace!(topic, listeners = listeners.len(), receivers, "Event published");
        listeners.len() + receivers
    }

    /// Register a listener for one event kind.
    pub fn on<F>(&self, kind: QueueEventKind, listener: F) -> SubscriptionId
    where
        F: Fn(&QueueEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(kind)
            .or_default()
            .push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn off(&self, id: SubscriptionId) -> bool {
        let mut guard = self
            .inner
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        for listeners in guard.values_mut() {
            if let Some(pos) = listeners.iter().position(|(lid, _)| *lid == id) {
                listeners.remove(pos);
                return true;
            }
        }
        false
    }

    /// Receive every event published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.inner.tx.subscribe()
    }

    /// Number of listeners registered for `kind`.
    pub fn listener_count(&self, kind: QueueEventKind) -> usize {
        self.inner
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use super::*;
    use queue_core::JobId;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn listeners_only_see_their_kind() {
        let bus = EventBus::default();
        let completed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&completed);
        bus.on(QueueEventKind::Completed, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(bus.emit(QueueEvent::waiting("helloQueue", JobId::new("1"))), 0);
        assert_eq!(
            bus.emit(QueueEvent::completed("helloQueue", JobId::new("1"), serde_json::json!("ok"))),
            1
        );
        assert_eq!(completed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn off_removes_listener() {
        let bus = EventBus::default();
        let id = bus.on(QueueEventKind::Failed, |_| {});
        assert_eq!(bus.listener_count(QueueEventKind::Failed), 1);

        assert!(bus.off(id));
        assert!(!bus.off(id));
        assert_eq!(bus.listener_count(QueueEventKind::Failed), 0);
    }

    #[tokio::test]
    async fn subscribers_receive_every_kind() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.emit(QueueEvent::stalled("mailQueue", JobId::new("7")));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, QueueEventKind::Stalled);
        assert_eq!(event.job_id.as_str(), "7");
    }
}
