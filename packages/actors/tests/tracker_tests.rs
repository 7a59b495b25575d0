#![allow(clippy::disallowed_methods)]

mod common;

use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use queue_core::{AuditStore, Broker, BrokerQueue, JobOptions, QueueEventKind};
use serde_json::json;

use actors::{EventBus, EventTracker, MemoryAuditStore, MemoryBroker, QueueRegistry};
use common::{FlakyAuditStore, names, wait_for_count};

async fn registry() -> Result<QueueRegistry, Box<dyn Error>> {
    let broker: Arc<dyn Broker> = Arc::new(MemoryBroker::default());
    let registry = QueueRegistry::new(broker);
    registry.preload(&names(&["helloQueue"])).await?;
    Ok(registry)
}

/// Drive one job through waiting, active and completed by hand.
async fn run_one_job(registry: &QueueRegistry) -> Result<queue_core::JobId, Box<dyn Error>> {
    let queue = registry.get("helloQueue").ok_or("helloQueue missing")?;
    let job = queue
        .add("HelloWorker", json!({ "name": "Ada" }), JobOptions::default())
        .await?;
    let leased = queue.lease("test-worker").await?.ok_or("nothing to lease")?;
    queue
        .complete(&leased.id, "test-worker", json!("Hi Ada! How are you?"))
        .await?;
    Ok(job.id)
}

#[tokio::test]
async fn lifecycle_events_are_recorded_in_order() -> Result<(), Box<dyn Error>> {
    let registry = registry().await?;
    let store = Arc::new(MemoryAuditStore::new());
    let bus = EventBus::default();

    let emitted = Arc::new(AtomicUsize::new(0));
    for kind in QueueEventKind::ALL {
        let counter = Arc::clone(&emitted);
        bus.on(kind, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
    }

    let tracker = EventTracker::start(
        &registry,
        &names(&["helloQueue"]),
        store.clone() as Arc<dyn AuditStore>,
        bus.clone(),
    )
    .await?;
    assert_eq!(tracker.queue_names(), vec!["helloQueue"]);

    let job_id = run_one_job(&registry).await?;

    assert!(wait_for_count(&emitted, 3, Duration::from_secs(2)).await);
    assert_eq!(store.len(), 3);
    let records = store.for_job("helloQueue", &job_id);
    let kinds: Vec<_> = records.iter().map(|r| r.event).collect();
    assert_eq!(
        kinds,
        vec![
            QueueEventKind::Waiting,
            QueueEventKind::Active,
            QueueEventKind::Completed
        ]
    );
    assert!(records.windows(2).all(|w| w[0].seq < w[1].seq));
    assert_eq!(
        records[2].details_json(),
        Some(json!({ "returnvalue": "Hi Ada! How are you?" }))
    );
    assert_eq!(emitted.load(Ordering::SeqCst), 3);

    tracker.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn audit_failure_does_not_block_later_events() -> Result<(), Box<dyn Error>> {
    let registry = registry().await?;
    let store = FlakyAuditStore::rejecting(QueueEventKind::Active);
    let bus = EventBus::default();
    let mut bus_events = bus.subscribe();

    let tracker = EventTracker::start(
        &registry,
        &names(&["helloQueue"]),
        store.clone() as Arc<dyn AuditStore>,
        bus,
    )
    .await?;

    let job_id = run_one_job(&registry).await?;

    let mut seen = Vec::new();
    while seen.len() < 3 {
        let event = tokio::time::timeout(Duration::from_secs(2), bus_events.recv()).await??;
        seen.push(event.kind);
    }
    assert_eq!(
        seen,
        vec![
            QueueEventKind::Waiting,
            QueueEventKind::Active,
            QueueEventKind::Completed
        ]
    );

    let kinds: Vec<_> = store
        .inner
        .for_job("helloQueue", &job_id)
        .iter()
        .map(|r| r.event)
        .collect();
    assert_eq!(kinds, vec![QueueEventKind::Waiting, QueueEventKind::Completed]);
    assert_eq!(store.rejected.load(Ordering::SeqCst), 1);

    tracker.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn tracker_creates_queues_it_was_not_given() -> Result<(), Box<dyn Error>> {
    let registry = registry().await?;
    let store = Arc::new(MemoryAuditStore::new());

    let tracker = EventTracker::start(
        &registry,
        &names(&["helloQueue", "mailQueue", "helloQueue"]),
        store as Arc<dyn AuditStore>,
        EventBus::default(),
    )
    .await?;

    assert_eq!(tracker.queue_names(), vec!["helloQueue", "mailQueue"]);
    assert_eq!(
        registry.list_created_names(),
        names(&["helloQueue", "mailQueue"])
    );

    tracker.shutdown().await;
    Ok(())
}
