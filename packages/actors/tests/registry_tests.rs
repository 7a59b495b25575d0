#![allow(clippy::disallowed_methods)]

mod common;

use std::error::Error;
use std::sync::Arc;

use queue_core::{Broker, JobOptions, QueueError};
use serde_json::json;

use actors::{JobDispatcher, QueueRegistry};
use common::{CountingBroker, names};

#[tokio::test]
async fn concurrent_resolves_share_one_handle() -> Result<(), Box<dyn Error>> {
    let broker = CountingBroker::new();
    let registry = QueueRegistry::new(broker.clone() as Arc<dyn Broker>);

    let (a, b, c) = tokio::join!(
        registry.resolve_or_create("helloQueue"),
        registry.resolve_or_create("helloQueue"),
        registry.resolve_or_create("helloQueue"),
    );
    let (a, b, c) = (a?, b?, c?);

    assert!(Arc::ptr_eq(&a, &b));
    assert!(Arc::ptr_eq(&b, &c));
    assert_eq!(broker.create_calls(), 1);
    assert_eq!(registry.list_created_names(), names(&["helloQueue"]));

    Ok(())
}

#[tokio::test]
async fn preload_skips_duplicate_names() -> Result<(), Box<dyn Error>> {
    let broker = CountingBroker::new();
    let registry = QueueRegistry::new(broker.clone() as Arc<dyn Broker>);

    registry
        .preload(&names(&["mailQueue", "helloQueue", "mailQueue", "mailQueue"]))
        .await?;

    assert_eq!(
        registry.list_created_names(),
        names(&["mailQueue", "helloQueue"])
    );
    assert_eq!(broker.create_calls(), 2);

    let again = registry.resolve_or_create("mailQueue").await?;
    let existing = registry.get("mailQueue").ok_or("mailQueue missing")?;
    assert!(Arc::ptr_eq(&again, &existing));
    assert_eq!(broker.create_calls(), 2);

    Ok(())
}

#[tokio::test]
async fn enqueue_on_undeclared_queue_never_reaches_broker() -> Result<(), Box<dyn Error>> {
    let broker = CountingBroker::new();
    let registry = QueueRegistry::new(broker.clone() as Arc<dyn Broker>);
    registry.preload(&names(&["helloQueue"])).await?;
    let dispatcher = JobDispatcher::new(registry);

    let err = dispatcher
        .enqueue(
            "nonExistentQueue",
            "HelloWorker",
            json!({ "name": "Ada" }),
            JobOptions::default(),
        )
        .await
        .unwrap_err();

    assert_eq!(err, QueueError::QueueNotFound("nonExistentQueue".into()));
    assert_eq!(
        err.to_string(),
        "No queue with the name \"nonExistentQueue\" was found."
    );
    assert_eq!(broker.create_calls(), 1);

    Ok(())
}

#[tokio::test]
async fn closed_broker_rejects_new_queues() -> Result<(), Box<dyn Error>> {
    let broker = CountingBroker::new();
    let registry = QueueRegistry::new(broker.clone() as Arc<dyn Broker>);
    registry.close().await?;

    let err = registry.resolve_or_create("helloQueue").await.err();
    assert!(matches!(err, Some(QueueError::Broker(_))));
    assert!(registry.list_created_names().is_empty());

    Ok(())
}
