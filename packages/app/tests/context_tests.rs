#![allow(clippy::disallowed_methods)]

mod common;

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use queue_core::{AuditStore, JobOptions, QueueEventKind};

use actors::MemoryAuditStore;
use app::jobs::HelloJobData;
use app::{AppConfig, AppContext, AppError};
use common::{Fixture, test_config};

#[tokio::test]
async fn bootstrap_creates_configured_and_declared_queues() -> Result<(), Box<dyn Error>> {
    let fixture = Fixture::new();
    let config = AppConfig {
        queue_names: vec!["reportQueue".into()],
        ..test_config()
    };

    let ctx = AppContext::bootstrap(config, fixture.collaborators()).await?;

    assert_eq!(
        ctx.registry.list_created_names(),
        vec!["reportQueue", "helloQueue", "mailQueue"]
    );
    Ok(())
}

#[tokio::test]
async fn bootstrap_fails_on_unsupported_broker() {
    let fixture = Fixture::new();
    let config = AppConfig {
        broker_url: "amqp://localhost:5672".into(),
        ..test_config()
    };

    let err = AppContext::bootstrap(config, fixture.collaborators())
        .await
        .err();
    assert!(matches!(err, Some(AppError::Connection(_))));
}

#[tokio::test]
async fn queued_job_is_processed_and_audited() -> Result<(), Box<dyn Error>> {
    let fixture = Fixture::new();
    let store = Arc::new(MemoryAuditStore::new());
    let ctx = AppContext::with_audit_store(
        test_config(),
        fixture.collaborators(),
        store.clone() as Arc<dyn AuditStore>,
    )
    .await?;

    let mut completed = ctx.bus.subscribe();
    let running = ctx.start().await?;

    let job = ctx
        .hello
        .queue(&HelloJobData {
            name: "Ada".into(),
        })
        .await?;

    let event = loop {
        let event = tokio::time::timeout(Duration::from_secs(3), completed.recv()).await??;
        if event.kind == QueueEventKind::Completed && event.job_id == job.id {
            break event;
        }
    };
    assert_eq!(
        event.details,
        Some(serde_json::json!({ "returnvalue": "Hi Ada! How are you?" }))
    );

    let kinds: Vec<_> = store
        .for_job("helloQueue", &job.id)
        .iter()
        .map(|r| r.event)
        .collect();
    assert_eq!(
        kinds,
        vec![
            QueueEventKind::Waiting,
            QueueEventKind::Active,
            QueueEventKind::Completed
        ]
    );

    let report = ctx.shutdown(running).await?;
    assert_eq!(report.forced, 0);
    assert_eq!(report.drained, 2 * test_config().worker_concurrency);

    Ok(())
}

#[tokio::test]
async fn unknown_job_name_on_a_bound_queue_fails() -> Result<(), Box<dyn Error>> {
    let fixture = Fixture::new();
    let audit: Arc<dyn AuditStore> = Arc::new(MemoryAuditStore::new());
    let ctx = AppContext::with_audit_store(test_config(), fixture.collaborators(), audit).await?;

    let mut events = ctx.bus.subscribe();
    let running = ctx.start().await?;

    let job = ctx
        .dispatcher
        .enqueue(
            "helloQueue",
            "byeWorker",
            serde_json::json!({ "name": "Ada" }),
            JobOptions::default(),
        )
        .await?;

    let event = loop {
        let event = tokio::time::timeout(Duration::from_secs(3), events.recv()).await??;
        let terminal = matches!(event.kind, QueueEventKind::Completed | QueueEventKind::Failed);
        if event.job_id == job.id && terminal {
            break event;
        }
    };

    assert_eq!(event.kind, QueueEventKind::Failed);
    let details = event.details.ok_or("failed event without details")?;
    assert_eq!(details["failedReason"], "No handler for job: byeWorker");
    assert_eq!(details["willRetry"], false);

    ctx.shutdown(running).await?;
    Ok(())
}
