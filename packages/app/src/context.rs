//! Application context: the one place shared services are built.
//!
//! Everything a producer, worker or tracker needs is constructed here once
//! and handed out by reference or cheap clone. There are no globals.

use std::sync::Arc;

use actors::{
    EventBus, EventTracker, JobDispatcher, JobHandler, JobHandlerRegistry, JobKind, QueueRegistry,
    ShutdownReport, WorkerHandle, WorkerOptions, WorkerRuntime, queue_names,
};
use db::repositories::QueueLogRepository;
use queue_core::AuditStore;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::jobs::{self, HelloJob, MailSender, UserDirectory, UserMailJob};

/// External services the job kinds depend on.
#[derive(Clone)]
pub struct Collaborators {
    pub users: Arc<dyn UserDirectory>,
    pub mailer: Arc<dyn MailSender>,
}

pub struct AppContext {
    pub config: AppConfig,
    pub registry: QueueRegistry,
    pub dispatcher: JobDispatcher,
    pub bus: EventBus,
    pub audit: Arc<dyn AuditStore>,
    pub hello: HelloJob,
    pub user_mail: UserMailJob,
}

/// Running workers and tracker started from a context.
pub struct Running {
    pub workers: Vec<WorkerHandle>,
    pub tracker: EventTracker,
}

impl AppContext {
    /// Connect the broker and the audit database, then build the job kinds.
    ///
    /// Broker or database failures are returned before anything starts.
    pub async fn bootstrap(config: AppConfig, collaborators: Collaborators) -> Result<Self, AppError> {
        let database = db::init(config.db.clone()).await?;
        let audit: Arc<dyn AuditStore> = Arc::new(QueueLogRepository::open(database).await?);
        Self::with_audit_store(config, collaborators, audit).await
    }

    /// Like [`bootstrap`](Self::bootstrap) with a caller-supplied audit store.
    pub async fn with_audit_store(
        config: AppConfig,
        collaborators: Collaborators,
        audit: Arc<dyn AuditStore>,
    ) -> Result<Self, AppError> {
        tracing::info!("Bootstrapping queue application: {}", config.broker_url);

        let registry = QueueRegistry::connect_with_config(
            &config.broker_url,
            &Self::all_queue_names(&config),
            config.broker.clone(),
        )
        .await?;
        let dispatcher = JobDispatcher::new(registry.clone());

        let hello = HelloJob::new(dispatcher.clone());
        let user_mail = UserMailJob::new(
            dispatcher.clone(),
            collaborators.users,
            collaborators.mailer,
        );

        Ok(Self {
            config,
            registry,
            dispatcher,
            bus: EventBus::default(),
            audit,
            hello,
            user_mail,
        })
    }

    /// Configured queue names followed by any a job kind needs, without duplicates.
    pub fn all_queue_names(config: &AppConfig) -> Vec<String> {
        let mut names = config.queue_names.clone();
        for name in queue_names(&jobs::KINDS) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    pub fn worker_options(&self) -> WorkerOptions {
        WorkerOptions::default()
            .with_concurrency(self.config.worker_concurrency)
            .with_poll_interval(self.config.worker_poll_interval)
    }

    /// Bind a worker for every job kind and start tracking every created queue.
    pub async fn start(&self) -> Result<Running, AppError> {
        let tracker = EventTracker::start(
            &self.registry,
            &self.registry.list_created_names(),
            Arc::clone(&self.audit),
            self.bus.clone(),
        )
        .await?;

        // One binding per queue, dispatching on job name
        let handlers: [(JobKind, Arc<dyn JobHandler>); 2] = [
            (HelloJob::KIND, Arc::new(self.hello.clone())),
            (UserMailJob::KIND, Arc::new(self.user_mail.clone())),
        ];
        let mut bindings: Vec<(&str, JobHandlerRegistry)> = Vec::new();
        for (kind, handler) in handlers {
            match bindings.iter_mut().find(|(queue, _)| *queue == kind.queue_name) {
                Some((_, registry)) => registry.register_arc(handler),
                None => {
                    let mut registry = JobHandlerRegistry::new();
                    registry.register_arc(handler);
                    bindings.push((kind.queue_name, registry));
                }
            }
        }

        let runtime = WorkerRuntime::new(self.registry.clone());
        let mut workers = Vec::with_capacity(bindings.len());
        for (queue_name, handlers) in bindings {
            tracing::info!(queue = %queue_name, jobs = ?handlers.job_names(), "Binding job handlers");
            match runtime.bind(queue_name, Arc::new(handlers), self.worker_options()).await {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    Self::stop(Running { workers, tracker }, &self.config).await;
                    return Err(e.into());
                }
            }
        }

        Ok(Running { workers, tracker })
    }

    /// Drain workers, stop the tracker, then release the broker.
    pub async fn shutdown(&self, running: Running) -> Result<ShutdownReport, AppError> {
        let report = Self::stop(running, &self.config).await;
        self.registry.close().await?;
        Ok(report)
    }

    async fn stop(running: Running, config: &AppConfig) -> ShutdownReport {
        let mut report = ShutdownReport::default();
        for handle in running.workers {
            report = report.merge(handle.stop(Some(config.shutdown_grace)).await);
        }
        running.tracker.shutdown().await;
        report
    }
}
