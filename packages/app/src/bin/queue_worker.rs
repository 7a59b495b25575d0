//! Worker process: runs every job kind's worker and the event tracker.

use std::sync::Arc;

use app::jobs::{InMemoryUserDirectory, LogMailSender};
use app::{AppConfig, AppContext, AppError, Collaborators};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = AppConfig::from_env()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let collaborators = Collaborators {
        users: Arc::new(InMemoryUserDirectory::new()),
        mailer: Arc::new(LogMailSender),
    };

    let context = AppContext::bootstrap(config, collaborators).await?;
    let running = context.start().await?;

    tracing::info!(
        queues = ?context.registry.list_created_names(),
        concurrency = context.config.worker_concurrency,
        "Queue worker running, press Ctrl-C to stop"
    );

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }

    tracing::info!("Shutting down, draining in-flight jobs...");
    let report = context.shutdown(running).await?;
    tracing::info!(
        drained = report.drained,
        forced = report.forced,
        "Queue worker stopped"
    );

    Ok(())
}
