//! Runtime configuration loaded from the environment.

use std::time::Duration;

use actors::MemoryBrokerConfig;
use db::DbConfig;

use crate::error::AppError;

/// Typed process configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Broker connection string, e.g. `memory://localhost:0`.
    pub broker_url: String,
    /// Lease, stall and event buffer tuning for the in-memory broker.
    pub broker: MemoryBrokerConfig,
    /// Queues created at startup, besides the ones job kinds declare.
    pub queue_names: Vec<String>,
    pub worker_concurrency: usize,
    pub worker_poll_interval: Duration,
    /// How long shutdown waits for in-flight jobs before killing workers.
    pub shutdown_grace: Duration,
    pub db: DbConfig,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            broker_url: "memory://localhost:0".to_string(),
            broker: MemoryBrokerConfig::default(),
            queue_names: vec!["helloQueue".to_string(), "mailQueue".to_string()],
            worker_concurrency: 5,
            worker_poll_interval: Duration::from_millis(100),
            shutdown_grace: Duration::from_secs(30),
            db: DbConfig::memory(),
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load from process environment, reading a `.env` file first if present.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unset keys take their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let queue_names = match get("QUEUE_NAMES") {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            None => defaults.queue_names,
        };

        let worker_concurrency = parse_or(get("WORKER_CONCURRENCY"), "WORKER_CONCURRENCY", 5usize)?;
        if worker_concurrency == 0 {
            return Err(AppError::Config("WORKER_CONCURRENCY must be at least 1".into()));
        }

        let poll_ms = parse_or(get("WORKER_POLL_MS"), "WORKER_POLL_MS", 100u64)?;
        let grace_secs = parse_or(get("SHUTDOWN_GRACE_SECS"), "SHUTDOWN_GRACE_SECS", 30u64)?;

        let broker_defaults = &defaults.broker;
        let lease_ms = parse_or(
            get("LEASE_TIMEOUT_MS"),
            "LEASE_TIMEOUT_MS",
            broker_defaults.lease_timeout.as_millis() as u64,
        )?;
        let max_stalled = parse_or(
            get("MAX_STALLED_COUNT"),
            "MAX_STALLED_COUNT",
            broker_defaults.max_stalled_count,
        )?;
        let event_capacity = parse_or(
            get("EVENT_CAPACITY"),
            "EVENT_CAPACITY",
            broker_defaults.event_capacity,
        )?;
        if lease_ms == 0 || event_capacity == 0 {
            return Err(AppError::Config(
                "LEASE_TIMEOUT_MS and EVENT_CAPACITY must be at least 1".into(),
            ));
        }
        let broker = defaults
            .broker
            .clone()
            .with_lease_timeout(Duration::from_millis(lease_ms))
            .with_max_stalled_count(max_stalled)
            .with_event_capacity(event_capacity);

        let mut db = DbConfig::endpoint(get("DB_ENDPOINT").unwrap_or(defaults.db.endpoint));
        if let Some(namespace) = get("DB_NAMESPACE") {
            db = db.with_namespace(namespace);
        }
        if let Some(database) = get("DB_DATABASE") {
            db = db.with_database(database);
        }
        if let (Some(user), Some(pass)) = (get("DB_USERNAME"), get("DB_PASSWORD")) {
            db = db.with_credentials(user, pass);
        }

        Ok(Self {
            broker_url: get("BROKER_URL").unwrap_or(defaults.broker_url),
            broker,
            queue_names,
            worker_concurrency,
            worker_poll_interval: Duration::from_millis(poll_ms),
            shutdown_grace: Duration::from_secs(grace_secs),
            db,
            log_level: get("LOG_LEVEL").unwrap_or(defaults.log_level),
        })
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, key: &str, default: T) -> Result<T, AppError> {
    match value {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{} is not a valid number: {}", key, raw))),
        None => Ok(default),
    }
}
