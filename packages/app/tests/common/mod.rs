#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use queue_core::JobError;
use serde_json::{Map, Value};

use app::jobs::{Address, InMemoryUserDirectory, MailSender, User, UserDirectory};
use app::{AppConfig, Collaborators};

/// Directory wrapper counting lookups.
pub struct CountingDirectory {
    pub inner: InMemoryUserDirectory,
    pub lookups: AtomicUsize,
}

#[async_trait]
impl UserDirectory for CountingDirectory {
    async fn find_by_id(&self, user_id: u64) -> Result<Option<User>, JobError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.find_by_id(user_id).await
    }
}

/// Mailer that records every send.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<(String, Address, Map<String, Value>)>>,
}

impl RecordingMailer {
    pub fn sent_count(&self) -> usize {
        self.sent.lock().map(|s| s.len()).unwrap_or_default()
    }
}

#[async_trait]
impl MailSender for RecordingMailer {
    async fn send_template(
        &self,
        template_name: &str,
        to: &Address,
        vars: &Map<String, Value>,
    ) -> Result<(), JobError> {
        self.sent
            .lock()
            .map_err(JobError::failed)?
            .push((template_name.to_string(), to.clone(), vars.clone()));
        Ok(())
    }
}

pub struct Fixture {
    pub users: Arc<CountingDirectory>,
    pub mailer: Arc<RecordingMailer>,
}

impl Fixture {
    pub fn new() -> Self {
        let inner = InMemoryUserDirectory::new();
        inner.insert(User {
            id: 1,
            name: "Test User".into(),
            email: "test@example.com".into(),
        });
        Self {
            users: Arc::new(CountingDirectory {
                inner,
                lookups: AtomicUsize::new(0),
            }),
            mailer: Arc::new(RecordingMailer::default()),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            users: self.users.clone(),
            mailer: self.mailer.clone(),
        }
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        worker_concurrency: 2,
        worker_poll_interval: Duration::from_millis(10),
        shutdown_grace: Duration::from_secs(2),
        ..AppConfig::default()
    }
}
