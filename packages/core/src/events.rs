//! Queue lifecycle events emitted by the broker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::JobId;

/// Lifecycle transitions a job goes through inside the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueEventKind {
    Waiting,
    Active,
    Completed,
    Failed,
    Stalled,
}

impl QueueEventKind {
    pub const ALL: [QueueEventKind; 5] = [
        QueueEventKind::Waiting,
        QueueEventKind::Active,
        QueueEventKind::Completed,
        QueueEventKind::Failed,
        QueueEventKind::Stalled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueueEventKind::Waiting => "waiting",
            QueueEventKind::Active => "active",
            QueueEventKind::Completed => "completed",
            QueueEventKind::Failed => "failed",
            QueueEventKind::Stalled => "stalled",
        }
    }

    /// Topic the event is republished under on the in-process bus.
    pub fn topic(&self) -> &'static str {
        match self {
            QueueEventKind::Waiting => "queue:waiting",
            QueueEventKind::Active => "queue:active",
            QueueEventKind::Completed => "queue:completed",
            QueueEventKind::Failed => "queue:failed",
            QueueEventKind::Stalled => "queue:stalled",
        }
    }
}

impl std::fmt::Display for QueueEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for QueueEventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QueueEventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown queue event: {}", s))
    }
}

/// One lifecycle event for one job, as delivered by the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEvent {
    pub queue_name: String,
    pub job_id: JobId,
    pub kind: QueueEventKind,
    pub timestamp: DateTime<Utc>,
    /// Return value for `completed`, failure reason for `failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl QueueEvent {
    pub fn new(queue_name: impl Into<String>, job_id: JobId, kind: QueueEventKind) -> Self {
        Self {
            queue_name: queue_name.into(),
            job_id,
            kind,
            timestamp: Utc::now(),
            details: None,
        }
    }

    pub fn waiting(queue_name: impl Into<String>, job_id: JobId) -> Self {
        Self::new(queue_name, job_id, QueueEventKind::Waiting)
    }

    pub fn active(queue_name: impl Into<String>, job_id: JobId) -> Self {
        Self::new(queue_name, job_id, QueueEventKind::Active)
    }

    pub fn completed(
        queue_name: impl Into<String>,
        job_id: JobId,
        return_value: serde_json::Value,
    ) -> Self {
        Self::new(queue_name, job_id, QueueEventKind::Completed)
            .with_details(json!({ "returnvalue": return_value }))
    }

    pub fn failed(queue_name: impl Into<String>, job_id: JobId, reason: impl Into<String>) -> Self {
        Self::new(queue_name, job_id, QueueEventKind::Failed)
            .with_details(json!({ "failedReason": reason.into() }))
    }

    pub fn stalled(queue_name: impl Into<String>, job_id: JobId) -> Self {
        Self::new(queue_name, job_id, QueueEventKind::Stalled)
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn topic(&self) -> &'static str {
        self.kind.topic()
    }
}
