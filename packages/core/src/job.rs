//! Job domain types for work items handed to the broker.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::error::JobError;

/// Opaque job identifier assigned by the broker.
///
/// Only unique within the lifetime of the queue that issued it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Priority level for job execution order.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low = 0,
    #[default]
    Normal = 1,
    High = 2,
    Critical = 3,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Normal => write!(f, "normal"),
            Priority::High => write!(f, "high"),
            Priority::Critical => write!(f, "critical"),
        }
    }
}

/// Delay policy applied by the broker between failed attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Backoff {
    /// Same delay before every retry.
    Fixed { delay_ms: u64 },
    /// `delay_ms * 2^(attempts_made - 1)`.
    Exponential { delay_ms: u64 },
}

impl Backoff {
    /// Delay before the next attempt, given how many attempts already ran.
    pub fn delay_for(&self, attempts_made: u32) -> Duration {
        match *self {
            Backoff::Fixed { delay_ms } => Duration::from_millis(delay_ms),
            Backoff::Exponential { delay_ms } => {
                let exponent = attempts_made.saturating_sub(1).min(31);
                Duration::from_millis(delay_ms.saturating_mul(1u64 << exponent))
            }
        }
    }
}

/// Options passed through to the broker unmodified when a job is added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobOptions {
    /// Milliseconds to wait before the job becomes available.
    pub delay_ms: u64,
    pub priority: Priority,
    /// Total attempts the broker may make, including the first.
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backoff: Option<Backoff>,
    /// Caller-chosen id; the broker assigns one when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            delay_ms: 0,
            priority: Priority::Normal,
            attempts: 1,
            backoff: None,
            job_id: None,
        }
    }
}

impl JobOptions {
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay_ms = delay.as_millis().try_into().unwrap_or(u64::MAX);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = Some(backoff);
        self
    }

    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(JobId::new(job_id));
        self
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// A unit of work stored by the broker.
///
/// Immutable once enqueued; only the broker advances `attempts_made`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub queue_name: String,
    pub job_name: String,
    pub payload: serde_json::Value,
    #[serde(default)]
    pub options: JobOptions,
    /// Attempts started so far, counting the current one while leased.
    #[serde(default)]
    pub attempts_made: u32,
    pub enqueued_at: DateTime<Utc>,
}

impl Job {
    pub fn new(
        id: JobId,
        queue_name: impl Into<String>,
        job_name: impl Into<String>,
        payload: serde_json::Value,
        options: JobOptions,
    ) -> Self {
        Self {
            id,
            queue_name: queue_name.into(),
            job_name: job_name.into(),
            payload,
            options,
            attempts_made: 0,
            enqueued_at: Utc::now(),
        }
    }

    /// Decode the payload into the job kind's typed record.
    ///
    /// Missing or ill-typed fields surface as [`JobError::MalformedJobData`].
    pub fn payload_as<P: DeserializeOwned>(&self) -> Result<P, JobError> {
        serde_json::from_value(self.payload.clone()).map_err(|e| {
            JobError::MalformedJobData(format!("{} job {}: {}", self.job_name, self.id, e))
        })
    }

    /// Whether the broker may retry this job after the current attempt fails.
    pub fn has_attempts_left(&self) -> bool {
        self.attempts_made < self.options.attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Greeting {
        #[allow(dead_code)]
        name: String,
    }

    #[test]
    fn exponential_backoff_doubles_per_attempt() {
        let backoff = Backoff::Exponential { delay_ms: 100 };
        assert_eq!(backoff.delay_for(1), Duration::from_millis(100));
        assert_eq!(backoff.delay_for(2), Duration::from_millis(200));
        assert_eq!(backoff.delay_for(4), Duration::from_millis(800));
    }

    #[test]
    fn fixed_backoff_is_constant() {
        let backoff = Backoff::Fixed { delay_ms: 250 };
        assert_eq!(backoff.delay_for(1), backoff.delay_for(7));
    }

    #[test]
    fn options_never_allow_zero_attempts() {
        let options = JobOptions::default().with_attempts(0);
        assert_eq!(options.attempts, 1);
    }

    #[test]
    fn payload_missing_field_is_malformed() {
        let job = Job::new(
            JobId::from("1"),
            "helloQueue",
            "helloWorker",
            json!({}),
            JobOptions::default(),
        );
        let err = job.payload_as::<Greeting>().unwrap_err();
        assert!(matches!(err, JobError::MalformedJobData(ref msg) if msg.contains("name")));
    }

    #[test]
    fn attempts_left_tracks_options() {
        let mut job = Job::new(
            JobId::from("1"),
            "q",
            "j",
            json!({}),
            JobOptions::default().with_attempts(2),
        );
        job.attempts_made = 1;
        assert!(job.has_attempts_left());
        job.attempts_made = 2;
        assert!(!job.has_attempts_left());
    }
}
