//! Repeatable-job scheduler definitions.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::JobOptions;

/// How often a scheduler produces a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepeatPolicy {
    /// Interval between produced jobs, in milliseconds.
    pub every_ms: u64,
    /// Stop after this many jobs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// Produce the first job right away instead of after one interval.
    #[serde(default)]
    pub immediately: bool,
}

impl RepeatPolicy {
    pub fn every(interval: Duration) -> Self {
        Self {
            every_ms: interval.as_millis().try_into().unwrap_or(u64::MAX),
            limit: None,
            immediately: false,
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn immediately(mut self) -> Self {
        self.immediately = true;
        self
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.every_ms.max(1))
    }
}

/// The job a scheduler produces on every tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobTemplate {
    pub name: String,
    pub data: serde_json::Value,
    #[serde(default)]
    pub options: JobOptions,
}

impl JobTemplate {
    pub fn new(name: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            data,
            options: JobOptions::default(),
        }
    }
}
