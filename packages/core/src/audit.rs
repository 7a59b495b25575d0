//! Audit-trail records for queue lifecycle events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{JobId, QueueEvent, QueueEventKind};

/// Row appended to the audit trail for one lifecycle event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub queue: String,
    pub job_id: JobId,
    pub event: QueueEventKind,
    /// Event details serialized as JSON text.
    pub details: Option<String>,
}

impl AuditRecord {
    pub fn new(queue: impl Into<String>, job_id: JobId, event: QueueEventKind) -> Self {
        Self {
            queue: queue.into(),
            job_id,
            event,
            details: None,
        }
    }
}

impl From<&QueueEvent> for AuditRecord {
    fn from(event: &QueueEvent) -> Self {
        Self {
            queue: event.queue_name.clone(),
            job_id: event.job_id.clone(),
            event: event.kind,
            details: event.details.as_ref().map(|d| d.to_string()),
        }
    }
}

/// An audit record as stored, with its position in the trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredAuditRecord {
    /// Monotonic sequence assigned on insert.
    pub seq: u64,
    pub queue: String,
    pub job_id: JobId,
    pub event: QueueEventKind,
    pub details: Option<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl StoredAuditRecord {
    pub fn from_record(seq: u64, record: AuditRecord) -> Self {
        let now = Utc::now();
        Self {
            seq,
            queue: record.queue,
            job_id: record.job_id,
            event: record.event,
            details: record.details,
            created_at: now,
            modified_at: now,
        }
    }

    /// Parse `details` back into structured data.
    pub fn details_json(&self) -> Option<serde_json::Value> {
        self.details
            .as_deref()
            .and_then(|d| serde_json::from_str(d).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_from_event_serializes_details() {
        let event = QueueEvent::completed("helloQueue", JobId::from("3"), json!("Hi Bob!"));
        let record = AuditRecord::from(&event);
        assert_eq!(record.event, QueueEventKind::Completed);
        assert_eq!(record.details.as_deref(), Some(r#"{"returnvalue":"Hi Bob!"}"#));

        let stored = StoredAuditRecord::from_record(1, record);
        assert_eq!(stored.details_json(), Some(json!({ "returnvalue": "Hi Bob!" })));
    }

    #[test]
    fn record_without_details_stays_null() {
        let event = QueueEvent::waiting("helloQueue", JobId::from("3"));
        assert_eq!(AuditRecord::from(&event).details, None);
    }
}
