//! Outbox events awaiting delivery to the broker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::DocumentStatus;

/// One pending side-effect, written in the same transaction as the domain
/// change it announces.
///
/// Rows are mutated only by the outbox publisher (sent_at / error) and are
/// never deleted; the table doubles as an audit trail.
#[derive(Debug, Clone)]
pub struct OutboxEvent {
    pub id: i32,
    /// Target exchange; empty string for the default exchange.
    pub exchange: String,
    pub routing_key: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    /// Null until a publish was confirmed by the broker.
    pub sent_at: Option<DateTime<Utc>>,
    /// Last delivery failure, null unless an attempt failed.
    pub error: Option<String>,
}

/// Payload of a "document submitted" event consumed by the pipeline worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionPayload {
    pub document_id: String,
    pub source_key: String,
}

/// Payload announcing a terminal status change, enqueued by the worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusPayload {
    pub document_id: String,
    pub status: DocumentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_bucket: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submission_payload_round_trip() {
        let payload = SubmissionPayload {
            document_id: "doc-1".into(),
            source_key: "abc_file.pdf".into(),
        };
        let json = serde_json::to_string(&payload).unwrap();
        let back: SubmissionPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back.document_id, "doc-1");
        assert_eq!(back.source_key, "abc_file.pdf");
    }

    #[test]
    fn test_status_payload_omits_empty_fields() {
        let payload = StatusPayload {
            document_id: "doc-1".into(),
            status: DocumentStatus::NoDestination,
            destination_bucket: None,
            destination_key: None,
            error: Some("no classification to route on".into()),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["status"], "no_destination");
        assert!(json.get("destination_key").is_none());
        assert_eq!(json["error"], "no classification to route on");
    }
}
