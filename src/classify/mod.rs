//! Classification adapter: external LLM calls behind a narrow interface,
//! plus the core-owned normalization of whatever comes back.
//!
//! The pipeline treats any malformed or empty classifier result as
//! "classification absent", never as a fatal error.

mod hierarchy;
mod llm;

pub use hierarchy::HierarchyCache;
pub use llm::{LlmClassifier, LlmConfig};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::models::Identifiers;

/// Classification adapter errors.
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("classifier connection failed: {0}")]
    Connection(String),
    #[error("classifier API error: {0}")]
    Api(String),
    #[error("classifier returned unparseable output: {0}")]
    Parse(String),
}

/// External classification service, implemented by an LLM client in
/// production and by fixtures in tests.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify extracted text against the controlled taxonomy. The raw
    /// JSON is normalized by [`sanitize_classification`] before use.
    async fn classify(&self, text: &str) -> Result<Value, ClassifyError>;

    /// Extract the four business identifiers from email subject, body,
    /// and attachment text. Infallible by contract: any failure yields
    /// sentinel values.
    async fn extract_metadata(
        &self,
        subject: &str,
        body: &str,
        attachment_text: &str,
    ) -> Identifiers;
}

/// Normalized classification: every field a defined string, action items
/// as a canonical JSON array string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub department: String,
    pub category: String,
    pub subcategory: String,
    pub summary: String,
    pub action_items: String,
}

impl Classification {
    /// Whether the classifier produced any routing information at all.
    pub fn is_empty(&self) -> bool {
        self.department.is_empty() && self.category.is_empty() && self.subcategory.is_empty()
    }
}

fn field_to_string(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Normalize raw classifier output.
///
/// Guarantees every field is a defined string (empty when absent) and
/// serializes a structured action-item list to a JSON array string so
/// downstream consumers can parse it safely.
pub fn sanitize_classification(raw: &Value) -> Classification {
    let action_items = match raw.get("action_items") {
        Some(Value::Array(items)) => {
            Value::Array(items.clone()).to_string()
        }
        other => field_to_string(other),
    };

    Classification {
        department: field_to_string(raw.get("department")),
        category: field_to_string(raw.get("category")),
        subcategory: field_to_string(raw.get("subcategory")),
        summary: field_to_string(raw.get("summary")),
        action_items,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sanitize_full_result() {
        let raw = json!({
            "department": "Claims",
            "category": "Settlement",
            "subcategory": "Payout",
            "summary": "Payout approved; funds released.",
            "action_items": ["Confirm account", "Release funds"],
        });
        let c = sanitize_classification(&raw);
        assert_eq!(c.department, "Claims");
        assert_eq!(c.subcategory, "Payout");
        assert_eq!(c.action_items, r#"["Confirm account","Release funds"]"#);
        assert!(!c.is_empty());
    }

    #[test]
    fn test_sanitize_missing_fields_become_empty() {
        let c = sanitize_classification(&json!({}));
        assert_eq!(c, Classification::default());
        assert!(c.is_empty());
    }

    #[test]
    fn test_sanitize_null_and_non_string_values() {
        let raw = json!({
            "department": null,
            "category": 42,
            "action_items": "already a string",
        });
        let c = sanitize_classification(&raw);
        assert_eq!(c.department, "");
        assert_eq!(c.category, "42");
        assert_eq!(c.action_items, "already a string");
    }

    #[test]
    fn test_sanitize_action_items_round_trips_as_json() {
        let raw = json!({ "action_items": ["a", "b"] });
        let c = sanitize_classification(&raw);
        let parsed: Vec<String> = serde_json::from_str(&c.action_items).unwrap();
        assert_eq!(parsed, vec!["a", "b"]);
    }
}
