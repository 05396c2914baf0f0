//! Document model and processing status state machine.
//!
//! A document is one physical file plus its processing state. The status
//! enum is a directed acyclic graph: `Pending` is the sole source, the
//! remaining states are revisitable sinks reached by the pipeline worker
//! or by external overrides.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder for a business identifier that could not be extracted.
///
/// Used instead of NULL so downstream string handling never branches on
/// missing values.
pub const UNKNOWN_IDENTIFIER: &str = "XXXX";

/// Processing status of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Pending,
    Processed,
    NoDestination,
    Failed,
    ProcessedWithOverride,
    Overridden,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processed => "processed",
            Self::NoDestination => "no_destination",
            Self::Failed => "failed",
            Self::ProcessedWithOverride => "processed_with_override",
            Self::Overridden => "overridden",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processed" => Some(Self::Processed),
            "no_destination" => Some(Self::NoDestination),
            "failed" => Some(Self::Failed),
            "processed_with_override" => Some(Self::ProcessedWithOverride),
            "overridden" => Some(Self::Overridden),
            _ => None,
        }
    }

    /// A terminal status is one the worker will not leave on its own;
    /// only an external override moves a document out of it.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// The four business identifiers carried by every document.
///
/// Each defaults to [`UNKNOWN_IDENTIFIER`]; they are never null and never
/// the empty string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifiers {
    pub account_number: String,
    pub policyholder_name: String,
    pub policy_number: String,
    pub claim_number: String,
}

impl Default for Identifiers {
    fn default() -> Self {
        Self {
            account_number: UNKNOWN_IDENTIFIER.to_string(),
            policyholder_name: UNKNOWN_IDENTIFIER.to_string(),
            policy_number: UNKNOWN_IDENTIFIER.to_string(),
            claim_number: UNKNOWN_IDENTIFIER.to_string(),
        }
    }
}

impl Identifiers {
    /// Whether a field carries a real value rather than the sentinel.
    pub fn is_known(value: &str) -> bool {
        !value.is_empty() && value != UNKNOWN_IDENTIFIER
    }
}

/// An insurance document and its processing state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier, assigned at creation and never reused.
    pub id: String,
    /// Original filename as uploaded or attached.
    pub filename: String,
    /// Key of the source object in the intake bucket.
    pub source_key: String,
    /// OCR output, set by the pipeline worker.
    pub extracted_text: Option<String>,
    /// Classification triple, set by the pipeline worker.
    pub department: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    /// Human-readable summary (PII-masked before persistence).
    pub summary: Option<String>,
    /// Action items as a canonical JSON array string.
    pub action_items: Option<String>,
    pub identifiers: Identifiers,
    pub status: DocumentStatus,
    /// Destination location, set once resolution succeeds.
    pub destination_bucket: Option<String>,
    pub destination_key: Option<String>,
    /// Last failure reason, cleared on success.
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Create a new document in `Pending` status.
    pub fn new(id: String, filename: String, source_key: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            filename,
            source_key,
            extracted_text: None,
            department: None,
            category: None,
            subcategory: None,
            summary: None,
            action_items: None,
            identifiers: Identifiers::default(),
            status: DocumentStatus::Pending,
            destination_bucket: None,
            destination_key: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The classification triple, with absent fields as empty strings.
    pub fn triple(&self) -> (&str, &str, &str) {
        (
            self.department.as_deref().unwrap_or(""),
            self.category.as_deref().unwrap_or(""),
            self.subcategory.as_deref().unwrap_or(""),
        )
    }

    /// Whether the document carries any classification at all.
    pub fn is_classified(&self) -> bool {
        let (dept, cat, sub) = self.triple();
        !(dept.is_empty() && cat.is_empty() && sub.is_empty())
    }
}

/// Fields an external actor may override on a terminal document.
///
/// `None` means "leave unchanged"; a value equal to the current field is
/// also treated as unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OverrideRequest {
    pub department: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub summary: Option<String>,
    pub action_items: Option<String>,
}

/// What an override request actually changes on a given document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideChange {
    /// Nothing changed; no transition, no commit.
    None,
    /// Only summary and/or action items changed; destination untouched.
    SummaryOnly,
    /// At least one classification field changed; re-resolution required.
    Classification,
}

impl OverrideRequest {
    fn field_changes(new: &Option<String>, current: Option<&str>) -> bool {
        match new {
            Some(v) => Some(v.as_str()) != current,
            None => false,
        }
    }

    /// Classify this request against the document's current fields.
    pub fn change_kind(&self, doc: &Document) -> OverrideChange {
        let classification_changed = Self::field_changes(&self.department, doc.department.as_deref())
            || Self::field_changes(&self.category, doc.category.as_deref())
            || Self::field_changes(&self.subcategory, doc.subcategory.as_deref());

        let summary_changed = Self::field_changes(&self.summary, doc.summary.as_deref())
            || Self::field_changes(&self.action_items, doc.action_items.as_deref());

        if classification_changed {
            OverrideChange::Classification
        } else if summary_changed {
            OverrideChange::SummaryOnly
        } else {
            OverrideChange::None
        }
    }

    /// Apply the requested fields onto the document.
    pub fn apply(&self, doc: &mut Document) {
        if let Some(v) = &self.department {
            doc.department = Some(v.clone());
        }
        if let Some(v) = &self.category {
            doc.category = Some(v.clone());
        }
        if let Some(v) = &self.subcategory {
            doc.subcategory = Some(v.clone());
        }
        if let Some(v) = &self.summary {
            doc.summary = Some(v.clone());
        }
        if let Some(v) = &self.action_items {
            doc.action_items = Some(v.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn processed_doc() -> Document {
        let mut doc = Document::new(
            "doc-1".to_string(),
            "statement.pdf".to_string(),
            "abc_statement.pdf".to_string(),
        );
        doc.department = Some("Claims".to_string());
        doc.category = Some("Settlement".to_string());
        doc.subcategory = Some("Payout".to_string());
        doc.summary = Some("A settlement statement".to_string());
        doc.status = DocumentStatus::Processed;
        doc.destination_key = Some("output/some/key/statement.pdf".to_string());
        doc
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            DocumentStatus::Pending,
            DocumentStatus::Processed,
            DocumentStatus::NoDestination,
            DocumentStatus::Failed,
            DocumentStatus::ProcessedWithOverride,
            DocumentStatus::Overridden,
        ] {
            assert_eq!(DocumentStatus::from_str(status.as_str()), Some(status));
        }
    }

    #[test]
    fn test_pending_is_not_terminal() {
        assert!(!DocumentStatus::Pending.is_terminal());
        assert!(DocumentStatus::Processed.is_terminal());
        assert!(DocumentStatus::NoDestination.is_terminal());
        assert!(DocumentStatus::Failed.is_terminal());
    }

    #[test]
    fn test_new_document_defaults() {
        let doc = Document::new("d".into(), "f.pdf".into(), "k".into());
        assert_eq!(doc.status, DocumentStatus::Pending);
        assert_eq!(doc.identifiers.account_number, UNKNOWN_IDENTIFIER);
        assert!(doc.destination_key.is_none());
        assert!(!doc.is_classified());
        assert!(doc.updated_at >= doc.created_at);
    }

    #[test]
    fn test_override_noop_detected() {
        let doc = processed_doc();
        let req = OverrideRequest {
            summary: doc.summary.clone(),
            ..Default::default()
        };
        assert_eq!(req.change_kind(&doc), OverrideChange::None);
    }

    #[test]
    fn test_override_summary_only() {
        let doc = processed_doc();
        let req = OverrideRequest {
            summary: Some("Different wording".to_string()),
            ..Default::default()
        };
        assert_eq!(req.change_kind(&doc), OverrideChange::SummaryOnly);
    }

    #[test]
    fn test_override_classification_wins_over_summary() {
        let doc = processed_doc();
        let req = OverrideRequest {
            category: Some("Denial".to_string()),
            summary: Some("Different wording".to_string()),
            ..Default::default()
        };
        assert_eq!(req.change_kind(&doc), OverrideChange::Classification);
    }

    #[test]
    fn test_identifiers_sentinel_is_not_known() {
        assert!(!Identifiers::is_known(UNKNOWN_IDENTIFIER));
        assert!(!Identifiers::is_known(""));
        assert!(Identifiers::is_known("7781"));
    }
}
