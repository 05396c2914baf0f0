//! Destination resolution engine.
//!
//! Maps a classified document to a storage location. Missing routing
//! rules are never an error: the engine falls back to a sanitized
//! subcategory name and persists that as a new rule, so the first
//! resolution of a triple decides the answer for every later one
//! (a memoizing cache with a side effect, entries never expire).

use thiserror::Error;
use tracing::{debug, info};

use crate::models::{Document, Identifiers};
use crate::repository::{BucketMappingRepository, DieselError};
use crate::storage::{Location, ObjectStore, StorageError};

/// Minimum length of a sanitized path segment; shorter results are padded
/// with zeroes.
const SEGMENT_MIN_LEN: usize = 3;
/// Maximum length of a sanitized path segment.
const SEGMENT_MAX_LEN: usize = 63;

/// Why resolution failed.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The document reached resolution without any classification triple;
    /// there is nothing to route on.
    #[error("no classification to route on")]
    NoClassification,
    /// Copying the file failed; transient, nothing was persisted.
    #[error("file copy failed: {0}")]
    Storage(#[from] StorageError),
    #[error("database error during resolution: {0}")]
    Db(#[from] DieselError),
}

impl ResolveError {
    /// Whether this failure means "no rule", as opposed to an
    /// infrastructure problem.
    pub fn is_no_destination(&self) -> bool {
        matches!(self, ResolveError::NoClassification)
    }
}

/// Sanitize a value into a safe path segment.
///
/// Lower-cases, maps whitespace and underscores to hyphens, strips
/// everything outside `[a-z0-9-]`, trims hyphens, truncates to 63 and
/// pads to at least 3 characters. Idempotent and total; applied
/// identically to every segment so the whole key is safe for the
/// storage backend.
pub fn sanitize_segment(value: &str) -> String {
    let mut out: String = value
        .to_lowercase()
        .chars()
        .map(|c| if c.is_whitespace() || c == '_' { '-' } else { c })
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
        .collect();

    out = out.trim_matches('-').to_string();
    if out.len() > SEGMENT_MAX_LEN {
        out.truncate(SEGMENT_MAX_LEN);
        out = out.trim_end_matches('-').to_string();
    }
    while out.len() < SEGMENT_MIN_LEN {
        out.push('0');
    }
    out
}

fn identifier_segment(value: &str, fallback: &'static str) -> String {
    if Identifiers::is_known(value) {
        sanitize_segment(value)
    } else {
        fallback.to_string()
    }
}

/// Build the hierarchical destination key for a document.
///
/// Shape: `{prefix}/{account}/{policy}[/claim-{claim}]/{department}/{category}/{suffix}/{filename}`.
/// The claim segment appears only for Claims-department documents with a
/// known claim number.
pub fn destination_key(doc: &Document, suffix: &str, prefix: &str) -> String {
    let (department, category, _) = doc.triple();
    let ids = &doc.identifiers;

    let mut segments = vec![
        prefix.to_string(),
        identifier_segment(&ids.account_number, "unknown-account"),
        identifier_segment(&ids.policy_number, "unknown-policy"),
    ];

    if department.eq_ignore_ascii_case("claims") && Identifiers::is_known(&ids.claim_number) {
        segments.push(format!("claim-{}", sanitize_segment(&ids.claim_number)));
    }

    segments.push(sanitize_segment(department));
    segments.push(sanitize_segment(category));
    segments.push(suffix.to_string());
    segments.push(doc.filename.clone());

    segments.join("/")
}

/// Resolves destinations and performs the file copy.
pub struct DestinationResolver<S: ObjectStore + ?Sized> {
    mappings: BucketMappingRepository,
    store: std::sync::Arc<S>,
    source_bucket: String,
    output_bucket: String,
    output_prefix: String,
}

impl<S: ObjectStore + ?Sized> DestinationResolver<S> {
    pub fn new(
        mappings: BucketMappingRepository,
        store: std::sync::Arc<S>,
        source_bucket: impl Into<String>,
        output_bucket: impl Into<String>,
        output_prefix: impl Into<String>,
    ) -> Self {
        Self {
            mappings,
            store,
            source_bucket: source_bucket.into(),
            output_bucket: output_bucket.into(),
            output_prefix: output_prefix.into(),
        }
    }

    /// Look up or learn the suffix segment for the document's triple.
    ///
    /// Read-or-create with a documented race: two concurrent resolutions
    /// of a brand-new triple may both insert; lookups always take the
    /// most recent row, so they converge.
    pub async fn resolve_suffix(&self, doc: &Document) -> Result<String, ResolveError> {
        let (department, category, subcategory) = doc.triple();

        if let Some(mapping) = self
            .mappings
            .find_latest(department, category, subcategory)
            .await?
        {
            if !mapping.bucket_name.trim().is_empty() {
                return Ok(sanitize_segment(&mapping.bucket_name));
            }
        }

        let suffix = sanitize_segment(subcategory);
        self.mappings
            .create(department, category, subcategory, &suffix)
            .await?;
        info!(
            department,
            category, subcategory, suffix, "learned new bucket mapping"
        );
        Ok(suffix)
    }

    /// Resolve the destination for a classified document and copy the
    /// file there.
    ///
    /// On failure nothing is persisted to the document; the caller maps
    /// the error onto a terminal status.
    pub async fn resolve(&self, doc: &Document) -> Result<Location, ResolveError> {
        if !doc.is_classified() {
            return Err(ResolveError::NoClassification);
        }

        let suffix = self.resolve_suffix(doc).await?;
        let key = destination_key(doc, &suffix, &self.output_prefix);

        self.store.ensure_bucket(&self.output_bucket).await?;
        self.store
            .copy(&self.source_bucket, &doc.source_key, &self.output_bucket, &key)
            .await?;

        debug!(document_id = %doc.id, %key, "copied document to destination");
        Ok(Location::new(self.output_bucket.clone(), key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentStatus;

    fn claims_doc() -> Document {
        let mut doc = Document::new(
            "doc-1".to_string(),
            "statement.pdf".to_string(),
            "abc_statement.pdf".to_string(),
        );
        doc.department = Some("Claims".to_string());
        doc.category = Some("Settlement".to_string());
        doc.subcategory = Some("Payout".to_string());
        doc.identifiers.claim_number = "7781".to_string();
        doc.status = DocumentStatus::Pending;
        doc
    }

    #[test]
    fn test_sanitize_basic() {
        assert_eq!(sanitize_segment("Payout"), "payout");
        assert_eq!(sanitize_segment("Total Loss_Report"), "total-loss-report");
        assert_eq!(sanitize_segment("  --Weird!! Name--  "), "weird-name");
    }

    #[test]
    fn test_sanitize_pads_short_values() {
        assert_eq!(sanitize_segment(""), "000");
        assert_eq!(sanitize_segment("a"), "a00");
        assert_eq!(sanitize_segment("!!"), "000");
    }

    #[test]
    fn test_sanitize_truncates_to_63() {
        let long = "x".repeat(100);
        assert_eq!(sanitize_segment(&long).len(), 63);
    }

    #[test]
    fn test_sanitize_idempotent_and_shaped() {
        let long = "verylongsegment-".repeat(10);
        let inputs = ["Payout", "", "A B_C", "--x--", "Ünïcode Näme", long.as_str()];
        for input in inputs {
            let once = sanitize_segment(input);
            assert_eq!(sanitize_segment(&once), once, "not idempotent for {input:?}");
            assert!(
                (SEGMENT_MIN_LEN..=SEGMENT_MAX_LEN).contains(&once.len()),
                "bad length for {input:?}: {once:?}"
            );
            assert!(once.chars().all(|c| c.is_ascii_lowercase()
                || c.is_ascii_digit()
                || c == '-'));
            assert!(!once.starts_with('-') && !once.ends_with('-'));
        }
    }

    #[test]
    fn test_destination_key_claims_scenario() {
        let doc = claims_doc();
        let key = destination_key(&doc, "payout", "output");
        assert_eq!(
            key,
            "output/unknown-account/unknown-policy/claim-7781/claims/settlement/payout/statement.pdf"
        );
    }

    #[test]
    fn test_destination_key_without_claim_number() {
        let mut doc = claims_doc();
        doc.identifiers.claim_number = "XXXX".to_string();
        let key = destination_key(&doc, "payout", "output");
        assert_eq!(
            key,
            "output/unknown-account/unknown-policy/claims/settlement/payout/statement.pdf"
        );
    }

    #[test]
    fn test_destination_key_non_claims_department_skips_claim_segment() {
        let mut doc = claims_doc();
        doc.department = Some("Underwriting".to_string());
        let key = destination_key(&doc, "payout", "output");
        assert!(!key.contains("claim-"));
        assert!(key.contains("/underwriting/settlement/"));
    }

    #[test]
    fn test_destination_key_uses_known_identifiers() {
        let mut doc = claims_doc();
        doc.identifiers.account_number = "AC 9921".to_string();
        doc.identifiers.policy_number = "P-100".to_string();
        let key = destination_key(&doc, "payout", "output");
        assert!(key.starts_with("output/ac-9921/p-100/claim-7781/"));
    }
}
