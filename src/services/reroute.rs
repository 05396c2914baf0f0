//! Manual overrides of settled documents.
//!
//! An operator may correct the classification or just the summary of a
//! document the pipeline has already settled. Classification changes
//! re-run destination resolution synchronously; summary-only changes
//! leave the destination alone. A request that changes nothing is a
//! no-op and commits nothing.

use thiserror::Error;
use tracing::info;

use crate::destination::{DestinationResolver, ResolveError};
use crate::models::{Document, DocumentStatus, OverrideChange, OverrideRequest, StatusPayload};
use crate::pii::PiiFilter;
use crate::repository::{DieselError, DocumentRepository};
use crate::storage::ObjectStore;

#[derive(Debug, Error)]
pub enum OverrideError {
    #[error("document not found: {0}")]
    NotFound(String),
    #[error("document {0} is still being processed")]
    StillPending(String),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Db(#[from] DieselError),
    #[error(transparent)]
    Serialize(#[from] serde_json::Error),
}

/// Applies operator overrides and re-routes where needed.
pub struct OverrideService {
    documents: DocumentRepository,
    resolver: DestinationResolver<dyn ObjectStore>,
    pii: PiiFilter,
    status_routing_key: String,
}

impl OverrideService {
    pub fn new(
        documents: DocumentRepository,
        resolver: DestinationResolver<dyn ObjectStore>,
        status_routing_key: impl Into<String>,
    ) -> Self {
        Self {
            documents,
            resolver,
            pii: PiiFilter::new(),
            status_routing_key: status_routing_key.into(),
        }
    }

    /// Apply an override to a settled document.
    ///
    /// Returns the updated document; for a no-op request the document is
    /// returned unchanged.
    pub async fn apply(
        &self,
        document_id: &str,
        request: &OverrideRequest,
    ) -> Result<Document, OverrideError> {
        let Some(mut doc) = self.documents.get(document_id).await? else {
            return Err(OverrideError::NotFound(document_id.to_string()));
        };
        if !doc.status.is_terminal() {
            return Err(OverrideError::StillPending(document_id.to_string()));
        }

        let change = request.change_kind(&doc);
        if change == OverrideChange::None {
            info!(document_id, "override changes nothing, skipping");
            return Ok(doc);
        }

        request.apply(&mut doc);
        doc.summary = doc.summary.as_deref().map(|s| self.pii.redact(s));
        doc.action_items = doc.action_items.as_deref().map(|s| self.pii.redact(s));

        match change {
            OverrideChange::SummaryOnly => {
                doc.status = DocumentStatus::Overridden;
            }
            OverrideChange::Classification => match self.resolver.resolve(&doc).await {
                Ok(location) => {
                    doc.destination_bucket = Some(location.bucket);
                    doc.destination_key = Some(location.key);
                    doc.error_message = None;
                    doc.status = DocumentStatus::ProcessedWithOverride;
                }
                Err(e) if e.is_no_destination() => {
                    doc.status = DocumentStatus::NoDestination;
                    doc.error_message = Some(e.to_string());
                }
                // Database failures abort without committing so the
                // operator can retry against the previous settled state.
                Err(ResolveError::Db(e)) => return Err(e.into()),
                Err(e) => {
                    doc.status = DocumentStatus::Failed;
                    doc.error_message = Some(e.to_string());
                }
            },
            OverrideChange::None => unreachable!("handled above"),
        }

        let payload = StatusPayload {
            document_id: doc.id.clone(),
            status: doc.status,
            destination_bucket: doc.destination_bucket.clone(),
            destination_key: doc.destination_key.clone(),
            error: doc.error_message.clone(),
        };
        self.documents
            .commit_terminal(
                &doc,
                "",
                &self.status_routing_key,
                &serde_json::to_value(&payload)?,
            )
            .await?;

        info!(
            document_id,
            status = doc.status.as_str(),
            "override applied"
        );
        Ok(doc)
    }
}
