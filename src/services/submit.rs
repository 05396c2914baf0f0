//! Document submission.
//!
//! Stores the file in the intake bucket and records the document row
//! together with its "submitted" outbox event in one transaction. The
//! pipeline worker picks the document up once the event is relayed.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::models::{Document, Identifiers, SubmissionPayload};
use crate::repository::DocumentRepository;
use crate::storage::ObjectStore;

/// Accepts new documents into the pipeline.
pub struct SubmitService {
    documents: DocumentRepository,
    store: Arc<dyn ObjectStore>,
    source_bucket: String,
    submissions_routing_key: String,
}

impl SubmitService {
    pub fn new(
        documents: DocumentRepository,
        store: Arc<dyn ObjectStore>,
        source_bucket: impl Into<String>,
        submissions_routing_key: impl Into<String>,
    ) -> Self {
        Self {
            documents,
            store,
            source_bucket: source_bucket.into(),
            submissions_routing_key: submissions_routing_key.into(),
        }
    }

    /// Submit a file, optionally with identifiers already known from the
    /// intake channel.
    ///
    /// The source key carries a fresh UUID prefix so identically named
    /// uploads never collide.
    pub async fn submit(
        &self,
        filename: &str,
        bytes: &[u8],
        identifiers: Option<Identifiers>,
    ) -> anyhow::Result<Document> {
        let source_key = format!("{}_{filename}", Uuid::new_v4().simple());

        self.store.ensure_bucket(&self.source_bucket).await?;
        self.store
            .put(&self.source_bucket, &source_key, bytes)
            .await?;

        let mut doc = Document::new(
            Uuid::new_v4().to_string(),
            filename.to_string(),
            source_key,
        );
        if let Some(identifiers) = identifiers {
            doc.identifiers = identifiers;
        }

        let payload = SubmissionPayload {
            document_id: doc.id.clone(),
            source_key: doc.source_key.clone(),
        };
        self.documents
            .create_with_event(
                &doc,
                "",
                &self.submissions_routing_key,
                &serde_json::to_value(&payload)?,
            )
            .await?;

        info!(document_id = %doc.id, filename, "document submitted");
        Ok(doc)
    }
}
