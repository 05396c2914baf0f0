//! Pipeline worker: consumes submission events and runs each document
//! through extraction, classification, redaction, and destination
//! resolution.
//!
//! Acknowledgement protocol: a message is acked only after the terminal
//! state is committed (or the message is recognized as unprocessable);
//! infrastructure failures nack with requeue so another worker retries.
//! Delivery is at-least-once, so every step tolerates reprocessing.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use lapin::message::Delivery;
use lapin::options::{BasicAckOptions, BasicNackOptions};
use tracing::{error, info, warn};

use crate::broker::Broker;
use crate::classify::{sanitize_classification, Classification, Classifier};
use crate::destination::{DestinationResolver, ResolveError};
use crate::models::{Document, DocumentStatus, StatusPayload, SubmissionPayload};
use crate::ocr::TextExtractor;
use crate::pii::PiiFilter;
use crate::repository::DocumentRepository;
use crate::storage::{ObjectStore, StorageError};

/// Worker settings.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub broker_url: String,
    /// Queue the outbox publisher feeds submission events into.
    pub submissions_queue: String,
    /// Routing key for terminal status events appended to the outbox.
    pub status_routing_key: String,
    /// Bucket holding submitted files.
    pub source_bucket: String,
    /// Upper bound on a single extraction run.
    pub ocr_timeout: Duration,
}

/// How a consumed message was settled.
#[derive(Debug, PartialEq, Eq)]
enum Settle {
    Ack,
    Requeue,
}

/// The document-processing worker.
pub struct PipelineWorker {
    documents: DocumentRepository,
    resolver: DestinationResolver<dyn ObjectStore>,
    store: Arc<dyn ObjectStore>,
    extractor: Arc<dyn TextExtractor>,
    classifier: Arc<dyn Classifier>,
    pii: PiiFilter,
    config: WorkerConfig,
}

impl PipelineWorker {
    pub fn new(
        documents: DocumentRepository,
        resolver: DestinationResolver<dyn ObjectStore>,
        store: Arc<dyn ObjectStore>,
        extractor: Arc<dyn TextExtractor>,
        classifier: Arc<dyn Classifier>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            documents,
            resolver,
            store,
            extractor,
            classifier,
            pii: PiiFilter::new(),
            config,
        }
    }

    /// Consume the submissions queue until the process is stopped.
    pub async fn run(&self) -> anyhow::Result<()> {
        let broker = Broker::connect(&self.config.broker_url).await?;
        let mut consumer = broker
            .consume(&self.config.submissions_queue, "docroute-worker")
            .await?;
        info!(queue = %self.config.submissions_queue, "pipeline worker started");

        while let Some(delivery) = consumer.next().await {
            let delivery = delivery?;
            match self.handle_delivery(&delivery).await {
                Settle::Ack => delivery.ack(BasicAckOptions::default()).await?,
                Settle::Requeue => {
                    delivery
                        .nack(BasicNackOptions {
                            requeue: true,
                            ..BasicNackOptions::default()
                        })
                        .await?
                }
            }
        }
        Ok(())
    }

    async fn handle_delivery(&self, delivery: &Delivery) -> Settle {
        let payload: SubmissionPayload = match serde_json::from_slice(&delivery.data) {
            Ok(p) => p,
            Err(e) => {
                // Malformed messages would requeue forever; drop them.
                warn!("discarding unparseable submission message: {e}");
                return Settle::Ack;
            }
        };

        match self.process_submission(&payload).await {
            Ok(()) => Settle::Ack,
            Err(e) => {
                error!(document_id = %payload.document_id, "processing failed, requeueing: {e:#}");
                Settle::Requeue
            }
        }
    }

    /// Process one submission end to end and commit a terminal state.
    ///
    /// Returns `Err` only for failures where retrying the message may
    /// help; everything document-specific lands in a terminal status
    /// instead.
    pub async fn process_submission(&self, payload: &SubmissionPayload) -> anyhow::Result<()> {
        let Some(mut doc) = self.documents.get(&payload.document_id).await? else {
            warn!(document_id = %payload.document_id, "submission for unknown document, dropping");
            return Ok(());
        };

        if doc.status.is_terminal() {
            // Redelivery of an already-finished document.
            info!(document_id = %doc.id, status = doc.status.as_str(), "document already settled");
            return Ok(());
        }

        self.enrich(&mut doc).await?;

        // Persist classification before resolution so a crash mid-resolve
        // keeps the expensive LLM output.
        self.documents.save(&doc).await?;

        match self.resolver.resolve(&doc).await {
            Ok(location) => {
                doc.status = DocumentStatus::Processed;
                doc.destination_bucket = Some(location.bucket);
                doc.destination_key = Some(location.key);
                doc.error_message = None;
            }
            Err(e) if e.is_no_destination() => {
                doc.status = DocumentStatus::NoDestination;
                doc.error_message = Some(e.to_string());
            }
            Err(ResolveError::Db(e)) => return Err(e.into()),
            Err(e) => {
                doc.status = DocumentStatus::Failed;
                doc.error_message = Some(e.to_string());
            }
        }

        self.commit(&doc).await
    }

    /// Extract text, classify, and fold the results into the document.
    ///
    /// Degradation rules: a missing source object and extraction or
    /// classifier failures all degrade toward an absent classification,
    /// so the document still settles. Transient storage errors return
    /// `Err` and the message is retried via redelivery.
    async fn enrich(&self, doc: &mut Document) -> anyhow::Result<()> {
        let bytes = match self
            .store
            .get(&self.config.source_bucket, &doc.source_key)
            .await
        {
            Ok(bytes) => bytes,
            Err(e @ StorageError::NotFound { .. }) => {
                // The object will not reappear on redelivery; treat it
                // like an unreadable scan.
                warn!(document_id = %doc.id, "source object missing: {e}");
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };

        let text = if bytes.is_empty() {
            String::new()
        } else {
            match tokio::time::timeout(
                self.config.ocr_timeout,
                self.extractor.extract(&bytes, &doc.filename),
            )
            .await
            {
                Ok(Ok(text)) => text,
                Ok(Err(e)) => {
                    warn!(document_id = %doc.id, "text extraction failed: {e}");
                    String::new()
                }
                Err(_) => {
                    warn!(document_id = %doc.id, "text extraction timed out");
                    String::new()
                }
            }
        };

        let classification = if text.trim().is_empty() {
            Classification::default()
        } else {
            match self.classifier.classify(&text).await {
                Ok(raw) => sanitize_classification(&raw),
                Err(e) => {
                    warn!(document_id = %doc.id, "classification failed: {e}");
                    Classification::default()
                }
            }
        };

        doc.extracted_text = Some(text);
        apply_classification(doc, &classification, &self.pii);
        Ok(())
    }

    /// Write the terminal state and its announcing event atomically.
    async fn commit(&self, doc: &Document) -> anyhow::Result<()> {
        let payload = StatusPayload {
            document_id: doc.id.clone(),
            status: doc.status,
            destination_bucket: doc.destination_bucket.clone(),
            destination_key: doc.destination_key.clone(),
            error: doc.error_message.clone(),
        };
        self.documents
            .commit_terminal(
                doc,
                "",
                &self.config.status_routing_key,
                &serde_json::to_value(&payload)?,
            )
            .await?;
        info!(
            document_id = %doc.id,
            status = doc.status.as_str(),
            destination = doc.destination_key.as_deref().unwrap_or(""),
            "document settled"
        );
        Ok(())
    }
}

/// Fold a normalized classification into the document, masking PII in
/// the human-readable fields. Empty classifier fields clear the
/// corresponding columns rather than writing empty strings.
fn apply_classification(doc: &mut Document, classification: &Classification, pii: &PiiFilter) {
    let non_empty = |s: &String| -> Option<String> {
        if s.is_empty() {
            None
        } else {
            Some(s.clone())
        }
    };

    doc.department = non_empty(&classification.department);
    doc.category = non_empty(&classification.category);
    doc.subcategory = non_empty(&classification.subcategory);
    doc.summary = non_empty(&pii.redact(&classification.summary));
    doc.action_items = non_empty(&pii.redact(&classification.action_items));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_doc() -> Document {
        Document::new(
            "doc-1".to_string(),
            "statement.pdf".to_string(),
            "abc_statement.pdf".to_string(),
        )
    }

    #[test]
    fn test_apply_full_classification() {
        let mut doc = pending_doc();
        let classification = Classification {
            department: "Claims".into(),
            category: "Settlement".into(),
            subcategory: "Payout".into(),
            summary: "Payout approved for SSN 123-45-6789.".into(),
            action_items: r#"["Release funds"]"#.into(),
        };

        apply_classification(&mut doc, &classification, &PiiFilter::new());
        assert_eq!(doc.department.as_deref(), Some("Claims"));
        assert_eq!(
            doc.summary.as_deref(),
            Some("Payout approved for SSN ***-**-****.")
        );
        assert!(doc.is_classified());
    }

    #[test]
    fn test_apply_empty_classification_clears_fields() {
        let mut doc = pending_doc();
        doc.department = Some("Stale".into());

        apply_classification(&mut doc, &Classification::default(), &PiiFilter::new());
        assert!(doc.department.is_none());
        assert!(doc.summary.is_none());
        assert!(!doc.is_classified());
    }
}
