//! End-to-end pipeline tests against a temporary SQLite database and a
//! filesystem object store. The classifier and extractor are stubbed;
//! everything else is the real wiring.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tempfile::TempDir;

use docroute::classify::{Classifier, ClassifyError};
use docroute::destination::DestinationResolver;
use docroute::models::{Document, DocumentStatus, Identifiers, OverrideRequest, SubmissionPayload};
use docroute::ocr::{OcrError, TextExtractor};
use docroute::repository::{
    migrations::run_migrations, AsyncSqlitePool, BucketMappingRepository, DocumentRepository,
    OutboxRepository,
};
use docroute::services::{OverrideService, SubmitService};
use docroute::storage::{FsObjectStore, ObjectStore};
use docroute::worker::{PipelineWorker, WorkerConfig};

struct TestEnv {
    _dir: TempDir,
    pool: AsyncSqlitePool,
    store: Arc<dyn ObjectStore>,
}

async fn test_env() -> TestEnv {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite:{}", dir.path().join("test.db").display());
    run_migrations(&url).await.unwrap();
    let pool = AsyncSqlitePool::new(&url);
    let store: Arc<dyn ObjectStore> = Arc::new(FsObjectStore::new(dir.path().join("objects")));
    TestEnv {
        _dir: dir,
        pool,
        store,
    }
}

impl TestEnv {
    fn documents(&self) -> DocumentRepository {
        DocumentRepository::new(self.pool.clone())
    }

    fn outbox(&self) -> OutboxRepository {
        OutboxRepository::new(self.pool.clone())
    }

    fn mappings(&self) -> BucketMappingRepository {
        BucketMappingRepository::new(self.pool.clone())
    }

    fn resolver(&self) -> DestinationResolver<dyn ObjectStore> {
        DestinationResolver::new(
            self.mappings(),
            self.store.clone(),
            "documents",
            "processed",
            "output",
        )
    }

    fn submit_service(&self) -> SubmitService {
        SubmitService::new(
            self.documents(),
            self.store.clone(),
            "documents",
            "documents.submitted",
        )
    }

    fn worker(&self, classifier: StubClassifier) -> PipelineWorker {
        PipelineWorker::new(
            self.documents(),
            self.resolver(),
            self.store.clone(),
            Arc::new(StubExtractor),
            Arc::new(classifier),
            WorkerConfig {
                broker_url: "amqp://unused".to_string(),
                submissions_queue: "documents.submitted".to_string(),
                status_routing_key: "documents.status".to_string(),
                source_bucket: "documents".to_string(),
                ocr_timeout: Duration::from_secs(5),
            },
        )
    }
}

struct StubExtractor;

#[async_trait]
impl TextExtractor for StubExtractor {
    async fn extract(&self, bytes: &[u8], _filename: &str) -> Result<String, OcrError> {
        Ok(String::from_utf8_lossy(bytes).to_string())
    }
}

struct StubClassifier {
    result: Option<Value>,
}

impl StubClassifier {
    fn claims() -> Self {
        Self {
            result: Some(json!({
                "department": "Claims",
                "category": "Settlement",
                "subcategory": "Payout",
                "summary": "Payout approved for SSN 123-45-6789.",
                "action_items": ["Release funds"],
            })),
        }
    }

    fn failing() -> Self {
        Self { result: None }
    }
}

#[async_trait]
impl Classifier for StubClassifier {
    async fn classify(&self, _text: &str) -> Result<Value, ClassifyError> {
        self.result
            .clone()
            .ok_or_else(|| ClassifyError::Api("classifier down".to_string()))
    }

    async fn extract_metadata(&self, _: &str, _: &str, _: &str) -> Identifiers {
        Identifiers::default()
    }
}

fn claims_identifiers() -> Identifiers {
    Identifiers {
        claim_number: "7781".to_string(),
        ..Identifiers::default()
    }
}

#[tokio::test]
async fn submit_records_document_and_outbox_event() {
    let env = test_env().await;

    let doc = env
        .submit_service()
        .submit("statement.pdf", b"claim payout text", None)
        .await
        .unwrap();

    let stored = env.documents().get(&doc.id).await.unwrap().unwrap();
    assert_eq!(stored.status, DocumentStatus::Pending);
    assert!(stored.source_key.ends_with("_statement.pdf"));

    let pending = env.outbox().fetch_unsent().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].routing_key, "documents.submitted");
    assert_eq!(pending[0].payload["document_id"], doc.id.as_str());
}

#[tokio::test]
async fn worker_routes_classified_document() {
    let env = test_env().await;
    let doc = env
        .submit_service()
        .submit("statement.pdf", b"claim payout text", Some(claims_identifiers()))
        .await
        .unwrap();

    let worker = env.worker(StubClassifier::claims());
    worker
        .process_submission(&SubmissionPayload {
            document_id: doc.id.clone(),
            source_key: doc.source_key.clone(),
        })
        .await
        .unwrap();

    let settled = env.documents().get(&doc.id).await.unwrap().unwrap();
    assert_eq!(settled.status, DocumentStatus::Processed);
    assert_eq!(
        settled.destination_key.as_deref(),
        Some("output/unknown-account/unknown-policy/claim-7781/claims/settlement/payout/statement.pdf")
    );
    assert_eq!(settled.destination_bucket.as_deref(), Some("processed"));
    // Summary is persisted masked
    assert_eq!(
        settled.summary.as_deref(),
        Some("Payout approved for SSN ***-**-****.")
    );

    // The copied object exists at the resolved location
    let copied = env
        .store
        .get("processed", settled.destination_key.as_deref().unwrap())
        .await
        .unwrap();
    assert_eq!(copied, b"claim payout text");

    // Submission event plus status event
    let pending = env.outbox().fetch_unsent().await.unwrap();
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[1].routing_key, "documents.status");
    assert_eq!(pending[1].payload["status"], "processed");
}

#[tokio::test]
async fn worker_settles_no_destination_when_classification_absent() {
    let env = test_env().await;
    let doc = env
        .submit_service()
        .submit("mystery.pdf", b"unreadable scan", None)
        .await
        .unwrap();

    let worker = env.worker(StubClassifier::failing());
    worker
        .process_submission(&SubmissionPayload {
            document_id: doc.id.clone(),
            source_key: doc.source_key.clone(),
        })
        .await
        .unwrap();

    let settled = env.documents().get(&doc.id).await.unwrap().unwrap();
    assert_eq!(settled.status, DocumentStatus::NoDestination);
    assert!(settled.destination_key.is_none());
    assert!(settled.error_message.is_some());

    let pending = env.outbox().fetch_unsent().await.unwrap();
    assert_eq!(pending[1].payload["status"], "no_destination");
}

#[tokio::test]
async fn worker_degrades_missing_source_to_no_destination() {
    let env = test_env().await;
    let doc = env
        .submit_service()
        .submit("ghost.pdf", b"soon to vanish", None)
        .await
        .unwrap();

    // Remove the stored object out from under the pipeline.
    let object = env
        ._dir
        .path()
        .join("objects")
        .join("documents")
        .join(&doc.source_key);
    std::fs::remove_file(object).unwrap();

    let worker = env.worker(StubClassifier::claims());
    worker
        .process_submission(&SubmissionPayload {
            document_id: doc.id.clone(),
            source_key: doc.source_key.clone(),
        })
        .await
        .unwrap();

    // A permanently missing object reads as an unreadable scan: the
    // document settles instead of being redelivered forever.
    let settled = env.documents().get(&doc.id).await.unwrap().unwrap();
    assert_eq!(settled.status, DocumentStatus::NoDestination);
    assert_eq!(settled.extracted_text.as_deref(), Some(""));
    assert!(settled.destination_key.is_none());
}

#[tokio::test]
async fn worker_drops_submission_for_unknown_document() {
    let env = test_env().await;
    let worker = env.worker(StubClassifier::claims());

    worker
        .process_submission(&SubmissionPayload {
            document_id: "no-such-document".to_string(),
            source_key: "nope.pdf".to_string(),
        })
        .await
        .unwrap();

    assert!(env.outbox().fetch_unsent().await.unwrap().is_empty());
}

#[tokio::test]
async fn resolver_honors_preseeded_mapping() {
    let env = test_env().await;
    env.mappings()
        .create("Claims", "Settlement", "Payout", "special-suffix")
        .await
        .unwrap();

    let doc = env
        .submit_service()
        .submit("statement.pdf", b"claim payout text", Some(claims_identifiers()))
        .await
        .unwrap();

    let worker = env.worker(StubClassifier::claims());
    worker
        .process_submission(&SubmissionPayload {
            document_id: doc.id.clone(),
            source_key: doc.source_key.clone(),
        })
        .await
        .unwrap();

    let settled = env.documents().get(&doc.id).await.unwrap().unwrap();
    assert!(settled
        .destination_key
        .unwrap()
        .contains("/special-suffix/"));
}

#[tokio::test]
async fn resolver_learns_mapping_on_first_resolution() {
    let env = test_env().await;
    assert!(env
        .mappings()
        .find_latest("Claims", "Settlement", "Payout")
        .await
        .unwrap()
        .is_none());

    let doc = env
        .submit_service()
        .submit("statement.pdf", b"claim payout text", None)
        .await
        .unwrap();
    let worker = env.worker(StubClassifier::claims());
    worker
        .process_submission(&SubmissionPayload {
            document_id: doc.id.clone(),
            source_key: doc.source_key.clone(),
        })
        .await
        .unwrap();

    let learned = env
        .mappings()
        .find_latest("Claims", "Settlement", "Payout")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(learned.bucket_name, "payout");
}

#[tokio::test]
async fn resolve_yields_same_suffix_on_repeat_resolution() {
    let env = test_env().await;
    env.store
        .put("documents", "k_statement.pdf", b"claim payout text")
        .await
        .unwrap();

    let mut doc = Document::new(
        "doc-repeat".to_string(),
        "statement.pdf".to_string(),
        "k_statement.pdf".to_string(),
    );
    doc.department = Some("Claims".to_string());
    doc.category = Some("Settlement".to_string());
    doc.subcategory = Some("Payout".to_string());

    let resolver = env.resolver();
    let first = resolver.resolve(&doc).await.unwrap();
    let second = resolver.resolve(&doc).await.unwrap();

    // The first resolution learns the mapping; the second reads it back.
    assert_eq!(first.key, second.key);
    assert!(first.key.contains("/payout/"));
}

#[tokio::test]
async fn outbox_retries_until_sent() {
    let env = test_env().await;
    let outbox = env.outbox();

    outbox
        .append("", "documents.submitted", &json!({"document_id": "d1"}))
        .await
        .unwrap();

    let pending = outbox.fetch_unsent().await.unwrap();
    let id = pending[0].id;

    outbox.mark_error(id, "broker unreachable").await.unwrap();
    let still_pending = outbox.fetch_unsent().await.unwrap();
    assert_eq!(still_pending.len(), 1);
    assert_eq!(still_pending[0].error.as_deref(), Some("broker unreachable"));

    outbox.mark_sent(id).await.unwrap();
    assert!(outbox.fetch_unsent().await.unwrap().is_empty());
}

async fn processed_document(env: &TestEnv) -> String {
    let doc = env
        .submit_service()
        .submit("statement.pdf", b"claim payout text", Some(claims_identifiers()))
        .await
        .unwrap();
    env.worker(StubClassifier::claims())
        .process_submission(&SubmissionPayload {
            document_id: doc.id.clone(),
            source_key: doc.source_key.clone(),
        })
        .await
        .unwrap();
    doc.id
}

#[tokio::test]
async fn override_with_no_changes_is_a_noop() {
    let env = test_env().await;
    let id = processed_document(&env).await;
    let before = env.documents().get(&id).await.unwrap().unwrap();
    let events_before = env.outbox().fetch_unsent().await.unwrap().len();

    let service = OverrideService::new(env.documents(), env.resolver(), "documents.status");
    let after = service
        .apply(
            &id,
            &OverrideRequest {
                summary: before.summary.clone(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(after.status, DocumentStatus::Processed);
    assert_eq!(
        env.outbox().fetch_unsent().await.unwrap().len(),
        events_before
    );
}

#[tokio::test]
async fn override_summary_only_keeps_destination() {
    let env = test_env().await;
    let id = processed_document(&env).await;
    let before = env.documents().get(&id).await.unwrap().unwrap();

    let service = OverrideService::new(env.documents(), env.resolver(), "documents.status");
    let after = service
        .apply(
            &id,
            &OverrideRequest {
                summary: Some("Corrected summary, SSN 999-88-7777 removed.".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(after.status, DocumentStatus::Overridden);
    assert_eq!(after.destination_key, before.destination_key);
    // Override text passes through the same masking as worker output
    assert_eq!(
        after.summary.as_deref(),
        Some("Corrected summary, SSN ***-**-**** removed.")
    );
}

#[tokio::test]
async fn override_classification_reroutes_document() {
    let env = test_env().await;
    let id = processed_document(&env).await;

    let service = OverrideService::new(env.documents(), env.resolver(), "documents.status");
    let after = service
        .apply(
            &id,
            &OverrideRequest {
                department: Some("Underwriting".to_string()),
                category: Some("Renewal".to_string()),
                subcategory: Some("Quote".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(after.status, DocumentStatus::ProcessedWithOverride);
    let key = after.destination_key.unwrap();
    assert!(key.contains("/underwriting/renewal/quote/"));
    // Re-routed outside Claims, so no claim segment
    assert!(!key.contains("claim-"));

    let copied = env.store.get("processed", &key).await.unwrap();
    assert_eq!(copied, b"claim payout text");
}

#[tokio::test]
async fn override_rejects_pending_document() {
    let env = test_env().await;
    let doc = env
        .submit_service()
        .submit("statement.pdf", b"text", None)
        .await
        .unwrap();

    let service = OverrideService::new(env.documents(), env.resolver(), "documents.status");
    let err = service
        .apply(
            &doc.id,
            &OverrideRequest {
                summary: Some("too early".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

    assert!(err.to_string().contains("still being processed"));
}
