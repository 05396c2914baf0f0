//! Command implementations.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use console::style;

use crate::classify::{Classifier, HierarchyCache, LlmClassifier};
use crate::config::Config;
use crate::destination::DestinationResolver;
use crate::models::{DocumentStatus, Identifiers, OverrideRequest, UNKNOWN_IDENTIFIER};
use crate::ocr::{TesseractConfig, TesseractExtractor, TextExtractor};
use crate::publisher::{OutboxPublisher, PublisherConfig};
use crate::repository::{
    migrations::run_migrations, AsyncSqlitePool, BucketMappingRepository, DocumentRepository,
    HierarchyRepository, OutboxRepository,
};
use crate::services::{EmailIntake, IntakeConfig, OverrideService, SubmitService};
use crate::storage::{FsObjectStore, ObjectStore};
use crate::worker::{PipelineWorker, WorkerConfig};

/// Shared wiring for commands that touch the database and storage.
pub struct AppContext {
    pub config: Config,
    pool: AsyncSqlitePool,
    store: Arc<dyn ObjectStore>,
}

impl AppContext {
    /// Open the database (running pending migrations) and the object
    /// store.
    pub async fn init(config: Config) -> anyhow::Result<Self> {
        run_migrations(&config.database.url).await?;
        let pool = AsyncSqlitePool::new(&config.database.url);
        let store: Arc<dyn ObjectStore> = Arc::new(FsObjectStore::new(config.storage.root.clone()));
        Ok(Self {
            config,
            pool,
            store,
        })
    }

    fn documents(&self) -> DocumentRepository {
        DocumentRepository::new(self.pool.clone())
    }

    fn resolver(&self) -> DestinationResolver<dyn ObjectStore> {
        DestinationResolver::new(
            BucketMappingRepository::new(self.pool.clone()),
            self.store.clone(),
            self.config.storage.source_bucket.clone(),
            self.config.storage.output_bucket.clone(),
            self.config.storage.output_prefix.clone(),
        )
    }

    fn submit_service(&self) -> SubmitService {
        SubmitService::new(
            self.documents(),
            self.store.clone(),
            self.config.storage.source_bucket.clone(),
            self.config.broker.submissions_queue.clone(),
        )
    }

    fn classifier(&self) -> anyhow::Result<Arc<dyn Classifier>> {
        let hierarchy = HierarchyCache::new(
            HierarchyRepository::new(self.pool.clone()),
            Duration::from_secs(self.config.classifier.hierarchy_ttl_secs),
        );
        let classifier = LlmClassifier::new(self.config.classifier.clone(), hierarchy)?;
        Ok(Arc::new(classifier))
    }

    fn extractor(&self) -> Arc<dyn TextExtractor> {
        Arc::new(TesseractExtractor::new(TesseractConfig {
            language: self.config.ocr.language.clone(),
            dpi: self.config.ocr.dpi,
        }))
    }
}

pub async fn migrate(config: &Config) -> anyhow::Result<()> {
    run_migrations(&config.database.url).await?;
    println!("{} migrations up to date", style("✓").green());
    Ok(())
}

pub async fn submit(
    ctx: &AppContext,
    file: &Path,
    account: Option<String>,
    policyholder: Option<String>,
    policy: Option<String>,
    claim: Option<String>,
) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(file).await?;
    let filename = file
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow::anyhow!("file has no usable name: {}", file.display()))?;

    let or_unknown = |v: Option<String>| v.unwrap_or_else(|| UNKNOWN_IDENTIFIER.to_string());
    let identifiers = Identifiers {
        account_number: or_unknown(account),
        policyholder_name: or_unknown(policyholder),
        policy_number: or_unknown(policy),
        claim_number: or_unknown(claim),
    };

    let doc = ctx
        .submit_service()
        .submit(filename, &bytes, Some(identifiers))
        .await?;
    println!(
        "{} submitted {} as document {}",
        style("✓").green(),
        filename,
        style(&doc.id).cyan()
    );
    Ok(())
}

pub async fn worker(ctx: &AppContext) -> anyhow::Result<()> {
    if let Err(e) = crate::ocr::TesseractExtractor::check_available() {
        eprintln!("{} {e}", style("warning:").yellow());
    }

    let worker = PipelineWorker::new(
        ctx.documents(),
        ctx.resolver(),
        ctx.store.clone(),
        ctx.extractor(),
        ctx.classifier()?,
        WorkerConfig {
            broker_url: ctx.config.broker.url.clone(),
            submissions_queue: ctx.config.broker.submissions_queue.clone(),
            status_routing_key: ctx.config.broker.status_queue.clone(),
            source_bucket: ctx.config.storage.source_bucket.clone(),
            ocr_timeout: ctx.config.ocr.timeout(),
        },
    );
    worker.run().await
}

pub async fn outbox(ctx: &AppContext, once: bool) -> anyhow::Result<()> {
    let publisher = OutboxPublisher::new(
        OutboxRepository::new(ctx.pool.clone()),
        PublisherConfig::from_broker(&ctx.config.broker),
    );

    if once {
        let sent = publisher.publish_pass().await?;
        println!("{} published {sent} outbox rows", style("✓").green());
        Ok(())
    } else {
        publisher.run().await
    }
}

pub async fn intake(ctx: &AppContext, once: bool) -> anyhow::Result<()> {
    let intake = EmailIntake::new(
        ctx.submit_service(),
        ctx.classifier()?,
        ctx.extractor(),
        IntakeConfig {
            inbox_dir: ctx.config.intake.inbox_dir.clone(),
            poll_interval: ctx.config.intake.poll_interval(),
        },
    );

    if once {
        let submitted = intake.scan_once().await?;
        println!("{} submitted {submitted} documents", style("✓").green());
        Ok(())
    } else {
        intake.run().await
    }
}

pub async fn override_document(
    ctx: &AppContext,
    document_id: &str,
    request: &OverrideRequest,
) -> anyhow::Result<()> {
    let service = OverrideService::new(
        ctx.documents(),
        ctx.resolver(),
        ctx.config.broker.status_queue.clone(),
    );

    let doc = service.apply(document_id, request).await?;
    println!(
        "{} document {} is now {}",
        style("✓").green(),
        document_id,
        style(doc.status.as_str()).cyan()
    );
    if let Some(key) = &doc.destination_key {
        println!("  destination: {key}");
    }
    Ok(())
}

pub async fn show(
    ctx: &AppContext,
    document_id: Option<&str>,
    status: Option<&str>,
    limit: i64,
) -> anyhow::Result<()> {
    let documents = ctx.documents();

    if let Some(id) = document_id {
        let Some(doc) = documents.get(id).await? else {
            anyhow::bail!("document not found: {id}");
        };
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    let status = match status {
        Some(s) => DocumentStatus::from_str(s)
            .ok_or_else(|| anyhow::anyhow!("unknown status: {s}"))?,
        None => DocumentStatus::Pending,
    };

    let docs = documents.list_by_status(status, limit).await?;
    if docs.is_empty() {
        println!("no {} documents", status.as_str());
        return Ok(());
    }
    for doc in docs {
        println!(
            "{}  {}  {}",
            style(&doc.id).cyan(),
            doc.filename,
            doc.destination_key.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

pub async fn hierarchy_add(
    ctx: &AppContext,
    department: &str,
    category: &str,
    subcategory: &str,
) -> anyhow::Result<()> {
    HierarchyRepository::new(ctx.pool.clone())
        .insert(department, category, subcategory)
        .await?;
    println!(
        "{} {department} / {category} / {subcategory}",
        style("✓").green()
    );
    Ok(())
}

pub async fn hierarchy_list(ctx: &AppContext) -> anyhow::Result<()> {
    let triples = HierarchyRepository::new(ctx.pool.clone())
        .list_triples()
        .await?;
    for (department, category, subcategory) in triples {
        println!("{department} / {category} / {subcategory}");
    }
    Ok(())
}
