//! Document repository.
//!
//! The document row is the single point of truth for pipeline state.
//! Terminal commits update the row and append the announcing outbox event
//! in one transaction, so a crash can never acknowledge work that was not
//! durably recorded.

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};

use super::models::{DocumentRecord, NewDocument};
use super::outbox::insert_row;
use super::parse_datetime;
use super::pool::{AsyncSqlitePool, DieselError};
use crate::models::{Document, DocumentStatus, Identifiers};
use crate::schema::documents;

/// Repository over the documents table.
#[derive(Clone)]
pub struct DocumentRepository {
    pool: AsyncSqlitePool,
}

impl DocumentRepository {
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    /// Fetch a document by id.
    pub async fn get(&self, id: &str) -> Result<Option<Document>, DieselError> {
        let mut conn = self.pool.get().await?;

        let record: Option<DocumentRecord> = documents::table
            .find(id)
            .first(&mut conn)
            .await
            .optional()?;

        Ok(record.map(record_to_document))
    }

    /// Insert a new document and its "submitted" outbox event atomically.
    pub async fn create_with_event(
        &self,
        doc: &Document,
        exchange: &str,
        routing_key: &str,
        payload: &serde_json::Value,
    ) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;

        conn.transaction::<_, DieselError, _>(|conn| {
            async move {
                let created = doc.created_at.to_rfc3339();
                let updated = doc.updated_at.to_rfc3339();
                diesel::insert_into(documents::table)
                    .values(NewDocument {
                        id: &doc.id,
                        filename: &doc.filename,
                        source_key: &doc.source_key,
                        extracted_text: doc.extracted_text.as_deref(),
                        department: doc.department.as_deref(),
                        category: doc.category.as_deref(),
                        subcategory: doc.subcategory.as_deref(),
                        summary: doc.summary.as_deref(),
                        action_items: doc.action_items.as_deref(),
                        account_number: &doc.identifiers.account_number,
                        policyholder_name: &doc.identifiers.policyholder_name,
                        policy_number: &doc.identifiers.policy_number,
                        claim_number: &doc.identifiers.claim_number,
                        status: doc.status.as_str(),
                        destination_bucket: doc.destination_bucket.as_deref(),
                        destination_key: doc.destination_key.as_deref(),
                        error_message: doc.error_message.as_deref(),
                        created_at: &created,
                        updated_at: &updated,
                    })
                    .execute(conn)
                    .await?;

                insert_row(conn, exchange, routing_key, payload).await
            }
            .scope_boxed()
        })
        .await
    }

    /// Persist the mutable fields of a document (no outbox event).
    pub async fn save(&self, doc: &Document) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        let now = Utc::now().to_rfc3339();

        diesel::update(documents::table.find(&doc.id))
            .set((
                documents::extracted_text.eq(doc.extracted_text.as_deref()),
                documents::department.eq(doc.department.as_deref()),
                documents::category.eq(doc.category.as_deref()),
                documents::subcategory.eq(doc.subcategory.as_deref()),
                documents::summary.eq(doc.summary.as_deref()),
                documents::action_items.eq(doc.action_items.as_deref()),
                documents::account_number.eq(&doc.identifiers.account_number),
                documents::policyholder_name.eq(&doc.identifiers.policyholder_name),
                documents::policy_number.eq(&doc.identifiers.policy_number),
                documents::claim_number.eq(&doc.identifiers.claim_number),
                documents::status.eq(doc.status.as_str()),
                documents::destination_bucket.eq(doc.destination_bucket.as_deref()),
                documents::destination_key.eq(doc.destination_key.as_deref()),
                documents::error_message.eq(doc.error_message.as_deref()),
                documents::updated_at.eq(&now),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    /// Persist a terminal state together with the outbox event announcing
    /// it, in a single transaction.
    pub async fn commit_terminal(
        &self,
        doc: &Document,
        exchange: &str,
        routing_key: &str,
        payload: &serde_json::Value,
    ) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;

        conn.transaction::<_, DieselError, _>(|conn| {
            async move {
                let now = Utc::now().to_rfc3339();
                diesel::update(documents::table.find(&doc.id))
                    .set((
                        documents::extracted_text.eq(doc.extracted_text.as_deref()),
                        documents::department.eq(doc.department.as_deref()),
                        documents::category.eq(doc.category.as_deref()),
                        documents::subcategory.eq(doc.subcategory.as_deref()),
                        documents::summary.eq(doc.summary.as_deref()),
                        documents::action_items.eq(doc.action_items.as_deref()),
                        documents::status.eq(doc.status.as_str()),
                        documents::destination_bucket.eq(doc.destination_bucket.as_deref()),
                        documents::destination_key.eq(doc.destination_key.as_deref()),
                        documents::error_message.eq(doc.error_message.as_deref()),
                        documents::updated_at.eq(&now),
                    ))
                    .execute(conn)
                    .await?;

                insert_row(conn, exchange, routing_key, payload).await
            }
            .scope_boxed()
        })
        .await
    }

    /// Documents in a given status, oldest first.
    pub async fn list_by_status(
        &self,
        status: DocumentStatus,
        limit: i64,
    ) -> Result<Vec<Document>, DieselError> {
        let mut conn = self.pool.get().await?;

        let records: Vec<DocumentRecord> = documents::table
            .filter(documents::status.eq(status.as_str()))
            .order(documents::created_at.asc())
            .limit(limit)
            .load(&mut conn)
            .await?;

        Ok(records.into_iter().map(record_to_document).collect())
    }
}

fn record_to_document(record: DocumentRecord) -> Document {
    // Unknown status text is treated as Failed so the worker never
    // re-enters the pipeline on a corrupted row.
    let status = DocumentStatus::from_str(&record.status).unwrap_or(DocumentStatus::Failed);
    Document {
        id: record.id,
        filename: record.filename,
        source_key: record.source_key,
        extracted_text: record.extracted_text,
        department: record.department,
        category: record.category,
        subcategory: record.subcategory,
        summary: record.summary,
        action_items: record.action_items,
        identifiers: Identifiers {
            account_number: record.account_number,
            policyholder_name: record.policyholder_name,
            policy_number: record.policy_number,
            claim_number: record.claim_number,
        },
        status,
        destination_bucket: record.destination_bucket,
        destination_key: record.destination_key,
        error_message: record.error_message,
        created_at: parse_datetime(&record.created_at),
        updated_at: parse_datetime(&record.updated_at),
    }
}
