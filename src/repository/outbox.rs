//! Outbox repository: append rows and mark delivery results.
//!
//! The outbox is append-only from the domain's point of view; only the
//! publisher mutates sent_at and error, and rows are never deleted.

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::models::{NewOutboxRow, OutboxRecord};
use super::pool::{AsyncSqliteConnection, AsyncSqlitePool, DieselError};
use super::{parse_datetime, parse_datetime_opt};
use crate::models::OutboxEvent;
use crate::schema::message_outbox;

/// Insert an outbox row on an existing connection.
///
/// Exposed so repositories can append events inside the same transaction
/// as the domain change they announce.
pub async fn insert_row(
    conn: &mut AsyncSqliteConnection,
    exchange: &str,
    routing_key: &str,
    payload: &serde_json::Value,
) -> Result<(), DieselError> {
    let now = Utc::now().to_rfc3339();
    let payload = payload.to_string();
    diesel::insert_into(message_outbox::table)
        .values(NewOutboxRow {
            exchange,
            routing_key,
            payload: &payload,
            created_at: &now,
            sent_at: None,
            error: None,
        })
        .execute(conn)
        .await?;
    Ok(())
}

/// Repository over the message_outbox table.
#[derive(Clone)]
pub struct OutboxRepository {
    pool: AsyncSqlitePool,
}

impl OutboxRepository {
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    /// Append a standalone event (own transaction).
    pub async fn append(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &serde_json::Value,
    ) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        insert_row(&mut conn, exchange, routing_key, payload).await
    }

    /// All undelivered rows in creation order.
    pub async fn fetch_unsent(&self) -> Result<Vec<OutboxEvent>, DieselError> {
        let mut conn = self.pool.get().await?;

        let records: Vec<OutboxRecord> = message_outbox::table
            .filter(message_outbox::sent_at.is_null())
            .order(message_outbox::id.asc())
            .load(&mut conn)
            .await?;

        Ok(records.into_iter().map(record_to_event).collect())
    }

    /// Mark a row delivered and clear any previous error.
    pub async fn mark_sent(&self, id: i32) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        let now = Utc::now().to_rfc3339();

        diesel::update(message_outbox::table.find(id))
            .set((
                message_outbox::sent_at.eq(Some(now)),
                message_outbox::error.eq(None::<String>),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    /// Record a delivery failure; the row stays unsent and is retried on
    /// the next polling pass.
    pub async fn mark_error(&self, id: i32, error: &str) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;

        diesel::update(message_outbox::table.find(id))
            .set(message_outbox::error.eq(Some(error)))
            .execute(&mut conn)
            .await?;
        Ok(())
    }
}

fn record_to_event(record: OutboxRecord) -> OutboxEvent {
    let payload = serde_json::from_str(&record.payload)
        .unwrap_or_else(|_| serde_json::Value::String(record.payload.clone()));
    OutboxEvent {
        id: record.id,
        exchange: record.exchange,
        routing_key: record.routing_key,
        payload,
        created_at: parse_datetime(&record.created_at),
        sent_at: parse_datetime_opt(record.sent_at),
        error: record.error,
    }
}
