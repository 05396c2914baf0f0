//! Bucket mapping repository.
//!
//! Lookups take the most recently updated row for a triple; creation is a
//! plain insert, so two concurrent resolvers learning the same brand-new
//! triple leave duplicate rows behind and the newer one wins from then on.

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::models::{BucketMappingRecord, NewBucketMapping};
use super::parse_datetime;
use super::pool::{AsyncSqlitePool, DieselError};
use crate::models::BucketMapping;
use crate::schema::bucket_mappings;

/// Repository over the bucket_mappings table.
#[derive(Clone)]
pub struct BucketMappingRepository {
    pool: AsyncSqlitePool,
}

impl BucketMappingRepository {
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    /// The most authoritative mapping for a triple, if any.
    pub async fn find_latest(
        &self,
        department: &str,
        category: &str,
        subcategory: &str,
    ) -> Result<Option<BucketMapping>, DieselError> {
        let mut conn = self.pool.get().await?;

        let record: Option<BucketMappingRecord> = bucket_mappings::table
            .filter(bucket_mappings::department.eq(department))
            .filter(bucket_mappings::category.eq(category))
            .filter(bucket_mappings::subcategory.eq(subcategory))
            .order((
                bucket_mappings::updated_at.desc(),
                bucket_mappings::id.desc(),
            ))
            .first(&mut conn)
            .await
            .optional()?;

        Ok(record.map(record_to_mapping))
    }

    /// Persist a learned rule so future resolutions of the same triple are
    /// deterministic.
    pub async fn create(
        &self,
        department: &str,
        category: &str,
        subcategory: &str,
        bucket_name: &str,
    ) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        let now = Utc::now().to_rfc3339();

        diesel::insert_into(bucket_mappings::table)
            .values(NewBucketMapping {
                bucket_name,
                department,
                category,
                subcategory,
                created_at: &now,
                updated_at: &now,
            })
            .execute(&mut conn)
            .await?;
        Ok(())
    }
}

fn record_to_mapping(record: BucketMappingRecord) -> BucketMapping {
    BucketMapping {
        id: record.id,
        bucket_name: record.bucket_name,
        department: record.department,
        category: record.category,
        subcategory: record.subcategory,
        created_at: parse_datetime(&record.created_at),
        updated_at: parse_datetime(&record.updated_at),
    }
}
