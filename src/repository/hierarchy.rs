//! Classification hierarchy repository.
//!
//! The doc_hierarchy table is administered externally; the pipeline only
//! reads it to build the classifier prompt.

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::models::NewHierarchyTriple;
use super::pool::{AsyncSqlitePool, DieselError};
use crate::schema::doc_hierarchy;

/// Repository over the doc_hierarchy table.
#[derive(Clone)]
pub struct HierarchyRepository {
    pool: AsyncSqlitePool,
}

impl HierarchyRepository {
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    /// All known {department, category, subcategory} triples, sorted.
    pub async fn list_triples(&self) -> Result<Vec<(String, String, String)>, DieselError> {
        let mut conn = self.pool.get().await?;

        let triples: Vec<(String, String, String)> = doc_hierarchy::table
            .select((
                doc_hierarchy::department,
                doc_hierarchy::category,
                doc_hierarchy::subcategory,
            ))
            .order((
                doc_hierarchy::department.asc(),
                doc_hierarchy::category.asc(),
                doc_hierarchy::subcategory.asc(),
            ))
            .load(&mut conn)
            .await?;

        Ok(triples)
    }

    /// Insert a triple, ignoring duplicates (used by seeding and tests).
    pub async fn insert(
        &self,
        department: &str,
        category: &str,
        subcategory: &str,
    ) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        let now = Utc::now().to_rfc3339();

        diesel::insert_or_ignore_into(doc_hierarchy::table)
            .values(NewHierarchyTriple {
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
