//! Diesel ORM records for database tables.
//!
//! These records provide compile-time type checking for database
//! operations; conversion to the domain models lives in the individual
//! repositories.

use diesel::prelude::*;

use crate::schema;

/// Document record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::documents)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct DocumentRecord {
    pub id: String,
    pub filename: String,
    pub source_key: String,
    pub extracted_text: Option<String>,
    pub department: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub summary: Option<String>,
    pub action_items: Option<String>,
    pub account_number: String,
    pub policyholder_name: String,
    pub policy_number: String,
    pub claim_number: String,
    pub status: String,
    pub destination_bucket: Option<String>,
    pub destination_key: Option<String>,
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// New document for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::documents)]
pub struct NewDocument<'a> {
    pub id: &'a str,
    pub filename: &'a str,
    pub source_key: &'a str,
    pub extracted_text: Option<&'a str>,
    pub department: Option<&'a str>,
    pub category: Option<&'a str>,
    pub subcategory: Option<&'a str>,
    pub summary: Option<&'a str>,
    pub action_items: Option<&'a str>,
    pub account_number: &'a str,
    pub policyholder_name: &'a str,
    pub policy_number: &'a str,
    pub claim_number: &'a str,
    pub status: &'a str,
    pub destination_bucket: Option<&'a str>,
    pub destination_key: Option<&'a str>,
    pub error_message: Option<&'a str>,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

/// Bucket mapping record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::bucket_mappings)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct BucketMappingRecord {
    pub id: i32,
    pub bucket_name: String,
    pub department: String,
    pub category: String,
    pub subcategory: String,
    pub created_at: String,
    pub updated_at: String,
}

/// New bucket mapping for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::bucket_mappings)]
pub struct NewBucketMapping<'a> {
    pub bucket_name: &'a str,
    pub department: &'a str,
    pub category: &'a str,
    pub subcategory: &'a str,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

/// Outbox record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::message_outbox)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct OutboxRecord {
    pub id: i32,
    pub exchange: String,
    pub routing_key: String,
    pub payload: String,
    pub created_at: String,
    pub sent_at: Option<String>,
    pub error: Option<String>,
}

/// New outbox row for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::message_outbox)]
pub struct NewOutboxRow<'a> {
    pub exchange: &'a str,
    pub routing_key: &'a str,
    pub payload: &'a str,
    pub created_at: &'a str,
    pub sent_at: Option<&'a str>,
    pub error: Option<&'a str>,
}

/// New hierarchy triple for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::doc_hierarchy)]
pub struct NewHierarchyTriple<'a> {
    pub department: &'a str,
    pub category: &'a str,
    pub subcategory: &'a str,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}
