//! Routing rules mapping a classification triple to a destination folder.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A routing rule keyed by {department, category, subcategory}.
///
/// Rules are created administratively or learned lazily by the destination
/// resolution engine the first time a triple has no rule. The triple is not
/// unique in the table; lookups take the most recently updated match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketMapping {
    pub id: i32,
    /// Sanitized folder name used as the key suffix segment.
    pub bucket_name: String,
    pub department: String,
    pub category: String,
    pub subcategory: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
