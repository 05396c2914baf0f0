//! TTL-refreshed cache of the classification hierarchy.
//!
//! The classifier prompt embeds every known {department, category,
//! subcategory} triple. The cache is an explicitly owned collaborator
//! injected into the classifier rather than module-level state.

use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::info;

use crate::repository::{DieselError, HierarchyRepository};

struct CacheState {
    prompt: String,
    refreshed_at: Option<Instant>,
}

/// Cached, periodically refreshed prompt fragment listing the taxonomy.
pub struct HierarchyCache {
    repo: HierarchyRepository,
    ttl: Duration,
    state: Mutex<CacheState>,
}

impl HierarchyCache {
    pub fn new(repo: HierarchyRepository, ttl: Duration) -> Self {
        Self {
            repo,
            ttl,
            state: Mutex::new(CacheState {
                prompt: String::new(),
                refreshed_at: None,
            }),
        }
    }

    /// The hierarchy as prompt lines, refreshing from the database when
    /// the TTL has elapsed.
    pub async fn prompt_lines(&self) -> Result<String, DieselError> {
        let mut state = self.state.lock().await;

        let fresh = state
            .refreshed_at
            .map(|at| at.elapsed() < self.ttl)
            .unwrap_or(false);
        if fresh {
            return Ok(state.prompt.clone());
        }

        let triples = self.repo.list_triples().await?;
        let lines: Vec<String> = triples
            .iter()
            .map(|(dep, cat, sub)| {
                format!("- Department: {dep} | Category: {cat} | Sub-category: {sub}")
            })
            .collect();

        state.prompt = lines.join("\n");
        state.refreshed_at = Some(Instant::now());
        info!(triples = triples.len(), "hierarchy cache refreshed");

        Ok(state.prompt.clone())
    }
}
