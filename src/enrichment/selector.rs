//! Candidate selection
//!
//! The registry allows 600 calls per 5 minutes. Rather than throttle inside
//! the run, the selector never hands out more candidates than one window
//! allows, newest changes first.

use std::sync::Arc;

use crate::config::MAX_CANDIDATES;
use crate::error::SelectionFailure;
use crate::store::{Candidate, CandidateFilter, RecordStore};

pub struct CandidateSelector {
    store: Arc<dyn RecordStore>,
    limit: usize,
}

impl CandidateSelector {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            limit: MAX_CANDIDATES,
        }
    }

    /// Lower the batch size; values above the registry ceiling are clamped
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.min(MAX_CANDIDATES);
        self
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Active records with a registry id, most recently modified first
    pub async fn select(&self) -> Result<Vec<Candidate>, SelectionFailure> {
        let filter = CandidateFilter {
            active_only: true,
            require_registry_id: true,
            limit: Some(self.limit),
        };
        let mut candidates = self.store.query(&filter).await.map_err(SelectionFailure)?;

        candidates.retain(|c| !c.registry_id.trim().is_empty());
        candidates.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
        candidates.truncate(self.limit);

        tracing::debug!(
            selected = candidates.len(),
            limit = self.limit,
            "Selected enrichment candidates"
        );
        Ok(candidates)
    }
}
