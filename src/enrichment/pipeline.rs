//! Enrichment pipeline
//!
//! Orchestrates normalize -> lookup -> interpret -> mutate -> save for each
//! candidate. Candidates share no mutable state; a failure (or panic) in one
//! is recorded against its record id and the run carries on. Only a failed
//! candidate query aborts a run.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::time::Instant;

use super::mutator::RecordMutator;
use super::selector::CandidateSelector;
use crate::config::{EnrichConfig, DEFAULT_MAX_IN_FLIGHT};
use crate::error::{ErrorKind, ItemError};
use crate::registry::{interpret, normalize_company_number, RegistryClient};
use crate::store::{Candidate, CodeDescriptionStore, RecordId, RecordStore};

// =============================================================================
// Outcome types
// =============================================================================

/// What happened to one candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemAction {
    /// No registry id to look up
    Skipped,
    /// Registry had no codes and no status; record not loaded
    Untouched,
    /// Record loaded, mutated and saved
    Updated,
    /// Would have been updated; nothing loaded or saved
    DryRun,
    Failed,
}

/// Per-candidate result returned to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateOutcome {
    pub record_id: RecordId,
    pub registry_id: String,
    pub action: ItemAction,
    /// Codes and status as interpreted from the registry
    pub registry_codes: Vec<String>,
    pub registry_status: String,
    pub codes_applied: Vec<String>,
    pub codes_rejected: Vec<String>,
    pub status_applied: bool,
    pub deactivated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
}

impl UpdateOutcome {
    fn new(candidate: &Candidate, action: ItemAction) -> Self {
        Self {
            record_id: candidate.record_id.clone(),
            registry_id: candidate.registry_id.clone(),
            action,
            registry_codes: Vec::new(),
            registry_status: String::new(),
            codes_applied: Vec::new(),
            codes_rejected: Vec::new(),
            status_applied: false,
            deactivated: false,
            error: None,
        }
    }

    fn failed(candidate: &Candidate, error: ErrorKind) -> Self {
        Self {
            error: Some(error),
            ..Self::new(candidate, ItemAction::Failed)
        }
    }
}

/// Run-level errors plus every candidate's outcome
#[derive(Debug, Clone, Serialize)]
pub struct AggregateReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_error: Option<ErrorKind>,
    pub item_errors: BTreeMap<RecordId, ErrorKind>,
    pub outcomes: Vec<UpdateOutcome>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl AggregateReport {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            input_error: None,
            item_errors: BTreeMap::new(),
            outcomes: Vec::new(),
            started_at,
            duration_ms: 0,
        }
    }

    pub fn summary(&self) -> RunSummary {
        let count = |action: ItemAction| self.outcomes.iter().filter(|o| o.action == action).count();
        RunSummary {
            candidates: self.outcomes.len(),
            updated: count(ItemAction::Updated),
            untouched: count(ItemAction::Untouched),
            skipped: count(ItemAction::Skipped),
            dry_run: count(ItemAction::DryRun),
            failed: count(ItemAction::Failed),
            codes_rejected: self.outcomes.iter().map(|o| o.codes_rejected.len()).sum(),
            deactivated: self.outcomes.iter().filter(|o| o.deactivated).count(),
            input_failed: self.input_error.is_some(),
            duration_ms: self.duration_ms,
        }
    }

    /// Log the run summary and every run/item error
    pub fn log(&self) {
        if let Some(err) = &self.input_error {
            tracing::error!(error = %err, "Enrichment run aborted: no candidates processed");
        }
        for (record_id, err) in &self.item_errors {
            tracing::warn!(record_id = %record_id, error = %err, "Candidate failed");
        }
        let s = self.summary();
        tracing::info!(
            candidates = s.candidates,
            updated = s.updated,
            untouched = s.untouched,
            skipped = s.skipped,
            dry_run = s.dry_run,
            failed = s.failed,
            codes_rejected = s.codes_rejected,
            deactivated = s.deactivated,
            duration_ms = s.duration_ms,
            "Enrichment run finished"
        );
    }
}

/// Counts derived from an [`AggregateReport`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub candidates: usize,
    pub updated: usize,
    pub untouched: usize,
    pub skipped: usize,
    pub dry_run: usize,
    pub failed: usize,
    pub codes_rejected: usize,
    pub deactivated: usize,
    pub input_failed: bool,
    pub duration_ms: u64,
}

// =============================================================================
// Pipeline
// =============================================================================

pub struct EnrichmentPipeline {
    registry: Arc<dyn RegistryClient>,
    store: Arc<dyn RecordStore>,
    mutator: RecordMutator,
    max_in_flight: usize,
    dry_run: bool,
}

impl EnrichmentPipeline {
    pub fn new(
        registry: Arc<dyn RegistryClient>,
        store: Arc<dyn RecordStore>,
        descriptions: Arc<dyn CodeDescriptionStore>,
    ) -> Self {
        Self {
            registry,
            store,
            mutator: RecordMutator::new(descriptions),
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            dry_run: false,
        }
    }

    pub fn from_config(
        config: &EnrichConfig,
        registry: Arc<dyn RegistryClient>,
        store: Arc<dyn RecordStore>,
        descriptions: Arc<dyn CodeDescriptionStore>,
    ) -> Self {
        Self::new(registry, store, descriptions)
            .with_max_in_flight(config.max_in_flight)
            .with_dry_run(config.dry_run)
    }

    /// Candidates processed concurrently (lookups are still paced by the client)
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Select candidates and run; a selection failure yields an empty run
    /// with `input_error` set
    pub async fn run_selected(&self, selector: &CandidateSelector) -> AggregateReport {
        let started_at = Utc::now();
        let started = Instant::now();
        tracing::info!(limit = selector.limit(), "Selecting enrichment candidates");

        match selector.select().await {
            Ok(candidates) => self.run_from(candidates, started_at, started).await,
            Err(failure) => {
                let mut report = AggregateReport::new(started_at);
                report.input_error = Some(ErrorKind::from(&failure));
                report.duration_ms = started.elapsed().as_millis() as u64;
                report
            }
        }
    }

    /// Process every candidate; outcomes keep candidate order
    pub async fn run(&self, candidates: Vec<Candidate>) -> AggregateReport {
        self.run_from(candidates, Utc::now(), Instant::now()).await
    }

    async fn run_from(
        &self,
        candidates: Vec<Candidate>,
        started_at: DateTime<Utc>,
        started: Instant,
    ) -> AggregateReport {
        let mut report = AggregateReport::new(started_at);
        tracing::info!(
            candidates = candidates.len(),
            max_in_flight = self.max_in_flight,
            dry_run = self.dry_run,
            "Enrichment run started"
        );

        report.outcomes = stream::iter(candidates.iter())
            .map(|candidate| self.process_isolated(candidate))
            .buffered(self.max_in_flight)
            .collect()
            .await;

        for outcome in &report.outcomes {
            if outcome.action == ItemAction::Failed {
                if let Some(err) = &outcome.error {
                    report.item_errors.insert(outcome.record_id.clone(), err.clone());
                }
            }
        }
        report.duration_ms = started.elapsed().as_millis() as u64;
        report
    }

    async fn process_isolated(&self, candidate: &Candidate) -> UpdateOutcome {
        match AssertUnwindSafe(self.process(candidate)).catch_unwind().await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => {
                tracing::warn!(
                    record_id = %candidate.record_id,
                    registry_id = %candidate.registry_id,
                    error = %err,
                    "Candidate processing failed"
                );
                UpdateOutcome::failed(candidate, err.kind())
            }
            Err(panic) => {
                let err = ItemError::Panicked(panic_message(panic.as_ref()));
                tracing::warn!(
                    record_id = %candidate.record_id,
                    error = %err,
                    "Candidate processing panicked"
                );
                UpdateOutcome::failed(candidate, err.kind())
            }
        }
    }

    async fn process(&self, candidate: &Candidate) -> Result<UpdateOutcome, ItemError> {
        let company_number = normalize_company_number(&candidate.registry_id);
        if company_number.trim().is_empty() {
            return Ok(UpdateOutcome::new(candidate, ItemAction::Skipped));
        }

        let lookup = self.registry.lookup(&company_number).await?;
        let found = interpret(&lookup);

        if found.is_empty() {
            tracing::debug!(
                record_id = %candidate.record_id,
                company_number = %company_number,
                status_code = lookup.status_code,
                found = lookup.has_data(),
                "No registry data; leaving record untouched"
            );
            return Ok(UpdateOutcome::new(candidate, ItemAction::Untouched));
        }

        let mut outcome = UpdateOutcome::new(candidate, ItemAction::Updated);
        outcome.registry_codes = found.codes.clone();
        outcome.registry_status = found.status.clone();

        if self.dry_run {
            outcome.action = ItemAction::DryRun;
            return Ok(outcome);
        }

        let mut record = self.store.load(&candidate.record_id).await?;

        if !found.codes.is_empty() {
            let applied = self.mutator.apply_codes(record.as_mut(), &found.codes).await?;
            if !applied.rejected.is_empty() {
                outcome.error = Some(ErrorKind::InvalidCode {
                    codes: applied.rejected.clone(),
                });
            }
            outcome.codes_applied = applied.applied;
            outcome.codes_rejected = applied.rejected;
        }

        if !found.status.is_empty() {
            outcome.status_applied = self.mutator.apply_status(record.as_mut(), &found.status)?;
            outcome.deactivated = self
                .mutator
                .apply_deactivation_policy(record.as_mut(), &found.status)?;
        }

        record.save().await?;

        tracing::info!(
            record_id = %candidate.record_id,
            company_number = %company_number,
            previous_codes = ?candidate.current_codes,
            codes = ?outcome.codes_applied,
            rejected = ?outcome.codes_rejected,
            status = %found.status,
            deactivated = outcome.deactivated,
            "Record enriched"
        );
        Ok(outcome)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
