//! Record enrichment from registry data
//!
//! This module provides:
//! - candidate selection bounded by the registry rate ceiling
//! - code description lookup for multi-code records
//! - per-record field mutation with all-or-nothing code commits
//! - the pipeline tying lookups and mutations together

pub mod descriptions;
pub mod mutator;
pub mod pipeline;
pub mod selector;

pub use descriptions::CodeDescriptionResolver;
pub use mutator::{CodeApplication, RecordMutator};
pub use pipeline::{AggregateReport, EnrichmentPipeline, ItemAction, RunSummary, UpdateOutcome};
pub use selector::CandidateSelector;
