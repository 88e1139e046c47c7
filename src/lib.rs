//! Registry enrichment for business records
//!
//! Fills classification (SIC) codes and company status on business records
//! from Companies House, and closes records for companies the registry no
//! longer reports as active when they carry no financial exposure.
//!
//! ## Flow
//! CandidateSelector -> normalize -> RegistryClient -> interpret ->
//! RecordMutator -> save, once per candidate, with failures contained per
//! candidate.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use registry_enrich::{
//!     CandidateSelector, CompaniesHouseClient, EnrichmentPipeline, MemoryStore,
//! };
//!
//! # async fn example() -> anyhow::Result<()> {
//! let store = MemoryStore::load_json("records.json".as_ref())?;
//! let client = Arc::new(CompaniesHouseClient::from_env()?);
//! let pipeline = EnrichmentPipeline::new(client, Arc::new(store.clone()), Arc::new(store.clone()));
//! let report = pipeline
//!     .run_selected(&CandidateSelector::new(Arc::new(store.clone())))
//!     .await;
//! report.log();
//! store.write_json("records.json".as_ref())?;
//! # Ok(())
//! # }
//! ```

// Core error handling
pub mod error;

pub mod config;

// Registry lookups
pub mod registry;

// Record store contracts and the in-memory store
pub mod store;

// Selection, mutation and orchestration
pub mod enrichment;

pub use config::{ApiKeySource, EnrichConfig, EnvApiKey, RegistryConfig, StaticApiKey};
pub use enrichment::{
    AggregateReport, CandidateSelector, EnrichmentPipeline, ItemAction, RunSummary, UpdateOutcome,
};
pub use error::{ErrorKind, ItemError, SelectionFailure, StoreError, TransportError};
pub use registry::{CompaniesHouseClient, LookupResult, RegistryClient};
pub use store::{Candidate, MemoryStore, RecordId, RecordStore};
