//! Record store collaborator contracts
//!
//! The pipeline never touches persistence directly. It queries candidates,
//! loads one mutable record per candidate, stages field writes in memory and
//! saves once. [`MemoryStore`] is the in-process implementation used by the
//! CLI (backed by a JSON snapshot) and by tests.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::StoreError;

pub use memory::{ClassificationCode, MemoryStore, StoreSnapshot, StoredRecord};

/// Opaque record identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        RecordId(value.to_string())
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        RecordId(value)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fields the pipeline reads or writes on a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordField {
    /// Multi-select of classification (SIC) codes
    Classification,
    /// Free text listing code descriptions, written when several codes are set
    ClassificationDescription,
    CompanyStatus,
    Inactive,
    Balance,
    OverdueBalance,
    UnbilledOrders,
}

impl RecordField {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordField::Classification => "classification",
            RecordField::ClassificationDescription => "classification_description",
            RecordField::CompanyStatus => "company_status",
            RecordField::Inactive => "inactive",
            RecordField::Balance => "balance",
            RecordField::OverdueBalance => "overdue_balance",
            RecordField::UnbilledOrders => "unbilled_orders",
        }
    }
}

impl fmt::Display for RecordField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value staged on a record field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Flag(bool),
    Amount(Decimal),
    Text(String),
    Codes(Vec<String>),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Flag(b) => write!(f, "{b}"),
            FieldValue::Amount(d) => write!(f, "{d}"),
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Codes(codes) => f.write_str(&codes.join(",")),
        }
    }
}

/// A record eligible for one enrichment pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub record_id: RecordId,
    pub registry_id: String,
    pub current_codes: Vec<String>,
    pub last_modified: DateTime<Utc>,
}

/// Filter passed to [`RecordStore::query`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFilter {
    pub active_only: bool,
    pub require_registry_id: bool,
    /// Upper bound on returned rows; stores may return fewer
    pub limit: Option<usize>,
}

impl Default for CandidateFilter {
    fn default() -> Self {
        Self {
            active_only: true,
            require_registry_id: true,
            limit: None,
        }
    }
}

/// OR-joined keyword search over the code-description table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordQuery {
    terms: Vec<String>,
}

impl KeywordQuery {
    pub fn any_of<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            terms: terms
                .into_iter()
                .map(Into::into)
                .filter(|t: &String| !t.trim().is_empty())
                .collect(),
        }
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

impl fmt::Display for KeywordQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.terms.join(" OR "))
    }
}

/// A record loaded for mutation. Writes are staged until [`MutableRecord::save`].
#[async_trait]
pub trait MutableRecord: Send {
    fn id(&self) -> &RecordId;

    /// Stage a value. Classification codes outside the store's vocabulary are
    /// rejected with [`StoreError::InvalidValue`].
    fn set_field(&mut self, field: RecordField, value: FieldValue) -> Result<(), StoreError>;

    fn clear_field(&mut self, field: RecordField);

    fn field(&self, field: RecordField) -> Option<FieldValue>;

    /// Read an amount field; unset reads as zero
    fn amount(&self, field: RecordField) -> Result<Decimal, StoreError>;

    async fn save(self: Box<Self>) -> Result<(), StoreError>;
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn query(&self, filter: &CandidateFilter) -> Result<Vec<Candidate>, StoreError>;

    async fn load(&self, id: &RecordId) -> Result<Box<dyn MutableRecord>, StoreError>;
}

#[async_trait]
pub trait CodeDescriptionStore: Send + Sync {
    /// Descriptions of every entry matching any term, in table order
    async fn search_by_keywords(&self, query: &KeywordQuery) -> Result<Vec<String>, StoreError>;
}
