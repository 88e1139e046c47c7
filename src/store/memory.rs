//! In-memory record store backed by an optional JSON snapshot
//!
//! Implements both [`RecordStore`] and [`CodeDescriptionStore`]. The
//! classification vocabulary doubles as the code-description table, so a code
//! is only accepted on a record if the table knows it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{
    Candidate, CandidateFilter, CodeDescriptionStore, FieldValue, KeywordQuery, MutableRecord,
    RecordField, RecordId, RecordStore,
};
use crate::error::StoreError;

/// One row of the classification code table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationCode {
    pub code: String,
    pub description: String,
}

/// Persisted shape of a business record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: RecordId,
    #[serde(default)]
    pub registry_id: String,
    #[serde(default)]
    pub inactive: bool,
    #[serde(default)]
    pub classification: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_status: Option<String>,
    #[serde(default)]
    pub balance: Decimal,
    #[serde(default)]
    pub overdue_balance: Decimal,
    #[serde(default)]
    pub unbilled_orders: Decimal,
    pub last_modified: DateTime<Utc>,
}

impl StoredRecord {
    pub fn new(id: impl Into<RecordId>, registry_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            registry_id: registry_id.into(),
            inactive: false,
            classification: Vec::new(),
            classification_description: None,
            company_status: None,
            balance: Decimal::ZERO,
            overdue_balance: Decimal::ZERO,
            unbilled_orders: Decimal::ZERO,
            last_modified: Utc::now(),
        }
    }

    fn to_candidate(&self) -> Candidate {
        Candidate {
            record_id: self.id.clone(),
            registry_id: self.registry_id.clone(),
            current_codes: self.classification.clone(),
            last_modified: self.last_modified,
        }
    }
}

/// JSON document the CLI reads and writes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub records: Vec<StoredRecord>,
    #[serde(default)]
    pub classification_codes: Vec<ClassificationCode>,
}

#[derive(Debug, Default)]
struct StoreState {
    records: BTreeMap<RecordId, StoredRecord>,
    codes: Vec<ClassificationCode>,
}

#[derive(Debug, Default)]
struct StoreInner {
    state: Mutex<StoreState>,
    loads: AtomicUsize,
    saves: AtomicUsize,
}

/// Shared in-memory store. Cloning shares the underlying state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<StoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let store = Self::new();
        {
            let mut state = store.lock();
            state.codes = snapshot.classification_codes;
            for record in snapshot.records {
                state.records.insert(record.id.clone(), record);
            }
        }
        store
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        let state = self.lock();
        StoreSnapshot {
            records: state.records.values().cloned().collect(),
            classification_codes: state.codes.clone(),
        }
    }

    /// Read a snapshot file into a new store
    pub fn load_json(path: &Path) -> Result<Self, StoreError> {
        let text = std::fs::read_to_string(path)?;
        let snapshot: StoreSnapshot = serde_json::from_str(&text)?;
        Ok(Self::from_snapshot(snapshot))
    }

    /// Atomically replace `path` with the current snapshot
    pub fn write_json(&self, path: &Path) -> Result<(), StoreError> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, &self.snapshot())?;
        tmp.write_all(b"\n")?;
        tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }

    pub fn insert(&self, record: StoredRecord) {
        self.lock().records.insert(record.id.clone(), record);
    }

    pub fn add_code(&self, code: impl Into<String>, description: impl Into<String>) {
        self.lock().codes.push(ClassificationCode {
            code: code.into(),
            description: description.into(),
        });
    }

    pub fn get(&self, id: &RecordId) -> Option<StoredRecord> {
        self.lock().records.get(id).cloned()
    }

    /// Number of records handed out for mutation
    pub fn loads(&self) -> usize {
        self.inner.loads.load(Ordering::SeqCst)
    }

    /// Number of records written back
    pub fn saves(&self) -> usize {
        self.inner.saves.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        // A poisoned lock only means another task panicked mid-write of a
        // plain data map; the data is still usable.
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_known_code(&self, code: &str) -> bool {
        self.lock().codes.iter().any(|c| c.code == code)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn query(&self, filter: &CandidateFilter) -> Result<Vec<Candidate>, StoreError> {
        let state = self.lock();
        let mut rows: Vec<Candidate> = state
            .records
            .values()
            .filter(|r| !filter.active_only || !r.inactive)
            .filter(|r| !filter.require_registry_id || !r.registry_id.trim().is_empty())
            .map(StoredRecord::to_candidate)
            .collect();

        rows.sort_by(|a, b| {
            b.last_modified
                .cmp(&a.last_modified)
                .then_with(|| a.record_id.cmp(&b.record_id))
        });
        if let Some(limit) = filter.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn load(&self, id: &RecordId) -> Result<Box<dyn MutableRecord>, StoreError> {
        let data = self
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        self.inner.loads.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryRecord {
            data,
            store: self.clone(),
        }))
    }
}

#[async_trait]
impl CodeDescriptionStore for MemoryStore {
    async fn search_by_keywords(&self, query: &KeywordQuery) -> Result<Vec<String>, StoreError> {
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let state = self.lock();
        Ok(state
            .codes
            .iter()
            .filter(|c| query.terms().iter().any(|t| t == &c.code))
            .map(|c| c.description.clone())
            .collect())
    }
}

/// Detached copy of a stored record; written back on save
struct MemoryRecord {
    data: StoredRecord,
    store: MemoryStore,
}

impl MemoryRecord {
    fn mismatch(field: RecordField, value: &FieldValue) -> StoreError {
        StoreError::InvalidValue {
            field,
            value: value.to_string(),
        }
    }
}

#[async_trait]
impl MutableRecord for MemoryRecord {
    fn id(&self) -> &RecordId {
        &self.data.id
    }

    fn set_field(&mut self, field: RecordField, value: FieldValue) -> Result<(), StoreError> {
        match (field, value) {
            (RecordField::Classification, FieldValue::Codes(codes)) => {
                if let Some(bad) = codes.iter().find(|c| !self.store.is_known_code(c)) {
                    return Err(StoreError::InvalidValue {
                        field,
                        value: bad.clone(),
                    });
                }
                self.data.classification = codes;
            }
            (RecordField::ClassificationDescription, FieldValue::Text(text)) => {
                self.data.classification_description = Some(text);
            }
            (RecordField::CompanyStatus, FieldValue::Text(text)) => {
                self.data.company_status = Some(text);
            }
            (RecordField::Inactive, FieldValue::Flag(flag)) => {
                self.data.inactive = flag;
            }
            (RecordField::Balance, FieldValue::Amount(v)) => self.data.balance = v,
            (RecordField::OverdueBalance, FieldValue::Amount(v)) => self.data.overdue_balance = v,
            (RecordField::UnbilledOrders, FieldValue::Amount(v)) => self.data.unbilled_orders = v,
            (field, value) => return Err(Self::mismatch(field, &value)),
        }
        Ok(())
    }

    fn clear_field(&mut self, field: RecordField) {
        match field {
            RecordField::Classification => self.data.classification.clear(),
            RecordField::ClassificationDescription => self.data.classification_description = None,
            RecordField::CompanyStatus => self.data.company_status = None,
            RecordField::Inactive => self.data.inactive = false,
            RecordField::Balance => self.data.balance = Decimal::ZERO,
            RecordField::OverdueBalance => self.data.overdue_balance = Decimal::ZERO,
            RecordField::UnbilledOrders => self.data.unbilled_orders = Decimal::ZERO,
        }
    }

    fn field(&self, field: RecordField) -> Option<FieldValue> {
        match field {
            RecordField::Classification if self.data.classification.is_empty() => None,
            RecordField::Classification => {
                Some(FieldValue::Codes(self.data.classification.clone()))
            }
            RecordField::ClassificationDescription => self
                .data
                .classification_description
                .clone()
                .map(FieldValue::Text),
            RecordField::CompanyStatus => self.data.company_status.clone().map(FieldValue::Text),
            RecordField::Inactive => Some(FieldValue::Flag(self.data.inactive)),
            RecordField::Balance => Some(FieldValue::Amount(self.data.balance)),
            RecordField::OverdueBalance => Some(FieldValue::Amount(self.data.overdue_balance)),
            RecordField::UnbilledOrders => Some(FieldValue::Amount(self.data.unbilled_orders)),
        }
    }

    fn amount(&self, field: RecordField) -> Result<Decimal, StoreError> {
        match self.field(field) {
            Some(FieldValue::Amount(v)) => Ok(v),
            _ => Err(StoreError::NotAnAmount {
                id: self.data.id.clone(),
                field,
            }),
        }
    }

    async fn save(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryRecord { mut data, store } = *self;
        data.last_modified = Utc::now();
        {
            let mut state = store.lock();
            if !state.records.contains_key(&data.id) {
                return Err(StoreError::Save {
                    id: data.id.clone(),
                    message: "record no longer exists".to_string(),
                });
            }
            state.records.insert(data.id.clone(), data);
        }
        store.inner.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn store_with_codes() -> MemoryStore {
        let store = MemoryStore::new();
        store.add_code("620", "Information technology service activities");
        store.add_code("4791", "Retail sale via mail order houses or via Internet");
        store.add_code("7010", "Activities of head offices");
        store
    }

    fn record_at(id: &str, registry_id: &str, day: u32) -> StoredRecord {
        let mut r = StoredRecord::new(id, registry_id);
        r.last_modified = Utc.with_ymd_and_hms(2024, 3, day, 9, 0, 0).unwrap();
        r
    }

    #[tokio::test]
    async fn test_query_filters_and_orders_newest_first() {
        let store = store_with_codes();
        store.insert(record_at("a", "01234567", 1));
        store.insert(record_at("b", "07654321", 3));
        store.insert(record_at("c", "   ", 5));
        let mut inactive = record_at("d", "00000001", 4);
        inactive.inactive = true;
        store.insert(inactive);

        let rows = store.query(&CandidateFilter::default()).await.unwrap();
        let ids: Vec<_> = rows.iter().map(|c| c.record_id.0.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);

        let filter = CandidateFilter {
            limit: Some(1),
            ..CandidateFilter::default()
        };
        assert_eq!(store.query(&filter).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_set_classification_rejects_unknown_code() {
        let store = store_with_codes();
        store.insert(record_at("a", "01234567", 1));

        let mut record = store.load(&RecordId::from("a")).await.unwrap();
        let err = record
            .set_field(
                RecordField::Classification,
                FieldValue::Codes(vec!["620".to_string(), "9999".to_string()]),
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidValue { ref value, .. } if value == "9999"));
        assert!(record.field(RecordField::Classification).is_none());
    }

    #[tokio::test]
    async fn test_writes_are_staged_until_save() {
        let store = store_with_codes();
        store.insert(record_at("a", "01234567", 1));
        let id = RecordId::from("a");

        let mut record = store.load(&id).await.unwrap();
        record
            .set_field(RecordField::CompanyStatus, FieldValue::Text("dissolved".into()))
            .unwrap();
        assert_eq!(store.get(&id).unwrap().company_status, None);

        record.save().await.unwrap();
        assert_eq!(
            store.get(&id).unwrap().company_status.as_deref(),
            Some("dissolved")
        );
        assert_eq!(store.loads(), 1);
        assert_eq!(store.saves(), 1);
    }

    #[tokio::test]
    async fn test_field_type_mismatch_is_rejected() {
        let store = store_with_codes();
        store.insert(record_at("a", "01234567", 1));
        let mut record = store.load(&RecordId::from("a")).await.unwrap();
        assert!(record
            .set_field(RecordField::Inactive, FieldValue::Text("yes".into()))
            .is_err());
        assert!(record.amount(RecordField::CompanyStatus).is_err());
        assert_eq!(record.amount(RecordField::Balance).unwrap(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_search_by_keywords_returns_table_order() {
        let store = store_with_codes();
        let found = store
            .search_by_keywords(&KeywordQuery::any_of(["7010", "620"]))
            .await
            .unwrap();
        assert_eq!(
            found,
            vec![
                "Information technology service activities".to_string(),
                "Activities of head offices".to_string(),
            ]
        );
    }

    #[test]
    fn test_snapshot_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");

        let store = store_with_codes();
        let mut record = record_at("a", "01234567", 1);
        record.balance = Decimal::new(1250, 2);
        store.insert(record);
        store.write_json(&path).unwrap();

        let reloaded = MemoryStore::load_json(&path).unwrap();
        assert_eq!(reloaded.snapshot(), store.snapshot());
    }
}
