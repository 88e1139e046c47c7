//! Field mutation for one record
//!
//! All writes are staged on the loaded record; the caller saves once per
//! candidate. Classification codes follow an all-or-nothing rule: every code
//! is first tried on its own so each rejection is logged, and the batch is
//! only committed when none was rejected. A rejected batch leaves the
//! classification field unset and the description field untouched. A
//! committed batch of one code clears the description listing.

use rust_decimal::Decimal;
use std::sync::Arc;

use super::descriptions::CodeDescriptionResolver;
use crate::error::StoreError;
use crate::registry::CompanyStatus;
use crate::store::{CodeDescriptionStore, FieldValue, MutableRecord, RecordField};

const DESCRIPTION_SEPARATOR: &str = "; ";

/// Result of applying a batch of classification codes
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CodeApplication {
    pub applied: Vec<String>,
    pub rejected: Vec<String>,
}

pub struct RecordMutator {
    descriptions: CodeDescriptionResolver,
}

impl RecordMutator {
    pub fn new(descriptions: Arc<dyn CodeDescriptionStore>) -> Self {
        Self {
            descriptions: CodeDescriptionResolver::new(descriptions),
        }
    }

    /// Apply `codes` to the classification field, all or nothing.
    ///
    /// Store errors other than a rejected value are returned as-is.
    pub async fn apply_codes(
        &self,
        record: &mut dyn MutableRecord,
        codes: &[String],
    ) -> Result<CodeApplication, StoreError> {
        if codes.is_empty() {
            return Ok(CodeApplication::default());
        }

        let mut rejected = Vec::new();
        for code in codes {
            match record.set_field(RecordField::Classification, FieldValue::Codes(vec![code.clone()])) {
                Ok(()) => {}
                Err(StoreError::InvalidValue { .. }) => {
                    tracing::warn!(
                        record_id = %record.id(),
                        code = %code,
                        "Classification code rejected by store"
                    );
                    rejected.push(code.clone());
                }
                Err(e) => return Err(e),
            }
            record.clear_field(RecordField::Classification);
        }

        if !rejected.is_empty() {
            return Ok(CodeApplication {
                applied: Vec::new(),
                rejected,
            });
        }

        match record.set_field(RecordField::Classification, FieldValue::Codes(codes.to_vec())) {
            Ok(()) => {}
            Err(StoreError::InvalidValue { value, .. }) => {
                tracing::warn!(
                    record_id = %record.id(),
                    value = %value,
                    "Classification batch rejected by store"
                );
                record.clear_field(RecordField::Classification);
                return Ok(CodeApplication {
                    applied: Vec::new(),
                    rejected: vec![value],
                });
            }
            Err(e) => return Err(e),
        }

        let descriptions = if codes.len() > 1 {
            self.descriptions.resolve(codes).await
        } else {
            Vec::new()
        };
        // The free-text listing only ever describes the committed batch
        if descriptions.is_empty() {
            record.clear_field(RecordField::ClassificationDescription);
        } else {
            record.set_field(
                RecordField::ClassificationDescription,
                FieldValue::Text(descriptions.join(DESCRIPTION_SEPARATOR)),
            )?;
        }

        Ok(CodeApplication {
            applied: codes.to_vec(),
            rejected: Vec::new(),
        })
    }

    /// Set the status verbatim; returns whether anything was written
    pub fn apply_status(
        &self,
        record: &mut dyn MutableRecord,
        status: &str,
    ) -> Result<bool, StoreError> {
        if status.is_empty() {
            return Ok(false);
        }
        record.set_field(RecordField::CompanyStatus, FieldValue::Text(status.to_string()))?;
        Ok(true)
    }

    /// Mark the record inactive when the registry reports a non-active
    /// company and the record carries no financial exposure.
    pub fn apply_deactivation_policy(
        &self,
        record: &mut dyn MutableRecord,
        status: &str,
    ) -> Result<bool, StoreError> {
        let Some(status) = CompanyStatus::parse(status) else {
            return Ok(false);
        };
        if status.is_active() {
            return Ok(false);
        }

        let balance = record.amount(RecordField::Balance)?;
        let overdue = record.amount(RecordField::OverdueBalance)?;
        let unbilled = record.amount(RecordField::UnbilledOrders)?;

        if balance != Decimal::ZERO || overdue != Decimal::ZERO || unbilled != Decimal::ZERO {
            tracing::info!(
                record_id = %record.id(),
                status = status.as_str(),
                balance = %balance,
                overdue_balance = %overdue,
                unbilled_orders = %unbilled,
                "Company not active but record has open exposure; leaving active"
            );
            return Ok(false);
        }

        record.set_field(RecordField::Inactive, FieldValue::Flag(true))?;
        tracing::info!(record_id = %record.id(), status = status.as_str(), "Record deactivated");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, RecordId, RecordStore, StoredRecord};

    fn store() -> MemoryStore {
        let store = MemoryStore::new();
        store.add_code("620", "Information technology service activities");
        store.add_code("4791", "Retail sale via mail order houses or via Internet");
        store.add_code("7010", "Activities of head offices");
        store.insert(StoredRecord::new("r1", "01234567"));
        store
    }

    fn codes(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    async fn load(store: &MemoryStore) -> Box<dyn MutableRecord> {
        store.load(&RecordId::from("r1")).await.unwrap()
    }

    #[tokio::test]
    async fn test_apply_codes_commits_clean_batch_with_descriptions() {
        let store = store();
        let mutator = RecordMutator::new(Arc::new(store.clone()));
        let mut record = load(&store).await;

        let result = mutator
            .apply_codes(record.as_mut(), &codes(&["620", "4791"]))
            .await
            .unwrap();

        assert_eq!(result.applied, codes(&["620", "4791"]));
        assert!(result.rejected.is_empty());
        assert_eq!(
            record.field(RecordField::Classification),
            Some(FieldValue::Codes(codes(&["620", "4791"])))
        );
        assert_eq!(
            record.field(RecordField::ClassificationDescription),
            Some(FieldValue::Text(
                "Information technology service activities; Retail sale via mail order houses or via Internet"
                    .to_string()
            ))
        );
    }

    #[tokio::test]
    async fn test_apply_single_code_clears_stale_description() {
        let store = store();
        let mutator = RecordMutator::new(Arc::new(store.clone()));
        let mut record = load(&store).await;
        record
            .set_field(
                RecordField::ClassificationDescription,
                FieldValue::Text("Information technology service activities; Retail sale".into()),
            )
            .unwrap();

        let result = mutator
            .apply_codes(record.as_mut(), &codes(&["7010"]))
            .await
            .unwrap();
        assert_eq!(result.applied, codes(&["7010"]));
        assert!(record.field(RecordField::ClassificationDescription).is_none());
    }

    #[tokio::test]
    async fn test_apply_codes_all_or_nothing() {
        let store = store();
        let mutator = RecordMutator::new(Arc::new(store.clone()));
        let mut record = load(&store).await;

        let result = mutator
            .apply_codes(record.as_mut(), &codes(&["620", "9999", "4791", "8888"]))
            .await
            .unwrap();

        assert!(result.applied.is_empty());
        assert_eq!(result.rejected, codes(&["9999", "8888"]));
        assert!(record.field(RecordField::Classification).is_none());
        assert!(record.field(RecordField::ClassificationDescription).is_none());
    }

    #[tokio::test]
    async fn test_apply_status() {
        let store = store();
        let mutator = RecordMutator::new(Arc::new(store.clone()));
        let mut record = load(&store).await;

        assert!(!mutator.apply_status(record.as_mut(), "").unwrap());
        assert!(record.field(RecordField::CompanyStatus).is_none());
        assert!(mutator.apply_status(record.as_mut(), "liquidation").unwrap());
        assert_eq!(
            record.field(RecordField::CompanyStatus),
            Some(FieldValue::Text("liquidation".to_string()))
        );
    }

    #[tokio::test]
    async fn test_deactivation_requires_zero_exposure() {
        let store = store();
        let mutator = RecordMutator::new(Arc::new(store.clone()));

        for field in [
            RecordField::Balance,
            RecordField::OverdueBalance,
            RecordField::UnbilledOrders,
        ] {
            let mut record = load(&store).await;
            record
                .set_field(field, FieldValue::Amount(Decimal::new(1, 2)))
                .unwrap();
            assert!(!mutator
                .apply_deactivation_policy(record.as_mut(), "dissolved")
                .unwrap());
            assert_eq!(record.field(RecordField::Inactive), Some(FieldValue::Flag(false)));
        }

        let mut record = load(&store).await;
        assert!(mutator
            .apply_deactivation_policy(record.as_mut(), "dissolved")
            .unwrap());
        assert_eq!(record.field(RecordField::Inactive), Some(FieldValue::Flag(true)));
    }

    #[tokio::test]
    async fn test_active_or_empty_status_never_deactivates() {
        let store = store();
        let mutator = RecordMutator::new(Arc::new(store.clone()));
        let mut record = load(&store).await;

        assert!(!mutator.apply_deactivation_policy(record.as_mut(), "active").unwrap());
        assert!(!mutator.apply_deactivation_policy(record.as_mut(), "").unwrap());
        assert_eq!(record.field(RecordField::Inactive), Some(FieldValue::Flag(false)));
    }
}
