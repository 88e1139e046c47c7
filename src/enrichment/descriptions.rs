//! Classification code descriptions
//!
//! The classification field fills in its own description when a single code
//! is set, but not when several are set at once. For multi-code records the
//! descriptions are looked up locally and written to a free-text field.

use std::sync::Arc;

use crate::store::{CodeDescriptionStore, KeywordQuery};

pub struct CodeDescriptionResolver {
    store: Arc<dyn CodeDescriptionStore>,
}

impl CodeDescriptionResolver {
    pub fn new(store: Arc<dyn CodeDescriptionStore>) -> Self {
        Self { store }
    }

    /// OR-search the code table; failures degrade to an empty list
    pub async fn resolve(&self, codes: &[String]) -> Vec<String> {
        let mut unique: Vec<&str> = Vec::with_capacity(codes.len());
        for code in codes {
            if !unique.contains(&code.as_str()) {
                unique.push(code);
            }
        }

        let query = KeywordQuery::any_of(unique);
        if query.is_empty() {
            return Vec::new();
        }

        match self.store.search_by_keywords(&query).await {
            Ok(descriptions) => descriptions,
            Err(e) => {
                tracing::warn!(query = %query, error = %e, "Code description search failed");
                Vec::new()
            }
        }
    }
}
