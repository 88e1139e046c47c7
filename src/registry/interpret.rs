//! Interpretation of registry lookups into record values
//!
//! The registry emits classification codes zero-padded (`"0620"`) while
//! records store them without the leading zero (`"620"`), so exactly one
//! leading zero is stripped.

use super::types::LookupResult;

/// Codes and status extracted from one lookup
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Interpretation {
    pub codes: Vec<String>,
    pub status: String,
}

impl Interpretation {
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty() && self.status.is_empty()
    }
}

/// Strip one leading `'0'`, keep order and duplicates
pub fn interpret(result: &LookupResult) -> Interpretation {
    Interpretation {
        codes: result.domain_codes.iter().map(|c| strip_code(c)).collect(),
        status: result.company_status.clone(),
    }
}

fn strip_code(code: &str) -> String {
    code.strip_prefix('0').unwrap_or(code).to_string()
}
