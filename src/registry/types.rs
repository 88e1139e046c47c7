//! Companies House response types
//!
//! Only the fields the enrichment pipeline consumes are mapped; everything
//! else in the company profile is ignored.
//!
//! Reference: https://developer-specs.company-information.service.gov.uk/

use serde::{Deserialize, Serialize};

// =============================================================================
// Wire types
// =============================================================================

/// `GET /company/{company_number}` response body (subset)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CompanyProfile {
    #[serde(default)]
    pub company_number: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub company_status: Option<String>,
    #[serde(default)]
    pub sic_codes: Option<Vec<String>>,
}

// =============================================================================
// Lookup result
// =============================================================================

/// Outcome of one registry lookup that reached the registry
///
/// A non-200 status carries no data: codes and status are empty.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LookupResult {
    pub status_code: u16,
    pub domain_codes: Vec<String>,
    pub company_status: String,
}

impl LookupResult {
    pub const OK: u16 = 200;

    /// Build from an HTTP status and an already decoded profile
    pub fn from_profile(status_code: u16, profile: CompanyProfile) -> Self {
        if status_code != Self::OK {
            return Self::no_data(status_code);
        }
        Self {
            status_code,
            domain_codes: profile
                .sic_codes
                .unwrap_or_default()
                .into_iter()
                .filter(|c| !c.is_empty())
                .collect(),
            company_status: profile.company_status.unwrap_or_default(),
        }
    }

    pub fn no_data(status_code: u16) -> Self {
        Self {
            status_code,
            ..Self::default()
        }
    }

    pub fn has_data(&self) -> bool {
        self.status_code == Self::OK
    }
}

// =============================================================================
// Company status
// =============================================================================

/// Registry company status
///
/// The registry vocabulary is lowercase (`active`, `dissolved`,
/// `liquidation`, ...). Only `active` matters to the pipeline; comparison is
/// exact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompanyStatus {
    Active,
    Other(String),
}

impl CompanyStatus {
    pub const ACTIVE: &'static str = "active";

    /// `None` for an empty status
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "" => None,
            Self::ACTIVE => Some(Self::Active),
            other => Some(Self::Other(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Active => Self::ACTIVE,
            Self::Other(s) => s,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}
