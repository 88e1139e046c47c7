//! Companies House registry integration
//!
//! This module provides:
//! - company number normalization ahead of lookup
//! - API types for the company profile endpoint
//! - a paced HTTP client behind the [`RegistryClient`] trait
//! - interpretation of lookups into record-ready codes and status

pub mod client;
pub mod interpret;
pub mod normalize;
pub mod rate_limit;
pub mod types;

pub use client::{basic_auth_header, CompaniesHouseClient, RegistryClient};
pub use interpret::{interpret, Interpretation};
pub use normalize::normalize_company_number;
pub use rate_limit::RequestPacer;
pub use types::{CompanyProfile, CompanyStatus, LookupResult};
