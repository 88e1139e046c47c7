//! Companies House API client
//!
//! Paced HTTP client for the company profile endpoint. A non-200 answer is a
//! valid "no data" lookup; only transport-level faults are errors.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::Client;
use url::Url;

use super::rate_limit::RequestPacer;
use super::types::{CompanyProfile, LookupResult};
use crate::config::{ApiKeySource, EnrichConfig, EnvApiKey, RegistryConfig};
use crate::error::TransportError;

/// One lookup per normalized company number
#[async_trait]
pub trait RegistryClient: Send + Sync {
    async fn lookup(&self, company_number: &str) -> Result<LookupResult, TransportError>;
}

/// Companies House API client
pub struct CompaniesHouseClient {
    http: Client,
    base_url: Url,
    auth_header: String,
    pacer: RequestPacer,
}

impl CompaniesHouseClient {
    /// Create a client from environment configuration
    pub fn from_env() -> Result<Self> {
        let config = EnrichConfig::from_env()?;
        Self::new(&config.registry, &EnvApiKey::default())
    }

    /// Create a new client; the API key is resolved once here
    pub fn new(config: &RegistryConfig, credentials: &dyn ApiKeySource) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .with_context(|| format!("Invalid registry base URL '{}'", config.base_url))?;
        if base_url.cannot_be_a_base() {
            bail!("Registry base URL '{}' cannot carry a path", config.base_url);
        }

        let api_key = credentials
            .api_key()
            .context("Failed to resolve registry API key")?;

        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("Failed to create HTTP client")?;

        let pacer = RequestPacer::new(config.min_request_interval);
        tracing::debug!(
            base_url = %base_url,
            timeout_ms = config.request_timeout.as_millis() as u64,
            request_interval_ms = pacer.interval().as_millis() as u64,
            "Companies House client ready"
        );

        Ok(Self {
            http,
            base_url,
            auth_header: basic_auth_header(&api_key),
            pacer,
        })
    }

    fn company_url(&self, company_number: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("company").push(company_number);
        }
        url
    }
}

#[async_trait]
impl RegistryClient for CompaniesHouseClient {
    async fn lookup(&self, company_number: &str) -> Result<LookupResult, TransportError> {
        self.pacer.wait().await;

        let url = self.company_url(company_number);
        tracing::debug!(company_number = %company_number, url = %url, "Registry lookup");

        let response = self
            .http
            .get(url.clone())
            .header(AUTHORIZATION, &self.auth_header)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(url.as_str(), e))?;

        let status = response.status().as_u16();
        if status != LookupResult::OK {
            tracing::debug!(company_number = %company_number, status, "Registry returned no data");
            return Ok(LookupResult::no_data(status));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::from_reqwest(url.as_str(), e))?;
        let profile: CompanyProfile =
            serde_json::from_slice(&body).map_err(|e| TransportError::MalformedBody {
                company_number: company_number.to_string(),
                message: e.to_string(),
            })?;

        tracing::debug!(
            company_number = %company_number,
            company_name = profile.company_name.as_deref().unwrap_or(""),
            status = profile.company_status.as_deref().unwrap_or(""),
            "Registry profile fetched"
        );
        Ok(LookupResult::from_profile(status, profile))
    }
}

/// `Basic base64(api_key + ":")`; the registry uses the key as the user name
/// with an empty password
pub fn basic_auth_header(api_key: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:", api_key)))
}
