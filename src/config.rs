//! Runtime configuration
//!
//! Values come from the environment (optionally seeded from `.env` by the
//! binary). The API key is resolved through an [`ApiKeySource`] so the
//! client never reaches for process-wide state on its own.

use anyhow::{bail, Context, Result};
use std::time::Duration;
use url::Url;

/// Registry rate ceiling: 600 calls per 5 minute window
pub const REGISTRY_CALLS_PER_WINDOW: u32 = 600;
pub const REGISTRY_WINDOW: Duration = Duration::from_secs(300);

/// Hard cap on candidates per run; matches the registry ceiling
pub const MAX_CANDIDATES: usize = REGISTRY_CALLS_PER_WINDOW as usize;

pub const DEFAULT_BASE_URL: &str = "https://api.company-information.service.gov.uk";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_IN_FLIGHT: usize = 4;

const API_KEY_VAR: &str = "COMPANIES_HOUSE_API_KEY";

/// Supplies the registry API key
pub trait ApiKeySource: Send + Sync {
    fn api_key(&self) -> Result<String>;
}

/// Reads the key from an environment variable at resolve time
#[derive(Debug, Clone)]
pub struct EnvApiKey {
    var: String,
}

impl EnvApiKey {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvApiKey {
    fn default() -> Self {
        Self::new(API_KEY_VAR)
    }
}

impl ApiKeySource for EnvApiKey {
    fn api_key(&self) -> Result<String> {
        let key = std::env::var(&self.var)
            .with_context(|| format!("{} environment variable not set", self.var))?;
        if key.trim().is_empty() {
            bail!("{} environment variable is empty", self.var);
        }
        Ok(key)
    }
}

/// Fixed key, e.g. from a secrets manager or tests
#[derive(Clone)]
pub struct StaticApiKey(String);

impl StaticApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }
}

impl std::fmt::Debug for StaticApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticApiKey(<redacted>)")
    }
}

impl ApiKeySource for StaticApiKey {
    fn api_key(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// HTTP-side settings for the registry client
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    /// Spacing between request starts; zero disables pacing
    pub min_request_interval: Duration,
}

impl RegistryConfig {
    /// Interval that keeps any number of callers under the registry ceiling
    pub fn ceiling_interval() -> Duration {
        REGISTRY_WINDOW / REGISTRY_CALLS_PER_WINDOW
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            min_request_interval: Self::ceiling_interval(),
        }
    }
}

/// Pipeline-side settings
#[derive(Debug, Clone)]
pub struct EnrichConfig {
    pub registry: RegistryConfig,
    pub max_candidates: usize,
    pub max_in_flight: usize,
    pub dry_run: bool,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            registry: RegistryConfig::default(),
            max_candidates: MAX_CANDIDATES,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            dry_run: false,
        }
    }
}

impl EnrichConfig {
    /// Build from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(raw) = get("COMPANIES_HOUSE_BASE_URL") {
            Url::parse(raw.trim())
                .with_context(|| format!("Invalid COMPANIES_HOUSE_BASE_URL '{}'", raw))?;
            config.registry.base_url = raw.trim().to_string();
        }
        if let Some(secs) = parse_var::<u64>(&get, "ENRICH_REQUEST_TIMEOUT_SECS")? {
            config.registry.request_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = parse_var::<u64>(&get, "ENRICH_MIN_REQUEST_INTERVAL_MS")? {
            config.registry.min_request_interval = Duration::from_millis(ms);
        }
        if let Some(n) = parse_var::<usize>(&get, "ENRICH_MAX_CANDIDATES")? {
            config.max_candidates = n;
        }
        if let Some(n) = parse_var::<usize>(&get, "ENRICH_MAX_IN_FLIGHT")? {
            config.max_in_flight = n;
        }

        Ok(config.clamped())
    }

    /// Enforce the registry ceiling and a minimum of one worker
    pub fn clamped(mut self) -> Self {
        self.max_candidates = self.max_candidates.min(MAX_CANDIDATES);
        self.max_in_flight = self.max_in_flight.max(1);
        self
    }
}

fn parse_var<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match get(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("Invalid {} '{}': {}", name, raw, e)),
    }
}
