//! Configuration handling for the submission pipeline

use crate::error::{FormError, Result};
use crate::state::FormKind;
use crate::validation::{BudgetRange, PhoneRegion};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the endpoint base URL
pub const BASE_URL_ENV: &str = "FORMFLOW_BASE_URL";

const DEFAULT_BASE_URL: &str = "http://localhost:3000/api";

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Base URL every endpoint path is appended to
    pub base_url: String,
    /// Per-kind endpoint path overrides
    pub endpoints: BTreeMap<FormKind, String>,
    /// Endpoint for stand-alone file uploads
    pub upload_endpoint: String,
    /// Automatic retries after the first attempt
    pub retry_attempts: u32,
    /// Backoff base; retry n waits `retry_delay_ms * n`
    pub retry_delay_ms: u64,
    /// Hard upper bound on one network call
    pub request_timeout_ms: u64,
    pub autosave_debounce_ms: u64,
    /// Drafts older than this are not offered for restoration
    pub draft_ttl_hours: u64,
    pub budget_min: f64,
    pub budget_max: f64,
    /// Region used when formatting phone numbers
    pub region: PhoneRegion,
    /// Originating page URL attached to every payload
    pub origin_url: Option<String>,
    pub user_agent: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            endpoints: BTreeMap::new(),
            upload_endpoint: "/upload".to_string(),
            retry_attempts: 3,
            retry_delay_ms: 1000,
            request_timeout_ms: 30_000,
            autosave_debounce_ms: 1000,
            draft_ttl_hours: 24,
            budget_min: 1000.0,
            budget_max: 1_000_000.0,
            region: PhoneRegion::Us,
            origin_url: None,
            user_agent: format!("formflow/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl PipelineConfig {
    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("dev", "formflow", "formflow")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }

    /// Load configuration from file, then apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path)?,
            _ => Self::default(),
        };

        if let Ok(base_url) = std::env::var(BASE_URL_ENV) {
            config.base_url = base_url;
        }

        tracing::debug!(base_url = %config.base_url, "Loaded pipeline configuration");
        Ok(config)
    }

    /// Save configuration to file
    /// Read a config file. Malformed JSON and an inverted budget range are
    /// configuration errors naming the file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| FormError::Config(format!("{}: {e}", path.display())))?;
        if config.budget_min > config.budget_max {
            return Err(FormError::Config(format!(
                "{}: budget_min {} exceeds budget_max {}",
                path.display(),
                config.budget_min,
                config.budget_max
            )));
        }
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        if let Some(path) = Self::config_path() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let content = serde_json::to_string_pretty(self)?;
            fs::write(&path, content)?;
        }
        Ok(())
    }

    /// Endpoint path for a form kind
    pub fn endpoint_for(&self, kind: FormKind) -> &str {
        self.endpoints
            .get(&kind)
            .map(String::as_str)
            .unwrap_or_else(|| kind.default_endpoint())
    }

    /// Full URL for a form kind. An override may be a path or an absolute URL.
    pub fn url_for(&self, kind: FormKind, endpoint_override: Option<&str>) -> String {
        let endpoint = endpoint_override.unwrap_or_else(|| self.endpoint_for(kind));
        self.join(endpoint)
    }

    pub fn upload_url(&self) -> String {
        self.join(&self.upload_endpoint)
    }

    fn join(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return endpoint.to_string();
        }
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    pub fn origin_url(&self) -> &str {
        self.origin_url.as_deref().unwrap_or(&self.base_url)
    }

    pub fn budget_range(&self) -> BudgetRange {
        BudgetRange {
            min: self.budget_min,
            max: self.budget_max,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn autosave_debounce(&self) -> Duration {
        Duration::from_millis(self.autosave_debounce_ms)
    }

    /// Draft lifetime, saturating for values too large to represent
    pub fn draft_ttl(&self) -> chrono::TimeDelta {
        i64::try_from(self.draft_ttl_hours)
            .ok()
            .and_then(chrono::TimeDelta::try_hours)
            .unwrap_or(chrono::TimeDelta::MAX)
    }
}
