//! Run configuration loaded from TOML or JSON.
//!
//! ```toml
//! periods = [1, 3, 6, 12]
//! currency = "PLN"
//!
//! [[funds]]
//! name = "UNIQA Akcji"
//! url = "https://www.uniqa.pl/fundusze/akcji"
//!
//! [http]
//! attempts = 3
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use fundsnap_core::{Fund, LinkPattern, Period};

use crate::fetch::HttpConfig;

/// Files tried by [`Config::discover`], in order.
pub const DISCOVERY_ORDER: [&str; 4] = [
    "config.toml",
    "config.json",
    "config.example.toml",
    "config.example.json",
];

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("failed to parse JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported config format '{0}' (expected .toml or .json)")]
    UnsupportedFormat(String),

    #[error("no config file found in {dir} (looked for {looked_for})")]
    NotFound { dir: PathBuf, looked_for: String },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Where the run writes its artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// History journal and latest view.
    pub data_dir: PathBuf,
    /// Text report and validation report.
    pub output_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("output"),
        }
    }
}

/// Complete run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub funds: Vec<Fund>,

    #[serde(default = "default_periods")]
    pub periods: Vec<Period>,

    /// Currency marker stripped from values; also printed after the NAV.
    #[serde(default = "default_currency")]
    pub currency: String,

    #[serde(default)]
    pub links: LinkPattern,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

/// Trailing windows used when the config does not list any.
pub fn default_periods() -> Vec<Period> {
    vec![Period(1), Period(3), Period(6), Period(12)]
}

fn default_currency() -> String {
    "PLN".into()
}

impl Config {
    /// Load from a file, picking the format by extension.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        match ext.as_str() {
            "toml" => Self::from_toml(&content),
            "json" => Self::from_json(&content),
            other => Err(ConfigError::UnsupportedFormat(other.to_string())),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validated()
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(content)?;
        config.validated()
    }

    /// Load the first file of [`DISCOVERY_ORDER`] that exists in `dir`.
    pub fn discover(dir: &Path) -> Result<Self, ConfigError> {
        let path = DISCOVERY_ORDER
            .iter()
            .map(|name| dir.join(name))
            .find(|p| p.is_file())
            .ok_or_else(|| ConfigError::NotFound {
                dir: dir.to_path_buf(),
                looked_for: DISCOVERY_ORDER.join(", "),
            })?;
        debug!(path = %path.display(), "using config file");
        Self::from_file(&path)
    }

    /// Check invariants and normalize: periods are deduplicated keeping the
    /// first occurrence.
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        if self.funds.is_empty() {
            return Err(ConfigError::Invalid("at least one fund is required".into()));
        }

        let mut names = HashSet::new();
        for fund in &self.funds {
            if fund.name.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "fund with URL {} has an empty name",
                    fund.url
                )));
            }
            if !names.insert(fund.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate fund name '{}'",
                    fund.name
                )));
            }
        }

        if self.periods.is_empty() {
            return Err(ConfigError::Invalid("at least one period is required".into()));
        }
        if let Some(p) = self.periods.iter().find(|p| p.months() == 0) {
            return Err(ConfigError::Invalid(format!("period must be positive, got {p}")));
        }
        let mut seen = HashSet::new();
        self.periods.retain(|p| seen.insert(*p));

        if self.http.attempts == 0 {
            return Err(ConfigError::Invalid("http.attempts must be at least 1".into()));
        }
        if !self.http.backoff_base.is_finite() || self.http.backoff_base < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "http.backoff_base must be a non-negative number, got {}",
                self.http.backoff_base
            )));
        }

        Ok(self)
    }
}
