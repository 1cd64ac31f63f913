//! Pipeline configuration, loadable from TOML.
//!
//! ```toml
//! ticker = "SPY"
//! wait_secs = 2.5
//! discount_type = "direct"
//! strategy = "auto"
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_WAIT_SECS: f64 = 5.0;
pub const DEFAULT_FAULT_BACKOFF_SECS: f64 = 5.0;
pub const DEFAULT_QUOTE_PAGE_BASE: &str = "https://finance.yahoo.com/quote";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("ticker must not be empty")]
    EmptyTicker,

    #[error("{field} must be a non-negative number of seconds within range, got {value}")]
    InvalidDuration { field: &'static str, value: f64 },

    #[error("unknown {kind}: {value:?}")]
    UnknownVariant { kind: &'static str, value: String },
}

/// Which precomputed discount-rate column the adapter projects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
    #[default]
    Smooth,
    Direct,
}

impl FromStr for DiscountType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "smooth" => Ok(DiscountType::Smooth),
            "direct" => Ok(DiscountType::Direct),
            _ => Err(ConfigError::UnknownVariant {
                kind: "discount type",
                value: s.to_string(),
            }),
        }
    }
}

/// How the fetch path acquires the chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcquisitionStrategy {
    /// Structured provider API.
    #[default]
    Api,
    /// Legacy HTML pages.
    Scrape,
    /// API first; scrape when the API produced no rows.
    Auto,
}

impl AcquisitionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            AcquisitionStrategy::Api => "api",
            AcquisitionStrategy::Scrape => "scrape",
            AcquisitionStrategy::Auto => "auto",
        }
    }
}

impl fmt::Display for AcquisitionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AcquisitionStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "api" => Ok(AcquisitionStrategy::Api),
            "scrape" => Ok(AcquisitionStrategy::Scrape),
            "auto" => Ok(AcquisitionStrategy::Auto),
            _ => Err(ConfigError::UnknownVariant {
                kind: "acquisition strategy",
                value: s.to_string(),
            }),
        }
    }
}

fn default_wait_secs() -> f64 {
    DEFAULT_WAIT_SECS
}

fn default_fault_backoff_secs() -> f64 {
    DEFAULT_FAULT_BACKOFF_SECS
}

fn default_quote_page_base() -> String {
    DEFAULT_QUOTE_PAGE_BASE.to_string()
}

/// Run parameters. Only `ticker` is required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub ticker: String,

    /// Pause after each successful legacy page fetch.
    #[serde(default = "default_wait_secs")]
    pub wait_secs: f64,

    /// Pause after a legacy page fetch fault.
    #[serde(default = "default_fault_backoff_secs")]
    pub fault_backoff_secs: f64,

    #[serde(default)]
    pub discount_type: DiscountType,

    #[serde(default)]
    pub strategy: AcquisitionStrategy,

    /// Reference date for the trading calendar. Local date when absent.
    #[serde(default)]
    pub as_of: Option<NaiveDate>,

    #[serde(default = "default_quote_page_base")]
    pub quote_page_base: String,
}

impl PipelineConfig {
    pub fn new(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            wait_secs: DEFAULT_WAIT_SECS,
            fault_backoff_secs: DEFAULT_FAULT_BACKOFF_SECS,
            discount_type: DiscountType::default(),
            strategy: AcquisitionStrategy::default(),
            as_of: None,
            quote_page_base: default_quote_page_base(),
        }
    }

    /// Load a configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate a configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ticker.trim().is_empty() {
            return Err(ConfigError::EmptyTicker);
        }
        for (field, value) in [
            ("wait_secs", self.wait_secs),
            ("fault_backoff_secs", self.fault_backoff_secs),
        ] {
            if Duration::try_from_secs_f64(value).is_err() {
                return Err(ConfigError::InvalidDuration { field, value });
            }
        }
        Ok(())
    }

    /// Pause after a successful page fetch.
    pub fn wait(&self) -> Duration {
        Duration::try_from_secs_f64(self.wait_secs).unwrap_or(Duration::ZERO)
    }

    /// Pause after a failed page fetch.
    pub fn fault_backoff(&self) -> Duration {
        Duration::try_from_secs_f64(self.fault_backoff_secs).unwrap_or(Duration::ZERO)
    }

    /// Ticker as used in URLs and provider calls.
    pub fn symbol(&self) -> String {
        self.ticker.trim().to_ascii_uppercase()
    }

    /// Reference "today" for the calendar.
    pub fn reference_date(&self) -> NaiveDate {
        self.as_of
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }
}
