//! Provider traits, raw ingestion values and structured error types.
//!
//! `ChainProvider` abstracts over the structured options API and
//! `PageTransport` over raw HTML page retrieval, so both can be swapped for
//! scripted implementations in tests.

use crate::domain::QuoteSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// Category of a per-item failure. Recorded on the pipeline context instead
/// of a message string so callers can branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// An expected attribute was absent from the response.
    MissingField,
    /// The side came back with zero rows.
    EmptyRows,
    /// The first row's strike was not a number (placeholder/degenerate data).
    NonNumericStrike,
    /// The request itself failed.
    Network,
    /// The response could not be parsed (missing table, bad JSON, bad date).
    Parse,
}

/// Structured error types for provider and transport operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("HTTP {status} for {url}")]
    Http { status: u16, url: String },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("missing field: {0}")]
    MissingField(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("parquet I/O error: {0}")]
    ParquetError(String),
}

impl DataError {
    /// Fault category recorded when this error isolates a single item.
    pub fn fault(&self) -> FaultKind {
        match self {
            DataError::NetworkUnreachable(_)
            | DataError::RateLimited { .. }
            | DataError::AuthenticationRequired(_)
            | DataError::CircuitBreakerTripped
            | DataError::Http { .. } => FaultKind::Network,
            DataError::ResponseFormatChanged(_) | DataError::ParquetError(_) => FaultKind::Parse,
            DataError::MissingField(_) => FaultKind::MissingField,
            DataError::SymbolNotFound { .. } => FaultKind::EmptyRows,
        }
    }
}

/// One raw cell as delivered by a provider, before any typing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawValue {
    Number(f64),
    Text(String),
    Missing,
}

impl RawValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RawValue::Number(n) if n.is_finite() => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            RawValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.as_f64().is_some()
    }

    /// Convert a JSON value from the provider API.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Number(n) => n.as_f64().map_or(RawValue::Missing, RawValue::Number),
            serde_json::Value::String(s) => RawValue::Text(s.clone()),
            serde_json::Value::Bool(b) => RawValue::Text(b.to_string()),
            serde_json::Value::Null => RawValue::Missing,
            other => RawValue::Text(other.to_string()),
        }
    }

    /// Convert the text of an HTML table cell.
    ///
    /// Thousands separators are dropped, a trailing `%` scales by 1/100, and
    /// the usual placeholders (`-`, `--`, empty) become `Missing`.
    pub fn from_cell(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed == "-" || trimmed == "--" {
            return RawValue::Missing;
        }

        let cleaned = trimmed.replace(',', "");
        if let Some(pct) = cleaned.strip_suffix('%') {
            if let Ok(v) = pct.trim().parse::<f64>() {
                return RawValue::Number(v / 100.0);
            }
        } else if let Ok(v) = cleaned.parse::<f64>() {
            if v.is_finite() {
                return RawValue::Number(v);
            }
        }

        RawValue::Text(trimmed.to_string())
    }
}

/// One raw row: provider field name → value.
pub type RawRecord = BTreeMap<String, RawValue>;

/// All raw rows for one side of one expiry.
pub type RawTable = Vec<RawRecord>;

/// Structured options API (quote, expiry listing, per-expiry call/put rows).
///
/// Implementations perform exactly one attempt per call; retry policy lives
/// in the pipeline, which never retries.
pub trait ChainProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Quote facts for the underlying.
    fn quote(&self, ticker: &str) -> Result<QuoteSnapshot, DataError>;

    /// Expiry identifiers the provider lists for the ticker, in provider order.
    fn expiries(&self, ticker: &str) -> Result<Vec<String>, DataError>;

    /// Raw call rows for one expiry, keyed by provider field names.
    fn calls(&self, ticker: &str, expiry: &str) -> Result<RawTable, DataError>;

    /// Raw put rows for one expiry, keyed by provider field names.
    fn puts(&self, ticker: &str, expiry: &str) -> Result<RawTable, DataError>;
}

/// Raw page retrieval for the HTML scrape path. No retry semantics.
pub trait PageTransport: Send + Sync {
    fn fetch_page(&self, url: &str) -> Result<String, DataError>;

    /// Block between page requests. Scripted transports record instead.
    fn pause(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cell_parsing_handles_separators_and_percent() {
        assert_eq!(RawValue::from_cell("4,500.00"), RawValue::Number(4500.0));
        assert_eq!(RawValue::from_cell(" 25.50% "), RawValue::Number(0.255));
        assert_eq!(RawValue::from_cell("-"), RawValue::Missing);
        assert_eq!(RawValue::from_cell(""), RawValue::Missing);
        assert_eq!(
            RawValue::from_cell("SPY250321C00500000"),
            RawValue::Text("SPY250321C00500000".into())
        );
    }

    #[test]
    fn json_values_map_to_raw_values() {
        assert_eq!(RawValue::from_json(&json!(12.5)), RawValue::Number(12.5));
        assert_eq!(RawValue::from_json(&json!("abc")), RawValue::Text("abc".into()));
        assert_eq!(RawValue::from_json(&json!(null)), RawValue::Missing);
        assert_eq!(RawValue::from_json(&json!(true)), RawValue::Text("true".into()));
    }

    #[test]
    fn non_finite_numbers_are_not_numeric() {
        assert!(!RawValue::Number(f64::NAN).is_numeric());
        assert!(RawValue::Number(1.0).is_numeric());
        assert!(!RawValue::Text("1".into()).is_numeric());
    }

    #[test]
    fn errors_map_to_fault_categories() {
        assert_eq!(DataError::NetworkUnreachable("x".into()).fault(), FaultKind::Network);
        assert_eq!(DataError::CircuitBreakerTripped.fault(), FaultKind::Network);
        assert_eq!(
            DataError::ResponseFormatChanged("x".into()).fault(),
            FaultKind::Parse
        );
        assert_eq!(DataError::MissingField("puts".into()).fault(), FaultKind::MissingField);
        assert_eq!(
            DataError::SymbolNotFound { symbol: "X".into() }.fault(),
            FaultKind::EmptyRows
        );
    }
}
