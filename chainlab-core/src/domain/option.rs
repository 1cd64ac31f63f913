//! OptionRow: one contract in the canonical chain table.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Call or put.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    Call,
    Put,
}

impl OptionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptionType::Call => "call",
            OptionType::Put => "put",
        }
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown option type: {0:?}")]
pub struct ParseOptionTypeError(pub String);

impl FromStr for OptionType {
    type Err = ParseOptionTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "call" | "c" => Ok(OptionType::Call),
            "put" | "p" => Ok(OptionType::Put),
            _ => Err(ParseOptionTypeError(s.to_string())),
        }
    }
}

/// A single option contract in canonical form.
///
/// Every acquisition path (provider API, HTML scrape, precomputed table) ends
/// up producing these. `implied_volatility` is carried through when the source
/// supplies it; `discount_rate` is only set by the precomputed adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionRow {
    pub contract_symbol: Option<String>,
    pub last_price: Option<f64>,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    pub last_trade_date: Option<NaiveDateTime>,
    pub expiry: NaiveDate,
    pub strike: f64,
    pub option_type: OptionType,
    pub open_interest: u64,
    pub volume: u64,
    pub implied_volatility: Option<f64>,
    pub discount_rate: Option<f64>,
}

impl OptionRow {
    /// Minimal row with only the identifying fields populated.
    pub fn new(expiry: NaiveDate, strike: f64, option_type: OptionType) -> Self {
        Self {
            contract_symbol: None,
            last_price: None,
            bid: None,
            ask: None,
            last_trade_date: None,
            expiry,
            strike,
            option_type,
            open_interest: 0,
            volume: 0,
            implied_volatility: None,
            discount_rate: None,
        }
    }

    /// Mid of bid/ask when both sides are quoted.
    pub fn mid(&self) -> Option<f64> {
        match (self.bid, self.ask) {
            (Some(b), Some(a)) => Some((b + a) / 2.0),
            _ => None,
        }
    }

    /// Row invariants: finite strike. Option type and expiry are enforced by the type system.
    pub fn is_valid(&self) -> bool {
        self.strike.is_finite()
    }
}
