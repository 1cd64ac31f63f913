//! Per-run mutable state.
//!
//! One `PipelineContext` is created per invocation. Each stage writes its
//! typed results into named fields; nothing is shared between runs.

use super::config::PipelineConfig;
use super::fragment::ExpiryOutcome;
use super::observer::{PipelineEvent, PipelineObserver};
use super::spot::SpotSource;
use crate::data::dates::{from_epoch_secs, parse_datetime};
use crate::data::normalize::normalize_records;
use crate::data::schema::columns;
use crate::data::{FaultKind, RawRecord, RawTable, RawValue};
use crate::domain::{OptionRow, OptionTable, OptionType};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An expiry for which neither side produced valid rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedExpiry {
    /// Identifier as listed by the source.
    pub expiry: String,
    pub calls: FaultKind,
    pub puts: FaultKind,
}

/// A legacy page URL that could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlFailure {
    pub url: String,
    pub fault: FaultKind,
}

/// Raw call and/or put rows for one expiry. A dropped side is empty.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpiryFragment {
    pub expiry: NaiveDate,
    pub calls: RawTable,
    pub puts: RawTable,
}

/// One raw row tagged with its side and expiry.
#[derive(Debug, Clone, PartialEq)]
pub struct RawChainRow {
    pub option_type: OptionType,
    pub expiry: NaiveDate,
    pub fields: RawRecord,
}

#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub config: PipelineConfig,
    pub spot: Option<f64>,
    pub spot_source: Option<SpotSource>,
    pub expiries: Vec<String>,
    pub fragments: Vec<ExpiryFragment>,
    pub failed_expiries: Vec<FailedExpiry>,
    /// API failures set aside when `auto` falls back to the pages.
    pub api_failed_expiries: Vec<FailedExpiry>,
    pub listing_fault: Option<FaultKind>,
    pub url_map: BTreeMap<NaiveDate, String>,
    pub root_page: Option<String>,
    pub discovery_fault: Option<FaultKind>,
    pub raw_pages: BTreeMap<NaiveDate, String>,
    pub url_failures: BTreeMap<NaiveDate, UrlFailure>,
    pub raw_rows: Vec<RawChainRow>,
    pub dropped_rows: usize,
}

impl PipelineContext {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            spot: None,
            spot_source: None,
            expiries: Vec::new(),
            fragments: Vec::new(),
            failed_expiries: Vec::new(),
            api_failed_expiries: Vec::new(),
            listing_fault: None,
            url_map: BTreeMap::new(),
            root_page: None,
            discovery_fault: None,
            raw_pages: BTreeMap::new(),
            url_failures: BTreeMap::new(),
            raw_rows: Vec::new(),
            dropped_rows: 0,
        }
    }

    /// Rows accumulated so far across fragments.
    pub fn fragment_rows(&self) -> usize {
        self.fragments
            .iter()
            .map(|f| f.calls.len() + f.puts.len())
            .sum()
    }

    /// Start over for a second acquisition pass. The first pass's failures
    /// move to `api_failed_expiries` so `failed_expiries` only describes the
    /// pass that produced the table.
    pub fn reset_for_fallback(&mut self) {
        self.api_failed_expiries = std::mem::take(&mut self.failed_expiries);
        self.fragments.clear();
        self.expiries.clear();
    }

    /// Record one expiry's outcome: append a fragment for any surviving side,
    /// or a single failed-expiry entry when nothing survived.
    pub fn record_outcome(
        &mut self,
        label: &str,
        expiry: NaiveDate,
        outcome: ExpiryOutcome,
        observer: &dyn PipelineObserver,
    ) {
        let (calls, puts) = match outcome {
            ExpiryOutcome::BothSides { calls, puts } => (calls, puts),
            ExpiryOutcome::CallsOnly { calls, puts_fault } => {
                observer.on_event(&PipelineEvent::SideDropped {
                    expiry,
                    side: OptionType::Put,
                    fault: puts_fault,
                });
                (calls, RawTable::new())
            }
            ExpiryOutcome::PutsOnly { puts, calls_fault } => {
                observer.on_event(&PipelineEvent::SideDropped {
                    expiry,
                    side: OptionType::Call,
                    fault: calls_fault,
                });
                (RawTable::new(), puts)
            }
            ExpiryOutcome::Failed {
                calls_fault,
                puts_fault,
            } => {
                self.record_failure(label, calls_fault, puts_fault, observer);
                return;
            }
        };

        observer.on_event(&PipelineEvent::ExpiryFetched {
            expiry,
            calls: calls.len(),
            puts: puts.len(),
        });
        self.fragments.push(ExpiryFragment {
            expiry,
            calls,
            puts,
        });
    }

    pub fn record_failure(
        &mut self,
        label: &str,
        calls: FaultKind,
        puts: FaultKind,
        observer: &dyn PipelineObserver,
    ) {
        observer.on_event(&PipelineEvent::ExpiryFailed {
            expiry: label.to_string(),
            calls,
            puts,
        });
        self.failed_expiries.push(FailedExpiry {
            expiry: label.to_string(),
            calls,
            puts,
        });
    }

    /// Flatten fragments into tagged raw rows (calls before puts within each
    /// expiry) and normalize their field names once.
    pub fn concatenate(&mut self) {
        for fragment in std::mem::take(&mut self.fragments) {
            let ExpiryFragment {
                expiry,
                calls,
                puts,
            } = fragment;
            let tagged = calls
                .into_iter()
                .map(|fields| (OptionType::Call, fields))
                .chain(puts.into_iter().map(|fields| (OptionType::Put, fields)));
            self.raw_rows
                .extend(tagged.map(|(option_type, fields)| RawChainRow {
                    option_type,
                    expiry,
                    fields,
                }));
        }
        normalize_records(self.raw_rows.iter_mut().map(|row| &mut row.fields));
    }

    /// Convert normalized raw rows into the canonical table. Rows without a
    /// numeric strike are dropped and counted.
    pub fn build_table(&mut self) -> OptionTable {
        let mut table = OptionTable::new();
        for raw in self.raw_rows.drain(..) {
            match typed_row(&raw) {
                Some(row) => table.push(row),
                None => {
                    self.dropped_rows += 1;
                    tracing::debug!(
                        expiry = %raw.expiry,
                        side = %raw.option_type,
                        "dropped row without numeric strike"
                    );
                }
            }
        }
        table
    }
}

fn number(fields: &RawRecord, column: &str) -> Option<f64> {
    fields.get(column).and_then(RawValue::as_f64)
}

fn count(fields: &RawRecord, column: &str) -> u64 {
    number(fields, column)
        .filter(|v| *v >= 0.0)
        .map(|v| v.round() as u64)
        .unwrap_or(0)
}

fn timestamp(value: Option<&RawValue>) -> Option<NaiveDateTime> {
    match value? {
        RawValue::Number(secs) => from_epoch_secs(*secs),
        RawValue::Text(text) => parse_datetime(text).ok(),
        RawValue::Missing => None,
    }
}

/// Normalized raw row → typed row. `None` when the strike is not numeric.
fn typed_row(raw: &RawChainRow) -> Option<OptionRow> {
    let fields = &raw.fields;
    let strike = number(fields, columns::STRIKE)?;

    let mut row = OptionRow::new(raw.expiry, strike, raw.option_type);
    row.contract_symbol = fields
        .get(columns::CONTRACT_SYMBOL)
        .and_then(RawValue::as_text)
        .map(str::to_string);
    row.last_price = number(fields, columns::LAST_PRICE);
    row.bid = number(fields, columns::BID);
    row.ask = number(fields, columns::ASK);
    row.last_trade_date = timestamp(fields.get(columns::LAST_TRADE_DATE));
    row.open_interest = count(fields, columns::OPEN_INTEREST);
    row.volume = count(fields, columns::VOLUME);
    row.implied_volatility = number(fields, columns::IMPLIED_VOLATILITY);
    Some(row)
}
