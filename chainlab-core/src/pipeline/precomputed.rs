//! Adapter for externally precomputed chain tables.
//!
//! The input frame carries the canonical columns plus `Spot Price` and two
//! discount-rate variants. The adapter projects it row by row into the
//! canonical table, choosing one variant as `Discount Rate`. Column types are
//! coerced; values are not otherwise checked.

use super::config::DiscountType;
use crate::data::dates::{parse_date, parse_datetime};
use crate::data::normalize::normalize_frame;
use crate::data::schema::{columns, ChainSchema, SchemaError};
use crate::domain::{OptionRow, OptionTable, OptionType};
use chrono::NaiveDate;
use polars::prelude::*;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("precomputed table has no rows")]
    EmptyInput,

    #[error("invalid value in column {column} at row {row}: {reason}")]
    InvalidValue {
        column: &'static str,
        row: usize,
        reason: String,
    },

    #[error("polars error: {0}")]
    Polars(#[from] PolarsError),
}

impl DiscountType {
    /// Source column for this variant.
    pub fn column(&self) -> &'static str {
        match self {
            DiscountType::Smooth => columns::SMOOTH_DISCOUNT_RATE,
            DiscountType::Direct => columns::DIRECT_DISCOUNT_RATE,
        }
    }
}

fn f64_column(df: &DataFrame, name: &str) -> PolarsResult<Float64Chunked> {
    Ok(df.column(name)?.cast(&DataType::Float64)?.f64()?.clone())
}

fn str_column(df: &DataFrame, name: &str) -> PolarsResult<StringChunked> {
    Ok(df.column(name)?.cast(&DataType::String)?.str()?.clone())
}

/// Expiry column as dates, whatever its stored type.
fn expiry_column(df: &DataFrame) -> Result<Vec<Option<NaiveDate>>, AdapterError> {
    let column = df.column(columns::EXPIRY)?;
    match column.dtype() {
        DataType::Date | DataType::Datetime(_, _) => {
            let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).expect("epoch is a valid date");
            let days = column.cast(&DataType::Date)?.cast(&DataType::Int32)?;
            Ok(days
                .i32()?
                .into_iter()
                .map(|d| d.map(|d| epoch + chrono::Duration::days(d as i64)))
                .collect())
        }
        _ => {
            let text = column.cast(&DataType::String)?;
            let text = text.str()?;
            text.into_iter()
                .enumerate()
                .map(|(row, value)| match value {
                    Some(s) => parse_date(s).map(Some).map_err(|e| AdapterError::InvalidValue {
                        column: columns::EXPIRY,
                        row,
                        reason: e.to_string(),
                    }),
                    None => Ok(None),
                })
                .collect()
        }
    }
}

fn required<T>(value: Option<T>, column: &'static str, row: usize) -> Result<T, AdapterError> {
    value.ok_or_else(|| AdapterError::InvalidValue {
        column,
        row,
        reason: "null".into(),
    })
}

fn count(value: Option<f64>) -> u64 {
    value
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v.round() as u64)
        .unwrap_or(0)
}

/// Project a precomputed frame into (spot, canonical table).
pub fn adapt_precomputed(
    input: &DataFrame,
    discount_type: DiscountType,
) -> Result<(f64, OptionTable), AdapterError> {
    let mut df = input.clone();
    normalize_frame(&mut df)?;
    ChainSchema::validate_precomputed(&df)?;
    if df.height() == 0 {
        return Err(AdapterError::EmptyInput);
    }

    let spot = f64_column(&df, columns::SPOT_PRICE)?.get(0);
    let spot = required(spot.filter(|s| s.is_finite()), columns::SPOT_PRICE, 0)?;

    let symbols = str_column(&df, columns::CONTRACT_SYMBOL)?;
    let last_prices = f64_column(&df, columns::LAST_PRICE)?;
    let bids = f64_column(&df, columns::BID)?;
    let asks = f64_column(&df, columns::ASK)?;
    let traded = str_column(&df, columns::LAST_TRADE_DATE)?;
    let expiries = expiry_column(&df)?;
    let strikes = f64_column(&df, columns::STRIKE)?;
    let types = str_column(&df, columns::OPTION_TYPE)?;
    let open_interest = f64_column(&df, columns::OPEN_INTEREST)?;
    let volumes = f64_column(&df, columns::VOLUME)?;
    let ivs = f64_column(&df, columns::IMPLIED_VOLATILITY)?;
    let discounts = f64_column(&df, discount_type.column())?;

    let mut table = OptionTable::new();
    for i in 0..df.height() {
        let expiry = required(expiries[i], columns::EXPIRY, i)?;
        let strike = required(strikes.get(i), columns::STRIKE, i)?;
        let option_type = required(types.get(i), columns::OPTION_TYPE, i)?
            .parse::<OptionType>()
            .map_err(|e| AdapterError::InvalidValue {
                column: columns::OPTION_TYPE,
                row: i,
                reason: e.to_string(),
            })?;

        let mut row = OptionRow::new(expiry, strike, option_type);
        row.contract_symbol = symbols.get(i).map(str::to_string);
        row.last_price = last_prices.get(i);
        row.bid = bids.get(i);
        row.ask = asks.get(i);
        row.last_trade_date = traded.get(i).and_then(|t| parse_datetime(t).ok());
        row.open_interest = count(open_interest.get(i));
        row.volume = count(volumes.get(i));
        row.implied_volatility = ivs.get(i);
        row.discount_rate = discounts.get(i);
        table.push(row);
    }

    tracing::debug!(rows = table.len(), ?discount_type, "projected precomputed table");
    Ok((spot, table))
}
