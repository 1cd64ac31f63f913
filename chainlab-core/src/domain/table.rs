//! OptionTable: the canonical, append-only chain table.

use super::option::OptionRow;
use crate::data::schema::columns;
use chrono::NaiveDate;
use polars::prelude::*;

/// Timestamp layout used for the `Last Trade Date` column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Ordered rows from every accumulated expiry. Duplicates are kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionTable {
    rows: Vec<OptionRow>,
}

impl OptionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, row: OptionRow) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, OptionRow> {
        self.rows.iter()
    }

    pub fn rows(&self) -> &[OptionRow] {
        &self.rows
    }

    /// Distinct expiries present in the table, ascending.
    pub fn expiries(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self.rows.iter().map(|r| r.expiry).collect();
        dates.sort_unstable();
        dates.dedup();
        dates
    }

    /// Convert to a polars frame with the canonical column names and order.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).expect("epoch is a valid date");
        let rows = &self.rows;

        let symbols: Vec<Option<String>> = rows.iter().map(|r| r.contract_symbol.clone()).collect();
        let last_prices: Vec<Option<f64>> = rows.iter().map(|r| r.last_price).collect();
        let bids: Vec<Option<f64>> = rows.iter().map(|r| r.bid).collect();
        let asks: Vec<Option<f64>> = rows.iter().map(|r| r.ask).collect();
        let traded: Vec<Option<String>> = rows
            .iter()
            .map(|r| r.last_trade_date.map(|t| t.format(TIMESTAMP_FORMAT).to_string()))
            .collect();
        let expiries: Vec<i32> = rows
            .iter()
            .map(|r| (r.expiry - epoch).num_days() as i32)
            .collect();
        let strikes: Vec<f64> = rows.iter().map(|r| r.strike).collect();
        let types: Vec<&str> = rows.iter().map(|r| r.option_type.as_str()).collect();
        let open_interest: Vec<u64> = rows.iter().map(|r| r.open_interest).collect();
        let volumes: Vec<u64> = rows.iter().map(|r| r.volume).collect();
        let ivs: Vec<Option<f64>> = rows.iter().map(|r| r.implied_volatility).collect();
        let discounts: Vec<Option<f64>> = rows.iter().map(|r| r.discount_rate).collect();

        DataFrame::new(vec![
            Column::new(columns::CONTRACT_SYMBOL.into(), symbols),
            Column::new(columns::LAST_PRICE.into(), last_prices),
            Column::new(columns::BID.into(), bids),
            Column::new(columns::ASK.into(), asks),
            Column::new(columns::LAST_TRADE_DATE.into(), traded),
            Column::new(columns::EXPIRY.into(), expiries).cast(&DataType::Date)?,
            Column::new(columns::STRIKE.into(), strikes),
            Column::new(columns::OPTION_TYPE.into(), types),
            Column::new(columns::OPEN_INTEREST.into(), open_interest),
            Column::new(columns::VOLUME.into(), volumes),
            Column::new(columns::IMPLIED_VOLATILITY.into(), ivs),
            Column::new(columns::DISCOUNT_RATE.into(), discounts),
        ])
    }
}

impl FromIterator<OptionRow> for OptionTable {
    fn from_iter<I: IntoIterator<Item = OptionRow>>(iter: I) -> Self {
        Self {
            rows: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a OptionTable {
    type Item = &'a OptionRow;
    type IntoIter = std::slice::Iter<'a, OptionRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
