//! Column normalizer: provider field names → canonical column names.
//!
//! The mapping is total (unknown names pass through unchanged) and idempotent
//! (canonical names map to themselves), so it can run once over the whole
//! accumulated table no matter which acquisition path produced it.

use super::provider::RawRecord;
use super::schema::columns;
use polars::prelude::*;

/// Provider name → canonical name.
pub const PROVIDER_COLUMNS: [(&str, &str); 8] = [
    ("lastPrice", columns::LAST_PRICE),
    ("bid", columns::BID),
    ("ask", columns::ASK),
    ("lastTradeDate", columns::LAST_TRADE_DATE),
    ("strike", columns::STRIKE),
    ("openInterest", columns::OPEN_INTEREST),
    ("volume", columns::VOLUME),
    ("impliedVolatility", columns::IMPLIED_VOLATILITY),
];

/// Canonical name for a provider field name.
pub fn canonical_name(name: &str) -> &str {
    PROVIDER_COLUMNS
        .iter()
        .find(|(provider, _)| *provider == name)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(name)
}

/// Rename the keys of one raw record in place.
///
/// When both the provider and canonical spelling are present the canonical
/// value wins.
pub fn normalize_record(record: &mut RawRecord) {
    let renames: Vec<String> = record
        .keys()
        .filter(|k| canonical_name(k) != k.as_str())
        .cloned()
        .collect();

    for key in renames {
        if let Some(value) = record.remove(&key) {
            record
                .entry(canonical_name(&key).to_string())
                .or_insert(value);
        }
    }
}

/// Normalize every record of an accumulated raw table.
pub fn normalize_records<'a>(records: impl IntoIterator<Item = &'a mut RawRecord>) {
    for record in records {
        normalize_record(record);
    }
}

/// Rename provider-named columns of a frame. Columns whose canonical name is
/// already present are left alone.
pub fn normalize_frame(df: &mut DataFrame) -> PolarsResult<()> {
    let names: Vec<String> = df
        .get_column_names_owned()
        .into_iter()
        .map(|n| n.to_string())
        .collect();

    for name in &names {
        let target = canonical_name(name);
        if target != name.as_str() && !names.iter().any(|n| n == target) {
            df.rename(name, target.into())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::provider::RawValue;
    use proptest::prelude::*;

    fn record(pairs: &[(&str, f64)]) -> RawRecord {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), RawValue::Number(*v)))
            .collect()
    }

    #[test]
    fn maps_every_provider_field() {
        assert_eq!(canonical_name("lastPrice"), "Last Price");
        assert_eq!(canonical_name("bid"), "Bid");
        assert_eq!(canonical_name("ask"), "Ask");
        assert_eq!(canonical_name("lastTradeDate"), "Last Trade Date");
        assert_eq!(canonical_name("strike"), "Strike");
        assert_eq!(canonical_name("openInterest"), "Open Interest");
        assert_eq!(canonical_name("volume"), "Volume");
        assert_eq!(canonical_name("impliedVolatility"), "Implied Volatility");
    }

    #[test]
    fn unknown_and_canonical_names_pass_through() {
        assert_eq!(canonical_name("percentChange"), "percentChange");
        assert_eq!(canonical_name("Strike"), "Strike");
        assert_eq!(canonical_name("Contract Symbol"), "Contract Symbol");
    }

    #[test]
    fn record_keys_are_renamed() {
        let mut rec = record(&[("strike", 100.0), ("lastPrice", 2.5), ("change", 0.1)]);
        normalize_record(&mut rec);
        assert_eq!(rec.get("Strike"), Some(&RawValue::Number(100.0)));
        assert_eq!(rec.get("Last Price"), Some(&RawValue::Number(2.5)));
        assert_eq!(rec.get("change"), Some(&RawValue::Number(0.1)));
        assert!(!rec.contains_key("strike"));
    }

    #[test]
    fn canonical_value_wins_on_collision() {
        let mut rec = record(&[("strike", 1.0), ("Strike", 2.0)]);
        normalize_record(&mut rec);
        assert_eq!(rec.len(), 1);
        assert_eq!(rec.get("Strike"), Some(&RawValue::Number(2.0)));
    }

    #[test]
    fn frame_columns_are_renamed() {
        let mut df = df!(
            "strike" => &[100.0, 105.0],
            "impliedVolatility" => &[0.2, 0.21],
            "Bid" => &[1.0, 0.8],
        )
        .unwrap();

        normalize_frame(&mut df).unwrap();
        assert!(df.column("Strike").is_ok());
        assert!(df.column("Implied Volatility").is_ok());
        assert!(df.column("Bid").is_ok());
        assert!(df.column("strike").is_err());

        // Second pass is a no-op.
        let before = df.get_column_names_owned();
        normalize_frame(&mut df).unwrap();
        assert_eq!(before, df.get_column_names_owned());
    }

    proptest! {
        #[test]
        fn normalization_is_idempotent(
            keys in prop::collection::vec(
                prop::sample::select(vec![
                    "lastPrice", "bid", "ask", "lastTradeDate", "strike",
                    "openInterest", "volume", "impliedVolatility",
                    "Strike", "Bid", "change", "Contract Symbol",
                ]),
                0..12,
            ),
        ) {
            let mut rec: RawRecord = keys
                .iter()
                .enumerate()
                .map(|(i, k)| (k.to_string(), RawValue::Number(i as f64)))
                .collect();
            normalize_record(&mut rec);
            let once = rec.clone();
            normalize_record(&mut rec);
            prop_assert_eq!(once, rec);
        }

        #[test]
        fn canonical_name_is_a_fixed_point(name in "[A-Za-z ]{0,20}") {
            let first = canonical_name(&name).to_string();
            prop_assert_eq!(canonical_name(&first), first.as_str());
        }
    }
}
