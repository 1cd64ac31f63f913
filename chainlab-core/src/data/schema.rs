use polars::prelude::*;

/// Canonical column names shared by every acquisition path.
pub mod columns {
    pub const CONTRACT_SYMBOL: &str = "Contract Symbol";
    pub const LAST_PRICE: &str = "Last Price";
    pub const BID: &str = "Bid";
    pub const ASK: &str = "Ask";
    pub const LAST_TRADE_DATE: &str = "Last Trade Date";
    pub const EXPIRY: &str = "Expiry";
    pub const STRIKE: &str = "Strike";
    pub const OPTION_TYPE: &str = "Option Type";
    pub const OPEN_INTEREST: &str = "Open Interest";
    pub const VOLUME: &str = "Volume";
    pub const IMPLIED_VOLATILITY: &str = "Implied Volatility";
    pub const DISCOUNT_RATE: &str = "Discount Rate";

    /// Precomputed input only.
    pub const SPOT_PRICE: &str = "Spot Price";
    pub const SMOOTH_DISCOUNT_RATE: &str = "Smooth Discount Rate";
    pub const DIRECT_DISCOUNT_RATE: &str = "Direct Discount Rate";

    /// The canonical table columns, in output order.
    pub const CANONICAL: [&str; 12] = [
        CONTRACT_SYMBOL,
        LAST_PRICE,
        BID,
        ASK,
        LAST_TRADE_DATE,
        EXPIRY,
        STRIKE,
        OPTION_TYPE,
        OPEN_INTEREST,
        VOLUME,
        IMPLIED_VOLATILITY,
        DISCOUNT_RATE,
    ];
}

/// Expected schema for the canonical chain table.
pub struct ChainSchema;

impl ChainSchema {
    /// Schema of the frame produced by `OptionTable::to_dataframe`.
    pub fn schema() -> Schema {
        use columns::*;
        Schema::from_iter(vec![
            Field::new(CONTRACT_SYMBOL.into(), DataType::String),
            Field::new(LAST_PRICE.into(), DataType::Float64),
            Field::new(BID.into(), DataType::Float64),
            Field::new(ASK.into(), DataType::Float64),
            Field::new(LAST_TRADE_DATE.into(), DataType::String),
            Field::new(EXPIRY.into(), DataType::Date),
            Field::new(STRIKE.into(), DataType::Float64),
            Field::new(OPTION_TYPE.into(), DataType::String),
            Field::new(OPEN_INTEREST.into(), DataType::UInt64),
            Field::new(VOLUME.into(), DataType::UInt64),
            Field::new(IMPLIED_VOLATILITY.into(), DataType::Float64),
            Field::new(DISCOUNT_RATE.into(), DataType::Float64),
        ])
    }

    /// Columns a precomputed input frame must carry. The canonical
    /// `Discount Rate` is replaced by the two precomputed variants plus spot.
    pub fn precomputed_columns() -> Vec<&'static str> {
        use columns::*;
        let mut cols: Vec<&'static str> = CANONICAL
            .iter()
            .copied()
            .filter(|c| *c != DISCOUNT_RATE)
            .collect();
        cols.extend([SPOT_PRICE, SMOOTH_DISCOUNT_RATE, DIRECT_DISCOUNT_RATE]);
        cols
    }

    /// Validate a frame against the canonical schema (names and types).
    pub fn validate(df: &DataFrame) -> Result<(), SchemaError> {
        let expected = Self::schema();
        let actual = df.schema();

        for field in expected.iter_fields() {
            let actual_dtype = actual
                .get(field.name())
                .ok_or_else(|| SchemaError::MissingColumn(field.name().to_string()))?;
            if actual_dtype != field.dtype() {
                return Err(SchemaError::TypeMismatch {
                    column: field.name().to_string(),
                    expected: field.dtype().clone(),
                    actual: actual_dtype.clone(),
                });
            }
        }

        Ok(())
    }

    /// Check a precomputed frame has every column the adapter projects.
    /// Types are coerced by the adapter, so only presence is checked.
    pub fn validate_precomputed(df: &DataFrame) -> Result<(), SchemaError> {
        let actual = df.schema();
        for name in Self::precomputed_columns() {
            if !actual.contains(name) {
                return Err(SchemaError::MissingColumn(name.to_string()));
            }
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Type mismatch in column {column}: expected {expected:?}, got {actual:?}")]
    TypeMismatch {
        column: String,
        expected: DataType,
        actual: DataType,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_has_all_canonical_columns() {
        let schema = ChainSchema::schema();
        for name in columns::CANONICAL {
            assert!(schema.contains(name), "missing {name}");
        }
        assert_eq!(schema.len(), columns::CANONICAL.len());
    }

    #[test]
    fn test_precomputed_columns_swap_discount_rate_for_variants() {
        let cols = ChainSchema::precomputed_columns();
        assert!(!cols.contains(&columns::DISCOUNT_RATE));
        assert!(cols.contains(&columns::SPOT_PRICE));
        assert!(cols.contains(&columns::SMOOTH_DISCOUNT_RATE));
        assert!(cols.contains(&columns::DIRECT_DISCOUNT_RATE));
    }

    #[test]
    fn test_validate_precomputed_rejects_missing_column() {
        let df = df!(
            "Strike" => &[100.0],
            "Spot Price" => &[101.0],
        )
        .unwrap();

        let result = ChainSchema::validate_precomputed(&df);
        assert!(matches!(result, Err(SchemaError::MissingColumn(_))));
    }

    #[test]
    fn test_validate_rejects_wrong_type() {
        let mut df = crate::domain::OptionTable::new().to_dataframe().unwrap();
        df.with_column(Series::new(columns::STRIKE.into(), Vec::<String>::new()))
            .unwrap();

        let result = ChainSchema::validate(&df);
        assert!(matches!(result, Err(SchemaError::TypeMismatch { .. })));
    }
}
