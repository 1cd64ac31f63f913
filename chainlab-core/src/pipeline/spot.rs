//! Spot price resolution.
//!
//! An ordered list of fallback attempts over the quote snapshot; the first
//! attempt whose fields are all present wins. Only when every attempt lacks
//! its fields is the run unable to continue.

use crate::domain::QuoteSnapshot;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Mid prices further than this (relative) from the previous close are
/// rejected in favour of the previous close.
pub const MID_DEVIATION_LIMIT: f64 = 0.20;

/// Which fallback step produced the spot price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpotSource {
    CurrentPrice,
    Mid,
    /// Mid was available but deviated too far; previous close used instead.
    MidRejected,
    NavPrice,
    PreviousClose,
    /// Read from a precomputed table.
    Precomputed,
}

/// Quote fields a fallback step may need.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteField {
    CurrentPrice,
    Bid,
    Ask,
    PreviousClose,
    NavPrice,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SpotError {
    #[error("no spot price could be resolved; missing {missing:?}")]
    Exhausted { missing: Vec<QuoteField> },
}

/// A single step in the fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    CurrentPrice,
    Mid,
    NavPrice,
    PreviousClose,
}

const FALLBACK_ORDER: [Attempt; 4] = [
    Attempt::CurrentPrice,
    Attempt::Mid,
    Attempt::NavPrice,
    Attempt::PreviousClose,
];

fn present(value: Option<f64>, field: QuoteField) -> Result<f64, QuoteField> {
    value.filter(|v| v.is_finite()).ok_or(field)
}

impl Attempt {
    /// `Err` names the first field the step needed but did not find.
    fn try_resolve(self, quote: &QuoteSnapshot) -> Result<(f64, SpotSource), QuoteField> {
        match self {
            Attempt::CurrentPrice => present(quote.current_price, QuoteField::CurrentPrice)
                .map(|p| (p, SpotSource::CurrentPrice)),
            Attempt::Mid => {
                let bid = present(quote.bid, QuoteField::Bid)?;
                let ask = present(quote.ask, QuoteField::Ask)?;
                let prev = present(quote.previous_close, QuoteField::PreviousClose)?;
                if prev <= 0.0 {
                    return Err(QuoteField::PreviousClose);
                }
                let mid = (bid + ask) / 2.0;
                if ((mid - prev) / prev).abs() > MID_DEVIATION_LIMIT {
                    Ok((prev, SpotSource::MidRejected))
                } else {
                    Ok((mid, SpotSource::Mid))
                }
            }
            Attempt::NavPrice => {
                present(quote.nav_price, QuoteField::NavPrice).map(|p| (p, SpotSource::NavPrice))
            }
            Attempt::PreviousClose => present(quote.previous_close, QuoteField::PreviousClose)
                .map(|p| (p, SpotSource::PreviousClose)),
        }
    }
}

/// Resolve a spot price from the quote. Deterministic for a given snapshot.
pub fn resolve_spot(quote: &QuoteSnapshot) -> Result<(f64, SpotSource), SpotError> {
    let mut missing = Vec::new();
    for attempt in FALLBACK_ORDER {
        match attempt.try_resolve(quote) {
            Ok(resolved) => return Ok(resolved),
            Err(field) => {
                tracing::debug!(?attempt, ?field, "spot fallback step unavailable");
                if !missing.contains(&field) {
                    missing.push(field);
                }
            }
        }
    }
    Err(SpotError::Exhausted { missing })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn current_price_wins() {
        let quote = QuoteSnapshot::default()
            .with_current_price(101.0)
            .with_bid_ask(99.0, 100.0)
            .with_previous_close(98.0);
        assert_eq!(resolve_spot(&quote), Ok((101.0, SpotSource::CurrentPrice)));
    }

    #[test]
    fn mid_used_within_threshold() {
        let quote = QuoteSnapshot::default()
            .with_bid_ask(99.0, 101.0)
            .with_previous_close(95.0);
        assert_eq!(resolve_spot(&quote), Ok((100.0, SpotSource::Mid)));
    }

    #[test]
    fn mid_rejected_beyond_threshold() {
        // mid = 130, |130 - 100| / 100 = 0.30 > 0.20
        let quote = QuoteSnapshot::default()
            .with_bid_ask(129.0, 131.0)
            .with_previous_close(100.0);
        assert_eq!(resolve_spot(&quote), Ok((100.0, SpotSource::MidRejected)));
    }

    #[test]
    fn nav_then_previous_close() {
        let quote = QuoteSnapshot::default()
            .with_nav_price(50.0)
            .with_previous_close(49.0);
        assert_eq!(resolve_spot(&quote), Ok((50.0, SpotSource::NavPrice)));

        let quote = QuoteSnapshot::default().with_previous_close(49.0);
        assert_eq!(resolve_spot(&quote), Ok((49.0, SpotSource::PreviousClose)));
    }

    #[test]
    fn bid_ask_without_previous_close_falls_through() {
        let quote = QuoteSnapshot::default()
            .with_bid_ask(99.0, 101.0)
            .with_nav_price(100.5);
        assert_eq!(resolve_spot(&quote), Ok((100.5, SpotSource::NavPrice)));
    }

    #[test]
    fn non_finite_values_are_absent() {
        let quote = QuoteSnapshot::default()
            .with_current_price(f64::NAN)
            .with_previous_close(42.0);
        assert_eq!(resolve_spot(&quote), Ok((42.0, SpotSource::PreviousClose)));
    }

    #[test]
    fn empty_quote_is_exhausted() {
        let err = resolve_spot(&QuoteSnapshot::default()).unwrap_err();
        let SpotError::Exhausted { missing } = err;
        assert!(missing.contains(&QuoteField::CurrentPrice));
        assert!(missing.contains(&QuoteField::PreviousClose));
        assert!(missing.contains(&QuoteField::NavPrice));
    }

    proptest! {
        #[test]
        fn resolution_is_deterministic(
            current in prop::option::of(1.0f64..1000.0),
            bid in prop::option::of(1.0f64..1000.0),
            ask in prop::option::of(1.0f64..1000.0),
            prev in prop::option::of(1.0f64..1000.0),
            nav in prop::option::of(1.0f64..1000.0),
        ) {
            let quote = QuoteSnapshot {
                current_price: current,
                bid,
                ask,
                previous_close: prev,
                nav_price: nav,
            };
            let first = resolve_spot(&quote);
            prop_assert_eq!(first.clone(), resolve_spot(&quote));
            if let Some(c) = current {
                prop_assert_eq!(first, Ok((c, SpotSource::CurrentPrice)));
            }
        }
    }
}
