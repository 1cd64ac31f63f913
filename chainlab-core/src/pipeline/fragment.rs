//! Per-expiry side validation and outcome resolution.
//!
//! Shared by the API and scrape paths: both hand over one fetch per side and
//! receive an `ExpiryOutcome` that says exactly which sides survived.

use crate::data::normalize::canonical_name;
use crate::data::schema::columns;
use crate::data::{DataError, FaultKind, RawTable};

/// Result of fetching and validating both sides of one expiry.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpiryOutcome {
    BothSides {
        calls: RawTable,
        puts: RawTable,
    },
    CallsOnly {
        calls: RawTable,
        puts_fault: FaultKind,
    },
    PutsOnly {
        puts: RawTable,
        calls_fault: FaultKind,
    },
    Failed {
        calls_fault: FaultKind,
        puts_fault: FaultKind,
    },
}

/// Validate one fetched side: it must have rows and its first row must
/// carry a numeric strike. Later rows are checked during typed conversion.
pub fn validate_side(fetched: Result<RawTable, DataError>) -> Result<RawTable, FaultKind> {
    let rows = fetched.map_err(|e| {
        tracing::debug!(error = %e, "side fetch failed");
        e.fault()
    })?;

    let first = rows.first().ok_or(FaultKind::EmptyRows)?;
    let strike = first
        .iter()
        .find(|(key, _)| canonical_name(key) == columns::STRIKE)
        .map(|(_, value)| value)
        .ok_or(FaultKind::MissingField)?;

    if strike.is_numeric() {
        Ok(rows)
    } else {
        Err(FaultKind::NonNumericStrike)
    }
}

/// Fetch calls, then puts, and decide which sides to keep.
///
/// Puts are always attempted, whether or not calls were valid.
pub fn resolve_sides<C, P>(fetch_calls: C, fetch_puts: P) -> ExpiryOutcome
where
    C: FnOnce() -> Result<RawTable, DataError>,
    P: FnOnce() -> Result<RawTable, DataError>,
{
    let calls = validate_side(fetch_calls());
    let puts = validate_side(fetch_puts());

    match (calls, puts) {
        (Ok(calls), Ok(puts)) => ExpiryOutcome::BothSides { calls, puts },
        (Ok(calls), Err(puts_fault)) => ExpiryOutcome::CallsOnly { calls, puts_fault },
        (Err(calls_fault), Ok(puts)) => ExpiryOutcome::PutsOnly { puts, calls_fault },
        (Err(calls_fault), Err(puts_fault)) => ExpiryOutcome::Failed {
            calls_fault,
            puts_fault,
        },
    }
}
