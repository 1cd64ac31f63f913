//! Chain acquisition through the structured provider API.

use super::context::PipelineContext;
use super::fragment::resolve_sides;
use super::observer::{PipelineEvent, PipelineObserver};
use crate::data::dates::parse_date;
use crate::data::{ChainProvider, FaultKind};

/// List the provider's expiries and fetch both sides of each, in listed order.
///
/// A failed listing is recorded on the context and yields no expiries.
/// Unparseable expiry identifiers fail without a fetch.
pub fn fetch_api_chain(
    provider: &dyn ChainProvider,
    ctx: &mut PipelineContext,
    observer: &dyn PipelineObserver,
) {
    let ticker = ctx.config.symbol();

    ctx.expiries = match provider.expiries(&ticker) {
        Ok(list) => list,
        Err(e) => {
            tracing::warn!(
                provider = provider.name(),
                %ticker,
                error = %e,
                "expiry listing failed"
            );
            ctx.listing_fault = Some(e.fault());
            Vec::new()
        }
    };
    observer.on_event(&PipelineEvent::ExpiriesListed {
        count: ctx.expiries.len(),
    });

    let labels = ctx.expiries.clone();
    for label in &labels {
        let expiry = match parse_date(label) {
            Ok(date) => date,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unparseable expiry");
                ctx.record_failure(label, FaultKind::Parse, FaultKind::Parse, observer);
                continue;
            }
        };

        let outcome = resolve_sides(
            || provider.calls(&ticker, label),
            || provider.puts(&ticker, label),
        );
        ctx.record_outcome(label, expiry, outcome, observer);
    }
}
