//! Progress reporting for pipeline runs.

use super::config::AcquisitionStrategy;
use super::spot::SpotSource;
use crate::data::FaultKind;
use crate::domain::OptionType;
use chrono::NaiveDate;

/// Discrete things that happen during a run, in the order they happen.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    SpotResolved { spot: f64, source: SpotSource },
    ExpiriesListed { count: usize },
    ExpiryFetched {
        expiry: NaiveDate,
        calls: usize,
        puts: usize,
    },
    SideDropped {
        expiry: NaiveDate,
        side: OptionType,
        fault: FaultKind,
    },
    ExpiryFailed {
        expiry: String,
        calls: FaultKind,
        puts: FaultKind,
    },
    UrlsDiscovered { count: usize },
    PageFetched { expiry: NaiveDate, url: String },
    PageFetchFailed {
        expiry: NaiveDate,
        url: String,
        fault: FaultKind,
    },
    StrategyFallback {
        from: AcquisitionStrategy,
        to: AcquisitionStrategy,
    },
    CalendarBuilt { holidays: usize },
}

/// Receives pipeline events. Implementations must not panic.
pub trait PipelineObserver: Send {
    fn on_event(&self, event: &PipelineEvent);
}

/// Discards every event.
pub struct NullObserver;

impl PipelineObserver for NullObserver {
    fn on_event(&self, _event: &PipelineEvent) {}
}

/// Forwards events to `tracing`: progress at info, partial failures at warn.
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn on_event(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::SpotResolved { spot, source } => {
                tracing::info!(spot, ?source, "spot resolved");
            }
            PipelineEvent::ExpiriesListed { count } => {
                tracing::info!(count, "expiries listed");
            }
            PipelineEvent::ExpiryFetched {
                expiry,
                calls,
                puts,
            } => {
                tracing::info!(%expiry, calls, puts, "expiry fetched");
            }
            PipelineEvent::SideDropped {
                expiry,
                side,
                fault,
            } => {
                tracing::warn!(%expiry, %side, ?fault, "side dropped, keeping the other");
            }
            PipelineEvent::ExpiryFailed {
                expiry,
                calls,
                puts,
            } => {
                tracing::warn!(%expiry, ?calls, ?puts, "expiry failed on both sides");
            }
            PipelineEvent::UrlsDiscovered { count } => {
                tracing::info!(count, "expiry pages discovered");
            }
            PipelineEvent::PageFetched { expiry, url } => {
                tracing::debug!(%expiry, %url, "page fetched");
            }
            PipelineEvent::PageFetchFailed { expiry, url, fault } => {
                tracing::warn!(%expiry, %url, ?fault, "page fetch failed");
            }
            PipelineEvent::StrategyFallback { from, to } => {
                tracing::warn!(%from, %to, "no rows from primary strategy, falling back");
            }
            PipelineEvent::CalendarBuilt { holidays } => {
                tracing::debug!(holidays, "trading calendar built");
            }
        }
    }
}
