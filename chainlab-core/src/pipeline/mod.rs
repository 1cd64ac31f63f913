//! Pipeline orchestration.
//!
//! A run takes either a precomputed frame (adapter path) or nothing (fetch
//! path). The fetch path resolves spot, acquires the chain with the
//! configured strategy, normalizes once, converts to typed rows and builds
//! the trading calendar. Per-item failures are collected, never raised; only
//! a spot failure ends the run.

pub mod api;
pub mod config;
pub mod context;
pub mod fragment;
pub mod observer;
pub mod precomputed;
pub mod scrape;
pub mod spot;

pub use config::{AcquisitionStrategy, ConfigError, DiscountType, PipelineConfig};
pub use context::{FailedExpiry, PipelineContext, UrlFailure};
pub use fragment::ExpiryOutcome;
pub use observer::{NullObserver, PipelineEvent, PipelineObserver, TracingObserver};
pub use precomputed::{adapt_precomputed, AdapterError};
pub use spot::{resolve_spot, QuoteField, SpotError, SpotSource};

use crate::calendar::TradingCalendar;
use crate::data::{ChainProvider, DataError, FaultKind, PageTransport};
use crate::domain::{OptionTable, OptionType};
use chrono::NaiveDate;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("quote unavailable: {0}")]
    Quote(#[source] DataError),

    #[error(transparent)]
    Spot(#[from] SpotError),

    #[error("precomputed input rejected: {0}")]
    Adapter(#[from] AdapterError),
}

/// Where the table came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainSource {
    Api,
    Scrape,
    Precomputed,
}

/// Everything a run produces.
#[derive(Debug, Clone)]
pub struct Retrieval {
    pub ticker: String,
    pub source: ChainSource,
    pub table: OptionTable,
    pub spot: f64,
    pub spot_source: SpotSource,
    pub failed_expiries: Vec<FailedExpiry>,
    /// API failures from an `auto` run that fell back to the pages.
    pub api_failed_expiries: Vec<FailedExpiry>,
    pub url_failures: BTreeMap<NaiveDate, UrlFailure>,
    pub listing_fault: Option<FaultKind>,
    pub discovery_fault: Option<FaultKind>,
    pub dropped_rows: usize,
    pub calendar: TradingCalendar,
}

/// Serializable run summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalReport {
    pub ticker: String,
    pub source: ChainSource,
    pub spot: f64,
    pub spot_source: SpotSource,
    pub rows: usize,
    pub calls: usize,
    pub puts: usize,
    pub expiries: Vec<NaiveDate>,
    pub failed_expiries: Vec<FailedExpiry>,
    /// API failures from an `auto` run that fell back to the pages.
    pub api_failed_expiries: Vec<FailedExpiry>,
    pub url_failures: BTreeMap<NaiveDate, UrlFailure>,
    pub listing_fault: Option<FaultKind>,
    pub discovery_fault: Option<FaultKind>,
    pub dropped_rows: usize,
    pub holidays: usize,
}

impl Retrieval {
    pub fn report(&self) -> RetrievalReport {
        let calls = self
            .table
            .iter()
            .filter(|r| r.option_type == OptionType::Call)
            .count();
        RetrievalReport {
            ticker: self.ticker.clone(),
            source: self.source,
            spot: self.spot,
            spot_source: self.spot_source,
            rows: self.table.len(),
            calls,
            puts: self.table.len() - calls,
            expiries: self.table.expiries(),
            failed_expiries: self.failed_expiries.clone(),
            api_failed_expiries: self.api_failed_expiries.clone(),
            url_failures: self.url_failures.clone(),
            listing_fault: self.listing_fault,
            discovery_fault: self.discovery_fault,
            dropped_rows: self.dropped_rows,
            holidays: self.calendar.len(),
        }
    }
}

/// Wires a configuration to its provider, page transport and observer.
pub struct Pipeline<'a> {
    config: PipelineConfig,
    provider: &'a dyn ChainProvider,
    pages: &'a dyn PageTransport,
    observer: &'a dyn PipelineObserver,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: PipelineConfig,
        provider: &'a dyn ChainProvider,
        pages: &'a dyn PageTransport,
    ) -> Self {
        Self {
            config,
            provider,
            pages,
            observer: &NullObserver,
        }
    }

    pub fn with_observer(mut self, observer: &'a dyn PipelineObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Run once. With `precomputed` the adapter path is taken and nothing is
    /// fetched; otherwise the configured acquisition strategy runs.
    pub fn run(&self, precomputed: Option<&DataFrame>) -> Result<Retrieval, PipelineError> {
        self.config.validate()?;
        match precomputed {
            Some(df) => self.run_precomputed(df),
            None => self.run_fetch(),
        }
    }

    fn calendar(&self) -> TradingCalendar {
        let calendar = TradingCalendar::build(self.config.reference_date());
        self.observer.on_event(&PipelineEvent::CalendarBuilt {
            holidays: calendar.len(),
        });
        calendar
    }

    fn run_precomputed(&self, df: &DataFrame) -> Result<Retrieval, PipelineError> {
        let (spot, table) = adapt_precomputed(df, self.config.discount_type)?;
        self.observer.on_event(&PipelineEvent::SpotResolved {
            spot,
            source: SpotSource::Precomputed,
        });

        Ok(Retrieval {
            ticker: self.config.symbol(),
            source: ChainSource::Precomputed,
            table,
            spot,
            spot_source: SpotSource::Precomputed,
            failed_expiries: Vec::new(),
            api_failed_expiries: Vec::new(),
            url_failures: BTreeMap::new(),
            listing_fault: None,
            discovery_fault: None,
            dropped_rows: 0,
            calendar: self.calendar(),
        })
    }

    fn run_fetch(&self) -> Result<Retrieval, PipelineError> {
        let mut ctx = PipelineContext::new(self.config.clone());
        let ticker = ctx.config.symbol();

        let quote = self.provider.quote(&ticker).map_err(PipelineError::Quote)?;
        let (spot, spot_source) = resolve_spot(&quote)?;
        ctx.spot = Some(spot);
        ctx.spot_source = Some(spot_source);
        self.observer.on_event(&PipelineEvent::SpotResolved {
            spot,
            source: spot_source,
        });

        let source = match ctx.config.strategy {
            AcquisitionStrategy::Api => {
                api::fetch_api_chain(self.provider, &mut ctx, self.observer);
                ChainSource::Api
            }
            AcquisitionStrategy::Scrape => {
                scrape::fetch_scrape_chain(self.pages, &mut ctx, self.observer);
                ChainSource::Scrape
            }
            AcquisitionStrategy::Auto => {
                api::fetch_api_chain(self.provider, &mut ctx, self.observer);
                if ctx.fragment_rows() > 0 {
                    ChainSource::Api
                } else {
                    self.observer.on_event(&PipelineEvent::StrategyFallback {
                        from: AcquisitionStrategy::Api,
                        to: AcquisitionStrategy::Scrape,
                    });
                    ctx.reset_for_fallback();
                    scrape::fetch_scrape_chain(self.pages, &mut ctx, self.observer);
                    ChainSource::Scrape
                }
            }
        };

        ctx.concatenate();
        let table = ctx.build_table();
        tracing::info!(
            %ticker,
            rows = table.len(),
            failed = ctx.failed_expiries.len(),
            dropped = ctx.dropped_rows,
            "chain assembled"
        );

        Ok(Retrieval {
            ticker,
            source,
            table,
            spot,
            spot_source,
            failed_expiries: ctx.failed_expiries,
            api_failed_expiries: ctx.api_failed_expiries,
            url_failures: ctx.url_failures,
            listing_fault: ctx.listing_fault,
            discovery_fault: ctx.discovery_fault,
            dropped_rows: ctx.dropped_rows,
            calendar: self.calendar(),
        })
    }
}
