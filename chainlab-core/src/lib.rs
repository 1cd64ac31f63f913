//! chainlab core: options chain acquisition and normalization.
//!
//! - Canonical chain schema (rows, table, Parquet I/O)
//! - Spot price resolution with ordered fallbacks
//! - Provider API and legacy HTML acquisition paths with per-item fault isolation
//! - Precomputed table adapter
//! - US market trading calendar

pub mod calendar;
pub mod data;
pub mod domain;
pub mod pipeline;

pub use calendar::TradingCalendar;
pub use domain::{OptionRow, OptionTable, OptionType, QuoteSnapshot};
pub use pipeline::{Pipeline, PipelineConfig, PipelineError, Retrieval, RetrievalReport};
