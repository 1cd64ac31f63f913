//! Data acquisition: providers, page parsing, normalization and storage

pub mod circuit_breaker;
pub mod dates;
pub mod html;
pub mod normalize;
pub mod provider;
pub mod schema;
pub mod store;
pub mod yahoo;

pub use circuit_breaker::CircuitBreaker;
pub use provider::{
    ChainProvider, DataError, FaultKind, PageTransport, RawRecord, RawTable, RawValue,
};
pub use schema::{ChainSchema, SchemaError};
pub use yahoo::{YahooPages, YahooProvider};
