//! Domain types for chainlab

pub mod option;
pub mod quote;
pub mod table;

pub use option::{OptionRow, OptionType, ParseOptionTypeError};
pub use quote::QuoteSnapshot;
pub use table::OptionTable;
