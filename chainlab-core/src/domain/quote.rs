//! Instrument quote facts used for spot resolution.

use serde::{Deserialize, Serialize};

/// Quote snapshot for the underlying as reported by a provider.
///
/// Each field is independently optional; providers routinely omit some of
/// them (indices have no NAV, ETFs outside market hours have no bid/ask).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuoteSnapshot {
    pub current_price: Option<f64>,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    pub previous_close: Option<f64>,
    pub nav_price: Option<f64>,
}

impl QuoteSnapshot {
    pub fn with_current_price(mut self, price: f64) -> Self {
        self.current_price = Some(price);
        self
    }

    pub fn with_bid_ask(mut self, bid: f64, ask: f64) -> Self {
        self.bid = Some(bid);
        self.ask = Some(ask);
        self
    }

    pub fn with_previous_close(mut self, price: f64) -> Self {
        self.previous_close = Some(price);
        self
    }

    pub fn with_nav_price(mut self, price: f64) -> Self {
        self.nav_price = Some(price);
        self
    }
}
