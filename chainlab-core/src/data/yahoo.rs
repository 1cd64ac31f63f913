//! Yahoo Finance options provider and HTML page transport.
//!
//! `YahooProvider` reads the v7 options endpoint: one request lists the
//! expiries and quote, one request per expiry returns both sides of the
//! chain. Each call makes exactly one attempt; a 403 trips the circuit
//! breaker, 429/5xx count towards it.
//!
//! Yahoo Finance has no official API and changes format without notice.
//! The HTML transport backs the legacy scrape path for that reason.

use super::circuit_breaker::CircuitBreaker;
use super::dates::parse_date;
use super::provider::{ChainProvider, DataError, PageTransport, RawRecord, RawTable, RawValue};
use super::schema::columns;
use crate::domain::QuoteSnapshot;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
const DEFAULT_API_BASE: &str = "https://query2.finance.yahoo.com";

#[derive(Debug, Deserialize)]
struct OptionsResponse {
    #[serde(rename = "optionChain")]
    option_chain: OptionChain,
}

#[derive(Debug, Deserialize)]
struct OptionChain {
    result: Option<Vec<ChainData>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChainData {
    #[serde(rename = "expirationDates", default)]
    expiration_dates: Vec<i64>,
    #[serde(default)]
    quote: Map<String, Value>,
    #[serde(default)]
    options: Vec<ChainSides>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChainSides {
    calls: Option<Vec<Map<String, Value>>>,
    puts: Option<Vec<Map<String, Value>>>,
}

fn http_client() -> reqwest::blocking::Client {
    reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(30))
        .user_agent(USER_AGENT)
        .build()
        .expect("failed to build HTTP client")
}

/// Yahoo Finance options provider.
pub struct YahooProvider {
    client: reqwest::blocking::Client,
    base_url: String,
    circuit_breaker: Arc<CircuitBreaker>,
    /// Expiry label → Yahoo's epoch-second identifier, filled by `expiries`.
    expiry_stamps: Mutex<BTreeMap<String, i64>>,
    /// Last chain response, so calls then puts for one expiry cost one request.
    last_chain: Mutex<Option<(String, ChainSides)>>,
}

impl YahooProvider {
    pub fn new(circuit_breaker: Arc<CircuitBreaker>) -> Self {
        Self {
            client: http_client(),
            base_url: DEFAULT_API_BASE.to_string(),
            circuit_breaker,
            expiry_stamps: Mutex::new(BTreeMap::new()),
            last_chain: Mutex::new(None),
        }
    }

    /// Point the provider at another host (mirrors, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn options_url(&self, ticker: &str, stamp: Option<i64>) -> String {
        match stamp {
            Some(ts) => format!("{}/v7/finance/options/{ticker}?date={ts}", self.base_url),
            None => format!("{}/v7/finance/options/{ticker}", self.base_url),
        }
    }

    /// One GET against the options endpoint. No retry.
    fn request(&self, ticker: &str, url: &str) -> Result<ChainData, DataError> {
        self.circuit_breaker.guard()?;
        tracing::debug!(%url, "requesting options endpoint");

        let resp = self.client.get(url).send().map_err(|e| {
            self.circuit_breaker.record_failure();
            DataError::NetworkUnreachable(e.to_string())
        })?;

        let status = resp.status();
        if status == reqwest::StatusCode::FORBIDDEN {
            self.circuit_breaker.trip();
            return Err(DataError::CircuitBreakerTripped);
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            self.circuit_breaker.record_failure();
            let retry_after_secs = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(DataError::RateLimited { retry_after_secs });
        }
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(DataError::AuthenticationRequired(
                "Yahoo Finance requires authentication".into(),
            ));
        }
        if !status.is_success() {
            self.circuit_breaker.record_failure();
            return Err(DataError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body: OptionsResponse = resp.json().map_err(|e| {
            DataError::ResponseFormatChanged(format!("failed to parse options for {ticker}: {e}"))
        })?;
        self.circuit_breaker.record_success();

        let chain = body.option_chain;
        let result = chain.result.ok_or_else(|| match chain.error {
            Some(err) if err.code == "Not Found" => DataError::SymbolNotFound {
                symbol: ticker.to_string(),
            },
            Some(err) => {
                DataError::ResponseFormatChanged(format!("{}: {}", err.code, err.description))
            }
            None => DataError::ResponseFormatChanged("empty result with no error".into()),
        })?;

        result
            .into_iter()
            .next()
            .ok_or_else(|| DataError::SymbolNotFound {
                symbol: ticker.to_string(),
            })
    }

    fn stamp_for(&self, expiry: &str) -> Result<i64, DataError> {
        if let Some(ts) = self.lock_stamps().get(expiry) {
            return Ok(*ts);
        }
        let date = parse_date(expiry).map_err(|e| DataError::ResponseFormatChanged(e.to_string()))?;
        date.and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp())
            .ok_or_else(|| DataError::ResponseFormatChanged(format!("bad expiry {expiry}")))
    }

    fn lock_stamps(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, i64>> {
        self.expiry_stamps
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn chain_for(&self, ticker: &str, expiry: &str) -> Result<ChainSides, DataError> {
        let key = format!("{ticker}|{expiry}");
        let mut cached = self
            .last_chain
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some((cached_key, sides)) = cached.as_ref() {
            if *cached_key == key {
                return Ok(sides.clone());
            }
        }

        let url = self.options_url(ticker, Some(self.stamp_for(expiry)?));
        let data = self.request(ticker, &url)?;
        let sides = data
            .options
            .into_iter()
            .next()
            .ok_or_else(|| DataError::MissingField("options".into()))?;
        *cached = Some((key, sides.clone()));
        Ok(sides)
    }
}

/// Provider JSON row → raw record. The contract symbol is stamped under its
/// canonical name; every other field keeps the provider's name.
fn json_row_to_record(row: &Map<String, Value>) -> RawRecord {
    row.iter()
        .map(|(key, value)| {
            let key = if key == "contractSymbol" {
                columns::CONTRACT_SYMBOL.to_string()
            } else {
                key.clone()
            };
            (key, RawValue::from_json(value))
        })
        .collect()
}

fn side_rows(side: Option<Vec<Map<String, Value>>>, name: &str) -> Result<RawTable, DataError> {
    side.map(|rows| rows.iter().map(json_row_to_record).collect())
        .ok_or_else(|| DataError::MissingField(name.to_string()))
}

fn quote_field(quote: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .filter_map(|k| quote.get(*k))
        .filter_map(Value::as_f64)
        .find(|v| v.is_finite())
}

/// Only `currentPrice` fills the current price. Fund and index quotes carry
/// `regularMarketPrice` instead and resolve through mid, NAV or previous close.
fn quote_snapshot(quote: &Map<String, Value>) -> QuoteSnapshot {
    QuoteSnapshot {
        current_price: quote_field(quote, &["currentPrice"]),
        bid: quote_field(quote, &["bid"]),
        ask: quote_field(quote, &["ask"]),
        previous_close: quote_field(quote, &["previousClose", "regularMarketPreviousClose"]),
        nav_price: quote_field(quote, &["navPrice"]),
    }
}

impl ChainProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn quote(&self, ticker: &str) -> Result<QuoteSnapshot, DataError> {
        let data = self.request(ticker, &self.options_url(ticker, None))?;
        Ok(quote_snapshot(&data.quote))
    }

    fn expiries(&self, ticker: &str) -> Result<Vec<String>, DataError> {
        let data = self.request(ticker, &self.options_url(ticker, None))?;
        let mut stamps = self.lock_stamps();
        let mut labels = Vec::with_capacity(data.expiration_dates.len());
        for ts in data.expiration_dates {
            let date = chrono::DateTime::from_timestamp(ts, 0)
                .map(|dt| dt.date_naive())
                .ok_or_else(|| {
                    DataError::ResponseFormatChanged(format!("invalid expiration timestamp: {ts}"))
                })?;
            let label = date.format("%Y-%m-%d").to_string();
            stamps.insert(label.clone(), ts);
            labels.push(label);
        }
        Ok(labels)
    }

    fn calls(&self, ticker: &str, expiry: &str) -> Result<RawTable, DataError> {
        side_rows(self.chain_for(ticker, expiry)?.calls, "calls")
    }

    fn puts(&self, ticker: &str, expiry: &str) -> Result<RawTable, DataError> {
        side_rows(self.chain_for(ticker, expiry)?.puts, "puts")
    }
}

/// Blocking HTML page transport for the legacy scrape path.
pub struct YahooPages {
    client: reqwest::blocking::Client,
}

impl YahooPages {
    pub fn new() -> Self {
        Self {
            client: http_client(),
        }
    }
}

impl Default for YahooPages {
    fn default() -> Self {
        Self::new()
    }
}

impl PageTransport for YahooPages {
    fn fetch_page(&self, url: &str) -> Result<String, DataError> {
        tracing::debug!(%url, "fetching page");
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DataError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        resp.text()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn chain_body() -> Value {
        json!({
            "optionChain": {
                "result": [{
                    "underlyingSymbol": "SPY",
                    "expirationDates": [1742515200, 1745539200],
                    "quote": {
                        "regularMarketPrice": 571.2,
                        "bid": 571.1,
                        "ask": 571.3,
                        "regularMarketPreviousClose": 568.0
                    },
                    "options": [{
                        "expirationDate": 1742515200,
                        "calls": [
                            {"contractSymbol": "SPY250321C00570000", "strike": 570.0,
                             "lastPrice": 6.1, "bid": 6.0, "ask": 6.2, "volume": 1200,
                             "openInterest": 3400, "impliedVolatility": 0.17,
                             "lastTradeDate": 1742500740}
                        ],
                        "puts": []
                    }]
                }],
                "error": null
            }
        })
    }

    fn provider(server: &MockServer) -> YahooProvider {
        YahooProvider::new(Arc::new(CircuitBreaker::default_provider()))
            .with_base_url(server.base_url())
    }

    #[test]
    fn parses_quote_and_expiries() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/v7/finance/options/SPY");
            then.status(200).json_body(chain_body());
        });

        let yahoo = provider(&server);
        let quote = yahoo.quote("SPY").unwrap();
        assert_eq!(quote.current_price, None);
        assert_eq!(quote.bid, Some(571.1));
        assert_eq!(quote.previous_close, Some(568.0));
        assert_eq!(quote.nav_price, None);

        let expiries = yahoo.expiries("SPY").unwrap();
        assert_eq!(expiries, vec!["2025-03-21", "2025-04-25"]);
    }

    #[test]
    fn calls_and_puts_share_one_request() {
        let server = MockServer::start();
        let chain = server.mock(|when, then| {
            when.method(GET)
                .path("/v7/finance/options/SPY")
                .query_param("date", "1742515200");
            then.status(200).json_body(chain_body());
        });

        let yahoo = provider(&server);
        let calls = yahoo.calls("SPY", "2025-03-21").unwrap();
        let puts = yahoo.puts("SPY", "2025-03-21").unwrap();

        assert_eq!(calls.len(), 1);
        assert!(puts.is_empty());
        assert_eq!(
            calls[0].get(columns::CONTRACT_SYMBOL),
            Some(&RawValue::Text("SPY250321C00570000".into()))
        );
        assert_eq!(calls[0].get("strike"), Some(&RawValue::Number(570.0)));
        chain.assert_hits(1);
    }

    #[test]
    fn forbidden_trips_the_breaker() {
        let server = MockServer::start();
        let blocked = server.mock(|when, then| {
            when.method(GET).path("/v7/finance/options/SPY");
            then.status(403);
        });

        let yahoo = provider(&server);
        assert!(matches!(yahoo.quote("SPY"), Err(DataError::CircuitBreakerTripped)));
        // Breaker is open: the second call never reaches the server.
        assert!(matches!(yahoo.expiries("SPY"), Err(DataError::CircuitBreakerTripped)));
        blocked.assert_hits(1);
    }

    #[test]
    fn page_transport_reports_http_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/quote/SPY/options");
            then.status(404);
        });

        let pages = YahooPages::new();
        let err = pages
            .fetch_page(&server.url("/quote/SPY/options"))
            .unwrap_err();
        assert!(matches!(err, DataError::Http { status: 404, .. }));
    }

    #[test]
    fn quote_prefers_current_price_key() {
        let quote = json!({"currentPrice": 10.0, "regularMarketPrice": 11.0, "navPrice": 9.5});
        let snapshot = quote_snapshot(quote.as_object().unwrap());
        assert_eq!(snapshot.current_price, Some(10.0));
        assert_eq!(snapshot.nav_price, Some(9.5));
    }

    #[test]
    fn fund_quote_without_current_price_resolves_through_mid() {
        let quote = json!({
            "regularMarketPrice": 571.2,
            "bid": 571.0,
            "ask": 571.5,
            "regularMarketPreviousClose": 568.0,
            "navPrice": 570.9
        });
        let snapshot = quote_snapshot(quote.as_object().unwrap());
        assert_eq!(snapshot.current_price, None);
        assert_eq!(
            crate::pipeline::resolve_spot(&snapshot),
            Ok((571.25, crate::pipeline::SpotSource::Mid))
        );
    }
}
