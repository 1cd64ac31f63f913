//! Integration tests for the legacy HTML path.
//!
//! Tests:
//! 1. Zero parseable date-picker entries → no page fetches, empty table, no faults
//! 2. A fault on one page URL is isolated; later URLs are still fetched
//! 3. Pages with a single table keep calls and drop puts
//! 4. Unreachable root page is recorded as a discovery fault
//! 5. The inter-request wait follows each fetched page, the backoff each fault

use chainlab_core::data::{ChainProvider, DataError, FaultKind, PageTransport, RawTable};
use chainlab_core::domain::{OptionType, QuoteSnapshot};
use chainlab_core::pipeline::{AcquisitionStrategy, ChainSource, PipelineEvent, PipelineObserver};
use chainlab_core::{Pipeline, PipelineConfig};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

// ──────────────────────────────────────────────
// Helpers
// ──────────────────────────────────────────────

const BASE: &str = "https://pages.test/quote";

/// Quote-only provider; the scrape path never asks it for chains.
struct QuoteOnly;

impl ChainProvider for QuoteOnly {
    fn name(&self) -> &str {
        "quote-only"
    }

    fn quote(&self, _ticker: &str) -> Result<QuoteSnapshot, DataError> {
        Ok(QuoteSnapshot::default().with_previous_close(500.0))
    }

    fn expiries(&self, _ticker: &str) -> Result<Vec<String>, DataError> {
        panic!("scrape path must not list expiries")
    }

    fn calls(&self, _ticker: &str, _expiry: &str) -> Result<RawTable, DataError> {
        panic!("scrape path must not fetch calls")
    }

    fn puts(&self, _ticker: &str, _expiry: &str) -> Result<RawTable, DataError> {
        panic!("scrape path must not fetch puts")
    }
}

/// Serves canned pages by URL; anything unknown is a network fault.
struct CannedPages {
    pages: HashMap<String, String>,
    requests: Mutex<Vec<String>>,
    pauses: Mutex<Vec<Duration>>,
}

impl CannedPages {
    fn new(pages: Vec<(String, String)>) -> Self {
        Self {
            pages: pages.into_iter().collect(),
            requests: Mutex::new(Vec::new()),
            pauses: Mutex::new(Vec::new()),
        }
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    fn pauses(&self) -> Vec<Duration> {
        self.pauses.lock().unwrap().clone()
    }
}

impl PageTransport for CannedPages {
    fn fetch_page(&self, url: &str) -> Result<String, DataError> {
        self.requests.lock().unwrap().push(url.to_string());
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| DataError::NetworkUnreachable(format!("no route to {url}")))
    }

    fn pause(&self, duration: Duration) {
        self.pauses.lock().unwrap().push(duration);
    }
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<PipelineEvent>>,
}

impl PipelineObserver for Recorder {
    fn on_event(&self, event: &PipelineEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

fn config() -> PipelineConfig {
    let mut config = PipelineConfig::new("SPY");
    config.strategy = AcquisitionStrategy::Scrape;
    config.wait_secs = 0.0;
    config.fault_backoff_secs = 0.0;
    config.quote_page_base = BASE.to_string();
    config.as_of = NaiveDate::from_ymd_opt(2025, 3, 3);
    config
}

fn root_url() -> String {
    format!("{BASE}/SPY/options?p=SPY")
}

fn page_url(token: &str) -> String {
    format!("{BASE}/SPY/options?date={token}")
}

fn root_page(entries: &[(&str, &str)]) -> String {
    let options: String = entries
        .iter()
        .map(|(token, label)| format!(r#"<div role="option" data-value="{token}">{label}</div>"#))
        .collect();
    format!(r#"<html><body><div role="listbox">{options}</div></body></html>"#)
}

fn table(prefix: &str, strikes: &[&str]) -> String {
    let rows: String = strikes
        .iter()
        .map(|k| {
            format!(
                "<tr><td>{prefix}{k}</td><td>2025-03-20 3:59PM EDT</td><td>{k}</td>\
                 <td>1.00</td><td>0.95</td><td>1.05</td>\
                 <td>1,000</td><td>2,000</td><td>20.00%</td></tr>"
            )
        })
        .collect();
    format!(
        "<table><thead><tr><th>Contract Name</th><th>Last Trade Date</th><th>Strike</th>\
         <th>Last Price</th><th>Bid</th><th>Ask</th><th>Volume</th><th>Open Interest</th>\
         <th>Implied Volatility</th></tr></thead><tbody>{rows}</tbody></table>"
    )
}

fn chain_page(calls: &[&str], puts: Option<&[&str]>) -> String {
    let puts = puts.map(|p| table("P", p)).unwrap_or_default();
    format!("<html><body>{}{puts}</body></html>", table("C", calls))
}

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[test]
fn no_parseable_entries_means_no_fetches() {
    let pages = CannedPages::new(vec![(
        root_url(),
        root_page(&[("weekly", "Weeklies"), ("1742515200", "Select expiration")]),
    )]);
    let result = Pipeline::new(config(), &QuoteOnly, &pages).run(None).unwrap();

    assert_eq!(pages.requests(), vec![root_url()]);
    assert!(result.table.is_empty());
    assert!(result.failed_expiries.is_empty());
    assert!(result.url_failures.is_empty());
    assert_eq!(result.discovery_fault, None);
    assert_eq!(result.source, ChainSource::Scrape);
    assert_eq!(result.spot, 500.0);
}

#[test]
fn page_fault_is_isolated_to_its_url() {
    let pages = CannedPages::new(vec![
        (
            root_url(),
            root_page(&[
                ("1742515200", "March 21, 2025"),
                ("1743120000", "March 28, 2025"),
                ("1743724800", "April 4, 2025"),
            ]),
        ),
        (page_url("1742515200"), chain_page(&["500.00", "505.00"], Some(&["500.00"]))),
        // 1743120000 is not served.
        (page_url("1743724800"), chain_page(&["510.00"], Some(&["495.00", "490.00"]))),
    ]);
    let recorder = Recorder::default();
    let result = Pipeline::new(config(), &QuoteOnly, &pages)
        .with_observer(&recorder)
        .run(None)
        .unwrap();

    assert_eq!(
        pages.requests(),
        vec![
            root_url(),
            page_url("1742515200"),
            page_url("1743120000"),
            page_url("1743724800"),
        ]
    );

    let failure = &result.url_failures[&ymd(2025, 3, 28)];
    assert_eq!(failure.url, page_url("1743120000"));
    assert_eq!(failure.fault, FaultKind::Network);
    assert_eq!(result.url_failures.len(), 1);

    assert_eq!(result.table.len(), 6);
    assert_eq!(result.table.expiries(), vec![ymd(2025, 3, 21), ymd(2025, 4, 4)]);
    let events = recorder.events.lock().unwrap();
    assert!(events.iter().any(|e| matches!(
        e,
        PipelineEvent::PageFetchFailed {
            fault: FaultKind::Network,
            ..
        }
    )));
}

#[test]
fn scraped_cells_are_typed() {
    let pages = CannedPages::new(vec![
        (root_url(), root_page(&[("1742515200", "Mar 21st, 2025")])),
        (page_url("1742515200"), chain_page(&["500.00"], Some(&["500.00"]))),
    ]);
    let result = Pipeline::new(config(), &QuoteOnly, &pages).run(None).unwrap();

    let call = &result.table.rows()[0];
    assert_eq!(call.option_type, OptionType::Call);
    assert_eq!(call.contract_symbol.as_deref(), Some("C500.00"));
    assert_eq!(call.strike, 500.0);
    assert_eq!(call.volume, 1000);
    assert_eq!(call.open_interest, 2000);
    assert_eq!(call.implied_volatility, Some(0.2));
    assert_eq!(
        call.last_trade_date.map(|t| t.format("%Y-%m-%d %H:%M").to_string()),
        Some("2025-03-20 19:59".to_string())
    );
    assert_eq!(result.table.rows()[1].option_type, OptionType::Put);
}

#[test]
fn single_table_page_keeps_calls_only() {
    let pages = CannedPages::new(vec![
        (root_url(), root_page(&[("1742515200", "March 21, 2025")])),
        (page_url("1742515200"), chain_page(&["500.00", "505.00"], None)),
    ]);
    let recorder = Recorder::default();
    let result = Pipeline::new(config(), &QuoteOnly, &pages)
        .with_observer(&recorder)
        .run(None)
        .unwrap();

    assert_eq!(result.table.len(), 2);
    assert!(result.table.iter().all(|r| r.option_type == OptionType::Call));
    assert!(result.failed_expiries.is_empty());
    assert!(recorder.events.lock().unwrap().contains(&PipelineEvent::SideDropped {
        expiry: ymd(2025, 3, 21),
        side: OptionType::Put,
        fault: FaultKind::Parse,
    }));
}

#[test]
fn page_without_tables_fails_the_expiry() {
    let pages = CannedPages::new(vec![
        (root_url(), root_page(&[("1742515200", "March 21, 2025")])),
        (page_url("1742515200"), "<html><body>Data unavailable</body></html>".to_string()),
    ]);
    let result = Pipeline::new(config(), &QuoteOnly, &pages).run(None).unwrap();

    assert!(result.table.is_empty());
    assert_eq!(result.failed_expiries.len(), 1);
    assert_eq!(result.failed_expiries[0].expiry, "2025-03-21");
    assert_eq!(result.failed_expiries[0].calls, FaultKind::Parse);
    assert_eq!(result.failed_expiries[0].puts, FaultKind::Parse);
}

#[test]
fn unreachable_root_page_is_a_discovery_fault() {
    let pages = CannedPages::new(vec![]);
    let result = Pipeline::new(config(), &QuoteOnly, &pages).run(None).unwrap();

    assert_eq!(result.discovery_fault, Some(FaultKind::Network));
    assert!(result.table.is_empty());
    assert_eq!(pages.requests().len(), 1);
}

#[test]
fn waits_follow_fetches_and_backoff_follows_faults() {
    let pages = CannedPages::new(vec![
        (
            root_url(),
            root_page(&[
                ("1742515200", "March 21, 2025"),
                ("1743120000", "March 28, 2025"),
                ("1743724800", "April 4, 2025"),
            ]),
        ),
        (page_url("1742515200"), chain_page(&["500.00"], Some(&["500.00"]))),
        (page_url("1743724800"), chain_page(&["510.00"], Some(&["490.00"]))),
    ]);
    let mut cfg = config();
    cfg.wait_secs = 0.5;
    cfg.fault_backoff_secs = 30.0;

    let result = Pipeline::new(cfg, &QuoteOnly, &pages).run(None).unwrap();

    assert_eq!(result.url_failures.len(), 1);
    assert_eq!(
        pages.pauses(),
        vec![
            Duration::from_millis(500),
            Duration::from_secs(30),
            Duration::from_millis(500),
        ]
    );
}

#[test]
fn zero_waits_never_pause() {
    let pages = CannedPages::new(vec![
        (root_url(), root_page(&[("1742515200", "March 21, 2025")])),
        (page_url("1742515200"), chain_page(&["500.00"], None)),
    ]);
    Pipeline::new(config(), &QuoteOnly, &pages).run(None).unwrap();
    assert!(pages.pauses().is_empty());
}
