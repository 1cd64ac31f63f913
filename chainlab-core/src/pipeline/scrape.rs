//! Legacy chain acquisition from the HTML options pages.
//!
//! Three stages, each isolating failures per item:
//! 1. discover expiry page URLs from the root page's date picker,
//! 2. fetch every page in date order with a pause between requests,
//! 3. parse the fetched pages positionally (calls table, then puts table).

use super::context::{PipelineContext, UrlFailure};
use super::fragment::resolve_sides;
use super::observer::{PipelineEvent, PipelineObserver};
use crate::data::dates::parse_date;
use crate::data::html::{date_picker_entries, parse_tables, DatePickerEntry};
use crate::data::{DataError, PageTransport};
use chrono::NaiveDate;
use std::time::Duration;

/// Expiry page tokens are epoch seconds.
fn is_page_token(token: &str) -> bool {
    token.len() == 10 && token.bytes().all(|b| b.is_ascii_digit())
}

/// Keep entries whose label parses as a date and whose token looks like a
/// page token. Label and token are judged together per entry.
pub fn expiry_urls(
    entries: &[DatePickerEntry],
    base: &str,
    ticker: &str,
) -> Vec<(NaiveDate, String)> {
    entries
        .iter()
        .filter(|entry| is_page_token(&entry.token))
        .filter_map(|entry| {
            parse_date(&entry.label).ok().map(|date| {
                let url = format!("{base}/{ticker}/options?date={}", entry.token);
                (date, url)
            })
        })
        .collect()
}

fn root_url(base: &str, ticker: &str) -> String {
    format!("{base}/{ticker}/options?p={ticker}")
}

fn pause(transport: &dyn PageTransport, duration: Duration) {
    if !duration.is_zero() {
        transport.pause(duration);
    }
}

/// Stage 1: fetch the root page and build the expiry → URL map.
pub fn discover_urls(
    transport: &dyn PageTransport,
    ctx: &mut PipelineContext,
    observer: &dyn PipelineObserver,
) {
    let ticker = ctx.config.symbol();
    let base = ctx.config.quote_page_base.trim_end_matches('/').to_string();
    let url = root_url(&base, &ticker);

    match transport.fetch_page(&url) {
        Ok(page) => {
            let entries = date_picker_entries(&page);
            let urls = expiry_urls(&entries, &base, &ticker);
            if urls.len() < entries.len() {
                tracing::debug!(
                    kept = urls.len(),
                    seen = entries.len(),
                    "discarded date-picker entries without a date or page token"
                );
            }
            ctx.url_map.extend(urls);
            ctx.root_page = Some(page);
        }
        Err(e) => {
            tracing::warn!(%url, error = %e, "root options page unavailable");
            ctx.discovery_fault = Some(e.fault());
        }
    }

    ctx.expiries = ctx
        .url_map
        .keys()
        .map(|d| d.format("%Y-%m-%d").to_string())
        .collect();
    observer.on_event(&PipelineEvent::UrlsDiscovered {
        count: ctx.url_map.len(),
    });
}

/// Stage 2: fetch every discovered page once. Faults are recorded and
/// followed by the longer backoff; nothing is retried.
pub fn fetch_pages(
    transport: &dyn PageTransport,
    ctx: &mut PipelineContext,
    observer: &dyn PipelineObserver,
) {
    let urls: Vec<(NaiveDate, String)> = ctx
        .url_map
        .iter()
        .map(|(date, url)| (*date, url.clone()))
        .collect();

    for (expiry, url) in urls {
        match transport.fetch_page(&url) {
            Ok(page) => {
                observer.on_event(&PipelineEvent::PageFetched {
                    expiry,
                    url: url.clone(),
                });
                ctx.raw_pages.insert(expiry, page);
                pause(transport, ctx.config.wait());
            }
            Err(e) => {
                let fault = e.fault();
                observer.on_event(&PipelineEvent::PageFetchFailed {
                    expiry,
                    url: url.clone(),
                    fault,
                });
                ctx.url_failures.insert(expiry, UrlFailure { url, fault });
                pause(transport, ctx.config.fault_backoff());
            }
        }
    }
}

/// Stage 3: parse each fetched page into calls and puts.
pub fn parse_pages(ctx: &mut PipelineContext, observer: &dyn PipelineObserver) {
    let pages = std::mem::take(&mut ctx.raw_pages);

    for (expiry, page) in &pages {
        let mut tables = parse_tables(page).into_iter();
        let calls = tables.next();
        let puts = tables.next();

        let outcome = resolve_sides(
            || {
                calls
                    .map(|t| t.to_raw_table())
                    .ok_or_else(|| DataError::ResponseFormatChanged("calls table missing".into()))
            },
            || {
                puts.map(|t| t.to_raw_table())
                    .ok_or_else(|| DataError::ResponseFormatChanged("puts table missing".into()))
            },
        );
        let label = expiry.format("%Y-%m-%d").to_string();
        ctx.record_outcome(&label, *expiry, outcome, observer);
    }

    ctx.raw_pages = pages;
}

/// Run all three stages.
pub fn fetch_scrape_chain(
    transport: &dyn PageTransport,
    ctx: &mut PipelineContext,
    observer: &dyn PipelineObserver,
) {
    discover_urls(transport, ctx, observer);
    fetch_pages(transport, ctx, observer);
    parse_pages(ctx, observer);
}
