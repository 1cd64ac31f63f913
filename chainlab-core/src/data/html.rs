//! HTML extraction for the legacy options pages.
//!
//! Two things are read from a page: the expiry date-picker entries on the
//! root options page, and the positional option tables on each expiry page.
//! Missing or extra tables are normal; callers decide what absence means.

use super::provider::{RawRecord, RawTable, RawValue};
use super::schema::columns;
use scraper::{ElementRef, Html, Selector};

/// A table as it appears on the page: header texts and cell texts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HtmlTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl HtmlTable {
    /// Convert to raw records keyed by header text. Cells beyond the header
    /// width are dropped; short rows leave the trailing fields absent.
    pub fn to_raw_table(&self) -> RawTable {
        self.rows
            .iter()
            .map(|cells| {
                self.headers
                    .iter()
                    .zip(cells)
                    .map(|(header, cell)| (header_key(header), RawValue::from_cell(cell)))
                    .collect::<RawRecord>()
            })
            .collect()
    }
}

/// Page headers are already canonical apart from the contract column.
fn header_key(header: &str) -> String {
    match header {
        "Contract Name" | "Contract" => columns::CONTRACT_SYMBOL.to_string(),
        other => other.to_string(),
    }
}

/// One expiry entry from the root page's date picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatePickerEntry {
    /// Human-readable label, e.g. "March 21, 2025".
    pub label: String,
    /// Opaque page token carried in `data-value`.
    pub token: String,
}

fn selector(css: &'static str) -> Selector {
    Selector::parse(css).expect("static selector is valid")
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Every `div[role=option]` entry on the page, in document order.
pub fn date_picker_entries(page: &str) -> Vec<DatePickerEntry> {
    let doc = Html::parse_document(page);
    let options = selector(r#"div[role="option"]"#);

    doc.select(&options)
        .map(|el| DatePickerEntry {
            label: element_text(el),
            token: el.value().attr("data-value").unwrap_or_default().trim().to_string(),
        })
        .collect()
}

/// All tables on the page, in document order.
pub fn parse_tables(page: &str) -> Vec<HtmlTable> {
    let doc = Html::parse_document(page);
    let table_sel = selector("table");
    let row_sel = selector("tr");
    let th_sel = selector("th");
    let td_sel = selector("td");

    doc.select(&table_sel)
        .map(|table| {
            let mut parsed = HtmlTable::default();
            for row in table.select(&row_sel) {
                let headers: Vec<String> = row.select(&th_sel).map(element_text).collect();
                if !headers.is_empty() && parsed.headers.is_empty() {
                    parsed.headers = headers;
                    continue;
                }
                let cells: Vec<String> = row.select(&td_sel).map(element_text).collect();
                if !cells.is_empty() {
                    parsed.rows.push(cells);
                }
            }
            parsed
        })
        .collect()
}
