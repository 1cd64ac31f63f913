//! chainlab CLI: options chain retrieval commands.
//!
//! Commands:
//! - `fetch`: retrieve a ticker's chain (API, legacy pages, or both) and export it
//! - `adapt`: project a precomputed Parquet table into the canonical schema
//! - `calendar`: list market holidays over the forward horizon

use anyhow::{bail, Context, Result};
use chainlab_core::calendar::TradingCalendar;
use chainlab_core::data::store::{read_frame, write_table};
use chainlab_core::data::{CircuitBreaker, YahooPages, YahooProvider};
use chainlab_core::pipeline::{AcquisitionStrategy, DiscountType, TracingObserver};
use chainlab_core::{Pipeline, PipelineConfig, Retrieval};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chainlab", about = "chainlab CLI: options chain acquisition and normalization")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch an options chain and export it as Parquet.
    Fetch {
        /// Ticker symbol (e.g., SPY). Optional when --config names one.
        ticker: Option<String>,

        /// Path to a TOML pipeline config.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Acquisition strategy: api, scrape or auto.
        #[arg(long)]
        strategy: Option<AcquisitionStrategy>,

        /// Seconds to wait between legacy page requests.
        #[arg(long)]
        wait: Option<f64>,

        /// Discount-rate variant: smooth or direct.
        #[arg(long)]
        discount: Option<DiscountType>,

        /// Reference date for the trading calendar (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        as_of: Option<String>,

        /// Output Parquet file for the canonical table.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Output JSON file for the run report.
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Adapt a precomputed Parquet table into the canonical schema.
    Adapt {
        /// Precomputed Parquet file.
        path: PathBuf,

        /// Discount-rate variant: smooth or direct.
        #[arg(long, default_value = "smooth")]
        discount: DiscountType,

        /// Ticker label for the report.
        #[arg(long, default_value = "PRECOMPUTED")]
        ticker: String,

        /// Output Parquet file for the canonical table.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Output JSON file for the run report.
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// List market holidays from a start date over the forward horizon.
    Calendar {
        /// Start date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        from: Option<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Fetch {
            ticker,
            config,
            strategy,
            wait,
            discount,
            as_of,
            output,
            report,
        } => {
            let mut pipeline_config = match (config, ticker.as_deref()) {
                (Some(path), _) => PipelineConfig::from_file(&path)
                    .with_context(|| format!("loading {}", path.display()))?,
                (None, Some(t)) => PipelineConfig::new(t),
                (None, None) => bail!("a ticker or --config is required"),
            };
            if let Some(t) = ticker {
                pipeline_config.ticker = t;
            }
            if let Some(s) = strategy {
                pipeline_config.strategy = s;
            }
            if let Some(w) = wait {
                pipeline_config.wait_secs = w;
            }
            if let Some(d) = discount {
                pipeline_config.discount_type = d;
            }
            if let Some(date) = as_of.as_deref() {
                pipeline_config.as_of = Some(parse_day(date)?);
            }
            run_fetch(pipeline_config, output.as_deref(), report.as_deref())
        }
        Commands::Adapt {
            path,
            discount,
            ticker,
            output,
            report,
        } => run_adapt(&path, discount, ticker, output.as_deref(), report.as_deref()),
        Commands::Calendar { from } => run_calendar(from.as_deref()),
    }
}

fn parse_day(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid date {s:?}"))
}

fn run_fetch(config: PipelineConfig, output: Option<&Path>, report: Option<&Path>) -> Result<()> {
    let circuit_breaker = Arc::new(CircuitBreaker::default_provider());
    let provider = YahooProvider::new(circuit_breaker);
    let pages = YahooPages::new();
    let observer = TracingObserver;

    let result = Pipeline::new(config, &provider, &pages)
        .with_observer(&observer)
        .run(None)?;

    finish(&result, output, report)
}

fn run_adapt(
    path: &Path,
    discount: DiscountType,
    ticker: String,
    output: Option<&Path>,
    report: Option<&Path>,
) -> Result<()> {
    let frame = read_frame(path).with_context(|| format!("reading {}", path.display()))?;

    let mut config = PipelineConfig::new(ticker);
    config.discount_type = discount;

    // The adapter path never touches the network collaborators.
    let provider = YahooProvider::new(Arc::new(CircuitBreaker::default_provider()));
    let pages = YahooPages::new();
    let observer = TracingObserver;

    let result = Pipeline::new(config, &provider, &pages)
        .with_observer(&observer)
        .run(Some(&frame))?;

    finish(&result, output, report)
}

fn finish(result: &Retrieval, output: Option<&Path>, report: Option<&Path>) -> Result<()> {
    print_summary(result);

    if let Some(path) = output {
        write_table(&result.table, path)?;
        println!("Table saved to: {}", path.display());
    }
    if let Some(path) = report {
        let json = serde_json::to_string_pretty(&result.report())?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        println!("Report saved to: {}", path.display());
    }
    Ok(())
}

fn print_summary(result: &Retrieval) {
    let report = result.report();
    println!("\n=== {} ({:?}) ===", report.ticker, report.source);
    println!("Spot:            {:.4} ({:?})", report.spot, report.spot_source);
    println!("Rows:            {} ({} calls, {} puts)", report.rows, report.calls, report.puts);
    println!("Expiries:        {}", report.expiries.len());
    println!("Dropped rows:    {}", report.dropped_rows);
    println!("Holidays ahead:  {}", report.holidays);

    if let Some(fault) = report.listing_fault {
        println!("Expiry listing failed: {fault:?}");
    }
    if let Some(fault) = report.discovery_fault {
        println!("Page discovery failed: {fault:?}");
    }
    if !report.failed_expiries.is_empty() {
        println!("\nFailed expiries:");
        for failed in &report.failed_expiries {
            println!("  {}  calls={:?} puts={:?}", failed.expiry, failed.calls, failed.puts);
        }
    }
    if !report.api_failed_expiries.is_empty() {
        println!("\nFailed over the API before falling back:");
        for failed in &report.api_failed_expiries {
            println!("  {}  calls={:?} puts={:?}", failed.expiry, failed.calls, failed.puts);
        }
    }
    if !report.url_failures.is_empty() {
        println!("\nUnreachable pages:");
        for (expiry, failure) in &report.url_failures {
            println!("  {expiry}  {:?}  {}", failure.fault, failure.url);
        }
    }
}

fn run_calendar(from: Option<&str>) -> Result<()> {
    let start = match from {
        Some(s) => parse_day(s)?,
        None => chrono::Local::now().date_naive(),
    };
    let calendar = TradingCalendar::build(start);

    println!(
        "Market holidays {} → {} ({} dates)",
        calendar.start(),
        calendar.end(),
        calendar.len()
    );
    for date in calendar.holidays() {
        println!("  {} {}", date, date.format("%a"));
    }
    Ok(())
}
