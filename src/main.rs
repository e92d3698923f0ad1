//! # Story Harvest
//!
//! A two-stage scraping pipeline for a customer story site. It collects the
//! links of every story matching a product filter, then extracts structured
//! company details from each story page into a CSV dataset.
//!
//! ## Features
//!
//! - Drives headless Chrome through the listing's filter panel and infinite
//!   scroll to find every matching story card and its region
//! - Fetches story pages over plain HTTP with a rotating user agent and a
//!   randomized pause between requests
//! - Reads both the legacy and the current story page markup
//! - Appends each details row as soon as it is extracted, so an interrupted
//!   run keeps its progress and `--resume` picks up where it stopped
//!
//! ## Usage
//!
//! ```sh
//! story_harvest discover
//! story_harvest extract --resume
//! story_harvest run
//! ```
//!
//! ## Architecture
//!
//! 1. **Discovery**: browser session → category filter → scroll → link file
//! 2. **Extraction**: link file → fetch each page → parse → append details row

use clap::Parser;
use std::error::Error;
use std::path::Path;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod browser;
mod cli;
mod http;
mod models;
mod outputs;
mod scrapers;
mod utils;

use browser::ChromeSession;
use cli::{Cli, Command, DiscoverArgs, ExtractArgs};
use http::{PageFetcher, UserAgentPool};
use models::RunSummary;
use outputs::csv::{DetailsWriter, read_links, remaining_links, write_links};
use scrapers::{details, discovery};
use utils::ensure_writable_parent;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("story_harvest starting up");

    let Cli { links, command } = Cli::parse();
    debug!(links = %links.display(), ?command, "Parsed CLI arguments");

    match command {
        Command::Discover(args) => {
            run_discovery(&links, &args).await?;
        }
        Command::Extract(args) => {
            run_extraction(&links, &args).await?;
        }
        Command::Run { discover, extract } => {
            if run_discovery(&links, &discover).await? == 0 {
                warn!("No links discovered; skipping detail extraction");
            } else {
                run_extraction(&links, &extract).await?;
            }
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    Ok(())
}

/// Run link discovery and write the link file.
///
/// Browser failures end the stage with zero links instead of an error; only an
/// unwritable link file is fatal. Returns the number of links written.
#[instrument(level = "info", skip_all, fields(links = %links.display()))]
async fn run_discovery(links: &Path, args: &DiscoverArgs) -> Result<usize, Box<dyn Error>> {
    ensure_writable_parent(links).await?;

    let session = match ChromeSession::launch(&args.launch_options()).await {
        Ok(session) => session,
        Err(e) => {
            error!(error = %e, "Error during the scraping process");
            warn!("No data found. Scraping failed.");
            return Ok(0);
        }
    };

    let records = discovery::discover(session.page(), &args.discovery_options()).await;

    if let Err(e) = session.close().await {
        warn!(error = %e, "Failed to close browser");
    }

    if records.is_empty() {
        warn!("No data found. Scraping failed.");
        return Ok(0);
    }

    write_links(links, &records, !args.no_region)?;
    Ok(records.len())
}

/// Extract details for every link in the link file.
#[instrument(level = "info", skip_all, fields(output = %args.output.display()))]
async fn run_extraction(links: &Path, args: &ExtractArgs) -> Result<RunSummary, Box<dyn Error>> {
    ensure_writable_parent(&args.output).await?;

    let mut pending = read_links(links)?;
    if args.resume {
        pending = remaining_links(pending, &args.output)?;
    }

    let mut fetcher = PageFetcher::new(UserAgentPool::new(args.user_agents.clone()));
    let mut sink = DetailsWriter::open(&args.output)?;
    let summary =
        details::process_links(&pending, &mut fetcher, &mut sink, &args.extract_options()).await;

    info!(
        path = %args.output.display(),
        processed = summary.processed,
        failed = summary.failed,
        "Scraping complete! All data has been saved"
    );
    Ok(summary)
}
