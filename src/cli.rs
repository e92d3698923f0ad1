//! Command-line interface definitions for the story harvester.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Paths and the listing URL can also come from environment variables. Every
//! default reproduces the values the pipeline was first run with, so running
//! a subcommand without flags does the usual job.

use crate::browser::LaunchOptions;
use crate::scrapers::details::ExtractOptions;
use crate::scrapers::discovery::{
    DEFAULT_CATEGORIES, DEFAULT_LISTING_URL, DiscoveryOptions, ScrollTiming,
};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Command-line arguments for the story harvester.
///
/// # Examples
///
/// ```sh
/// # Discover links, then extract details
/// story_harvest discover
/// story_harvest extract
///
/// # Both stages in one go, continuing an interrupted details file
/// story_harvest run --resume
///
/// # Custom files and a single category
/// story_harvest --links out/links.csv discover --category genesys+cloud
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Link file written by discovery and read by extraction
    #[arg(long, global = true, env = "STORY_LINKS_FILE", default_value = "Data/company_links.csv")]
    pub links: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Collect story links and regions from the listing page
    Discover(DiscoverArgs),
    /// Extract company details for every link in the link file
    Extract(ExtractArgs),
    /// Discover links, then extract details
    Run {
        #[command(flatten)]
        discover: DiscoverArgs,
        #[command(flatten)]
        extract: ExtractArgs,
    },
}

#[derive(Args, Debug, Clone)]
pub struct DiscoverArgs {
    /// Story listing page
    #[arg(long, env = "STORY_LISTING_URL", default_value = DEFAULT_LISTING_URL)]
    pub listing_url: String,

    /// Product category checkbox id to select (repeatable)
    #[arg(long = "category", default_values_t = DEFAULT_CATEGORIES.map(String::from))]
    pub categories: Vec<String>,

    /// Write only index and url columns to the link file
    #[arg(long)]
    pub no_region: bool,

    /// Seconds to wait after selecting categories
    #[arg(long, default_value = "20", value_parser = parse_secs)]
    pub settle_secs: Duration,

    /// Seconds to wait after each scroll
    #[arg(long, default_value = "2", value_parser = parse_secs)]
    pub scroll_wait_secs: Duration,

    /// Upper bound on scrolls per pass over the listing
    #[arg(long, default_value_t = 500)]
    pub max_scrolls: usize,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Chrome/Chromium executable (autodetected when omitted)
    #[arg(long, env = "CHROME_PATH")]
    pub chrome_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    /// Details file to append rows to
    #[arg(short, long, env = "STORY_DETAILS_FILE", default_value = "Data/company_data.csv")]
    pub output: PathBuf,

    /// Shortest pause between requests, in seconds
    #[arg(long, default_value = "2", value_parser = parse_secs)]
    pub min_delay_secs: Duration,

    /// Longest pause between requests, in seconds
    #[arg(long, default_value = "5", value_parser = parse_secs)]
    pub max_delay_secs: Duration,

    /// User-agent string to rotate through (repeatable; replaces the built-in pool)
    #[arg(long = "user-agent")]
    pub user_agents: Vec<String>,

    /// Skip links whose url is already in the details file
    #[arg(long)]
    pub resume: bool,
}

impl DiscoverArgs {
    pub fn discovery_options(&self) -> DiscoveryOptions {
        DiscoveryOptions {
            listing_url: self.listing_url.clone(),
            category_ids: self.categories.clone(),
            timing: ScrollTiming {
                settle_wait: self.settle_secs,
                scroll_wait: self.scroll_wait_secs,
                max_scrolls: self.max_scrolls,
                ..ScrollTiming::default()
            },
        }
    }

    pub fn launch_options(&self) -> LaunchOptions {
        LaunchOptions {
            headed: self.headed,
            chrome_path: self.chrome_path.clone(),
        }
    }
}

impl ExtractArgs {
    pub fn extract_options(&self) -> ExtractOptions {
        ExtractOptions {
            min_delay: self.min_delay_secs,
            max_delay: self.max_delay_secs,
        }
    }
}

/// Parse a non-negative number of seconds, fractions allowed.
fn parse_secs(s: &str) -> Result<Duration, String> {
    let secs: f64 = s
        .trim()
        .parse()
        .map_err(|_| format!("`{s}` is not a number of seconds"))?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(format!("`{s}` must be a non-negative number of seconds"));
    }
    Ok(Duration::from_secs_f64(secs))
}
