//! Customer story detail extraction.
//!
//! Each story page carries a sidebar of labeled lines, a partner list and a
//! customer quote. This module reads them into a [`CompanyDetails`] row:
//!
//! | Field | Source |
//! |-------|--------|
//! | `company_name` | link inside the sidebar's `Customer:` line |
//! | `industry` | text after `Industry:` in the sidebar |
//! | `location` | text after `Location:` in the sidebar |
//! | `partners` | partner container links, per [`Layout`] |
//! | `person_quoted` | quote speaker line, per [`Layout`] |
//!
//! Every pass is independent and best effort. A page missing one block still
//! yields the others, and a page missing all of them yields a row of `None`s.

use crate::http::PageFetcher;
use crate::models::{CompanyDetails, LinkRecord, RunSummary, SidebarFields};
use crate::outputs::csv::DetailsWriter;
use crate::scrapers::layouts::{LAYOUTS, Layout, element_text, first_match, selector};
use crate::utils::{random_delay, truncate_for_log};
use rand::Rng;
use scraper::{ElementRef, Html};
use std::collections::HashSet;
use std::error::Error;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

const SIDEBAR: &str = "div.cs-sidebar-item";
const SIDEBAR_LINE: &str = "p.mb-0";
const CUSTOMER_LABEL: &str = "Customer:";
const INDUSTRY_LABEL: &str = "Industry:";
const LOCATION_LABEL: &str = "Location:";

/// Pacing of the extraction loop.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Shortest pause before each request.
    pub min_delay: Duration,
    /// Longest pause before each request.
    pub max_delay: Duration,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(5),
        }
    }
}

/// Read company name, industry and location from the page sidebar.
///
/// Only the first sidebar block is inspected. Each `p.mb-0` line is tested
/// against all three labels; when several lines match the same label, the
/// last non-empty value wins.
pub fn extract_sidebar_fields(doc: &Html) -> SidebarFields {
    let mut fields = SidebarFields::default();

    let Some(sidebar) = first_match(doc, SIDEBAR) else {
        debug!("No sidebar on page");
        return fields;
    };
    let Some(line_selector) = selector(SIDEBAR_LINE) else {
        return fields;
    };

    for line in sidebar.select(&line_selector) {
        let text = element_text(&line);

        if let Some(name) = company_name(&line, &text) {
            fields.company_name = Some(name);
        }
        if let Some(industry) = labeled_value(&text, INDUSTRY_LABEL) {
            fields.industry = Some(industry);
        }
        if let Some(location) = labeled_value(&text, LOCATION_LABEL) {
            fields.location = Some(location);
        }
    }

    fields
}

/// The company name is the text of the link in a `Customer:` line.
fn company_name(line: &ElementRef<'_>, text: &str) -> Option<String> {
    if !text.contains(CUSTOMER_LABEL) {
        return None;
    }
    let anchor = selector("a")?;
    let link = line.select(&anchor).next()?;
    let name = element_text(&link).trim().to_string();
    (!name.is_empty()).then_some(name)
}

/// Text after the last occurrence of `label`, or `None` if it is blank.
fn labeled_value(text: &str, label: &str) -> Option<String> {
    let (_, value) = text.rsplit_once(label)?;
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Partner names from the first layout whose container lists any.
pub fn extract_partners(doc: &Html) -> Option<Vec<String>> {
    LAYOUTS.iter().find_map(|layout| {
        let partners = layout.partners(doc);
        if partners.is_none() {
            debug!(?layout, "No partners in layout");
        }
        partners
    })
}

/// The quoted speaker from the first layout that has a quote block.
pub fn extract_quote(doc: &Html) -> Option<String> {
    LAYOUTS.iter().find_map(|layout: &Layout| layout.quote(doc))
}

/// Build a [`CompanyDetails`] row from an already parsed story page.
pub fn parse_details(doc: &Html, url: &str, region: &str) -> CompanyDetails {
    let mut details = CompanyDetails::new(url, region);
    details.apply_sidebar(extract_sidebar_fields(doc));
    details.partners = extract_partners(doc);
    details.person_quoted = extract_quote(doc);
    details
}

/// Fetch a story page and extract its details.
#[instrument(level = "info", skip(fetcher))]
pub async fn extract_details<R: Rng>(
    fetcher: &mut PageFetcher<R>,
    url: &str,
    region: &str,
) -> Result<CompanyDetails, Box<dyn Error>> {
    let doc = fetcher.fetch_page(url).await?;
    let details = parse_details(&doc, url, region);
    debug!(?details, "Extracted story details");
    Ok(details)
}

/// Extract every link in turn and append each row to `sink` as it is produced.
///
/// The loop pauses a random interval within the configured bounds before
/// every request. A failed URL is logged and skipped; it never stops the
/// batch. A URL already processed earlier in the same run is skipped.
#[instrument(level = "info", skip_all, fields(links = links.len()))]
pub async fn process_links<R: Rng>(
    links: &[LinkRecord],
    fetcher: &mut PageFetcher<R>,
    sink: &mut DetailsWriter,
    options: &ExtractOptions,
) -> RunSummary {
    let mut summary = RunSummary::default();
    let mut seen: HashSet<&str> = HashSet::new();

    for link in links {
        if !seen.insert(link.url.as_str()) {
            warn!(url = %link.url, "URL already processed in this run; skipping");
            summary.skipped += 1;
            continue;
        }

        let delay = random_delay(options.min_delay, options.max_delay).await;

        let details = match extract_details(fetcher, &link.url, &link.region).await {
            Ok(details) => details,
            Err(e) => {
                error!(
                    url = %link.url,
                    error = %truncate_for_log(&e.to_string(), 300),
                    "Error processing URL"
                );
                summary.failed += 1;
                continue;
            }
        };

        if let Err(e) = sink.append(&details) {
            error!(url = %link.url, error = %e, "Failed to append row");
            summary.failed += 1;
            continue;
        }

        summary.processed += 1;
        info!(
            url = %link.url,
            waited_ms = delay.as_millis() as u64,
            "Successfully scraped and saved data"
        );
    }

    info!(
        processed = summary.processed,
        failed = summary.failed,
        skipped = summary.skipped,
        "Detail extraction finished"
    );
    summary
}
