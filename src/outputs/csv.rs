//! CSV persistence for the link list and the details dataset.
//!
//! # Link file
//!
//! Written once per discovery run, replacing any previous content:
//!
//! ```text
//! index_number,company_url,region
//! 1,https://www.example.com/customer-stories/acme/,NA
//! ```
//!
//! The `region` column is omitted when discovery runs without regions. The
//! index is for human reference only and is ignored on read.
//!
//! # Details file
//!
//! Appended one row at a time so a crash keeps every finished row. The header
//! is written when the file is new or empty, never in the middle of a file.
//! Missing values are empty cells; `partners` holds a JSON array of strings.

use crate::models::{CompanyDetails, LinkRecord, UNKNOWN_REGION};
use serde::Serialize;
use std::collections::HashSet;
use std::error::Error;
use std::fs::{File, OpenOptions};
use std::path::Path;
use tracing::{debug, info, instrument, warn};

/// Column names of the link file.
pub const LINKS_HEADER: [&str; 3] = ["index_number", "company_url", "region"];

/// Column names of the details file.
pub const DETAILS_HEADER: [&str; 7] = [
    "company_name",
    "industry",
    "location",
    "partners",
    "person_quoted",
    "product_url",
    "region",
];

/// Write `records` to `path`, numbering rows from 1.
///
/// With `with_region` false only the index and url columns are written.
#[instrument(level = "info", skip(records), fields(count = records.len()))]
pub fn write_links(
    path: &Path,
    records: &[LinkRecord],
    with_region: bool,
) -> Result<(), Box<dyn Error>> {
    let mut writer = csv::Writer::from_path(path)?;

    if with_region {
        writer.write_record(LINKS_HEADER)?;
    } else {
        writer.write_record(&LINKS_HEADER[..2])?;
    }

    for (idx, record) in records.iter().enumerate() {
        let index = (idx + 1).to_string();
        if with_region {
            writer.write_record([index.as_str(), record.url.as_str(), record.region.as_str()])?;
        } else {
            writer.write_record([index.as_str(), record.url.as_str()])?;
        }
    }

    writer.flush()?;
    info!(path = %path.display(), "Links saved");
    Ok(())
}

/// Read a link file produced by [`write_links`].
///
/// Columns are looked up by name. A file without a `region` column gets
/// [`UNKNOWN_REGION`] for every row, and rows with an empty url are skipped.
#[instrument(level = "info")]
pub fn read_links(path: &Path) -> Result<Vec<LinkRecord>, Box<dyn Error>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let headers = reader.headers()?.clone();
    let url_idx = headers
        .iter()
        .position(|h| h == LINKS_HEADER[1])
        .ok_or_else(|| format!("{} has no {} column", path.display(), LINKS_HEADER[1]))?;
    let region_idx = headers.iter().position(|h| h == LINKS_HEADER[2]);
    if region_idx.is_none() {
        warn!(path = %path.display(), "Link file has no region column; using {}", UNKNOWN_REGION);
    }

    let mut links = Vec::new();
    for result in reader.records() {
        let record = result?;
        let url = record.get(url_idx).unwrap_or_default();
        if url.is_empty() {
            debug!(?record, "Skipping row without a url");
            continue;
        }
        let region = region_idx
            .and_then(|idx| record.get(idx))
            .unwrap_or(UNKNOWN_REGION);
        links.push(LinkRecord::new(url, region));
    }

    info!(count = links.len(), "Read links");
    Ok(links)
}

/// Row layout of the details file.
#[derive(Debug, Serialize)]
struct DetailsRow<'a> {
    company_name: Option<&'a str>,
    industry: Option<&'a str>,
    location: Option<&'a str>,
    partners: Option<String>,
    person_quoted: Option<&'a str>,
    product_url: &'a str,
    region: &'a str,
}

impl<'a> DetailsRow<'a> {
    fn from_details(details: &'a CompanyDetails) -> Result<Self, serde_json::Error> {
        let partners = details
            .partners
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        Ok(Self {
            company_name: details.company_name.as_deref(),
            industry: details.industry.as_deref(),
            location: details.location.as_deref(),
            partners,
            person_quoted: details.person_quoted.as_deref(),
            product_url: &details.product_url,
            region: &details.region,
        })
    }
}

/// Appends details rows to a CSV file, flushing after every row.
pub struct DetailsWriter {
    writer: csv::Writer<File>,
}

impl DetailsWriter {
    /// Open `path` for appending, creating it and writing the header if it
    /// is missing or empty.
    #[instrument(level = "info")]
    pub fn open(path: &Path) -> Result<Self, Box<dyn Error>> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let is_empty = file.metadata()?.len() == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if is_empty {
            writer.write_record(DETAILS_HEADER)?;
            writer.flush()?;
            debug!("Wrote details header");
        } else {
            info!("Appending to existing details file");
        }

        Ok(Self { writer })
    }

    /// Append one row and flush it to disk.
    pub fn append(&mut self, details: &CompanyDetails) -> Result<(), Box<dyn Error>> {
        let row = DetailsRow::from_details(details)?;
        self.writer.serialize(row)?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Read a details file back into [`CompanyDetails`] rows.
pub fn read_details(path: &Path) -> Result<Vec<CompanyDetails>, Box<dyn Error>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();

    for result in reader.records() {
        let record = result?;
        let cell = |idx: usize| {
            record
                .get(idx)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        let partners = cell(3)
            .map(|json| serde_json::from_str::<Vec<String>>(&json))
            .transpose()?;

        rows.push(CompanyDetails {
            company_name: cell(0),
            industry: cell(1),
            location: cell(2),
            partners,
            person_quoted: cell(4),
            product_url: cell(5).unwrap_or_default(),
            region: cell(6).unwrap_or_default(),
        });
    }

    Ok(rows)
}

/// Drop the links whose url already has a row in the details file at `path`.
///
/// A missing details file leaves `links` untouched.
#[instrument(level = "info", skip(links), fields(count = links.len()))]
pub fn remaining_links(
    links: Vec<LinkRecord>,
    path: &Path,
) -> Result<Vec<LinkRecord>, Box<dyn Error>> {
    if !path.exists() {
        return Ok(links);
    }

    let done: HashSet<String> = read_details(path)?
        .into_iter()
        .map(|row| row.product_url)
        .collect();
    let before = links.len();
    let remaining: Vec<LinkRecord> = links
        .into_iter()
        .filter(|link| !done.contains(&link.url))
        .collect();

    info!(
        already_done = before - remaining.len(),
        remaining = remaining.len(),
        "Resuming from existing details file"
    );
    Ok(remaining)
}
