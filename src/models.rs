//! Data models for discovered story links and extracted company details.
//!
//! This module defines the core data structures used throughout the application:
//! - [`LinkRecord`]: A story URL and its region tag, produced by link discovery
//! - [`SidebarFields`]: The labeled values read from a story page's sidebar
//! - [`CompanyDetails`]: One fully extracted row of the final dataset
//!
//! Every extracted field is optional. A story page that lacks the markup for a
//! field yields `None` for it, which is a normal outcome and not an error.

/// Region recorded when a story card carries no region tag.
pub const UNKNOWN_REGION: &str = "Unknown";

/// A customer story URL together with the region label shown on its card.
///
/// Records are created once per harvested card and never modified. Two
/// records are duplicates only when both the URL and the region match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LinkRecord {
    /// Absolute URL of the customer story page.
    pub url: String,
    /// Region label from the story card (e.g. "NA", "EMEA").
    pub region: String,
}

impl LinkRecord {
    pub fn new(url: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            region: region.into(),
        }
    }
}

/// Values read from the "Customer:", "Industry:" and "Location:" sidebar lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SidebarFields {
    pub company_name: Option<String>,
    pub industry: Option<String>,
    pub location: Option<String>,
}

/// Structured details extracted from a single customer story page.
///
/// `product_url` identifies the row; `region` is carried over from the
/// [`LinkRecord`] that pointed at the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyDetails {
    /// The customer's name, taken from the link in the "Customer:" line.
    pub company_name: Option<String>,
    /// The text after "Industry:" in the sidebar.
    pub industry: Option<String>,
    /// The text after "Location:" in the sidebar.
    pub location: Option<String>,
    /// Partner names in the order they appear on the page.
    pub partners: Option<Vec<String>>,
    /// The speaker line of the page's customer quote.
    pub person_quoted: Option<String>,
    /// The story page that was scraped.
    pub product_url: String,
    /// Region label of the story card.
    pub region: String,
}

impl CompanyDetails {
    /// Start a record with every extracted field unset.
    pub fn new(product_url: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            company_name: None,
            industry: None,
            location: None,
            partners: None,
            person_quoted: None,
            product_url: product_url.into(),
            region: region.into(),
        }
    }

    /// Copy the sidebar values into this record.
    pub fn apply_sidebar(&mut self, sidebar: SidebarFields) {
        self.company_name = sidebar.company_name;
        self.industry = sidebar.industry;
        self.location = sidebar.location;
    }
}

/// Outcome counts of a detail extraction run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Rows successfully extracted and appended.
    pub processed: usize,
    /// URLs whose fetch or write failed.
    pub failed: usize,
    /// URLs skipped because they were already processed in this run.
    pub skipped: usize,
}
