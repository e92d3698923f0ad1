//! Customer story link discovery.
//!
//! The listing page loads story cards lazily as the visitor scrolls, and the
//! product filter hides non-matching cards by tagging them with
//! `filtered-item` rather than removing them. Discovery therefore runs in
//! three steps:
//!
//! 1. **Filter**: expand the products accordion and tick each category box
//! 2. **Load**: scroll to the bottom until the page stops growing
//! 3. **Harvest**: scroll back to the top and walk down again, collecting the
//!    link and region of every card not tagged as filtered
//!
//! The separate load pass exists because the filtered card set only settles
//! once every lazy batch has rendered; harvesting during the first descent
//! misses cards.
//!
//! Both scroll loops stop on the end-of-page predicate and are also capped at
//! [`ScrollTiming::max_scrolls`] so a page that keeps growing cannot hold the
//! run forever. Browser failures are logged and turned into an empty result.

use crate::browser::{BrowserPage, PageElement};
use crate::models::{LinkRecord, UNKNOWN_REGION};
use itertools::Itertools;
use std::error::Error;
use std::fmt::Write;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

/// Default listing page.
pub const DEFAULT_LISTING_URL: &str = "https://www.genesys.com/customer-stories";

/// Checkbox ids of the "Genesys Cloud" and "Genesys Cloud EX" product filters.
pub const DEFAULT_CATEGORIES: [&str; 2] = ["genesys+cloud", "genesys+cloud+ex"];

pub const FILTER_ACCORDION: &str = "div.accordion#cs-filter";
pub const PRODUCTS_SECTION: &str = "div#tax_products_programs.check-group.accordion-item";
pub const ACCORDION_BUTTON: &str = "button.accordion-button";
pub const STORY_CARD: &str = "div.row.gutter-small div.grid-item.card-col:not(.filtered-item)";
pub const CARD_LINK: &str = "a.card.component";
pub const CARD_REGION: &str = "p.cs-region.assettag.mb-0";

pub const SCROLL_TO_BOTTOM: &str = "window.scrollTo(0, document.body.scrollHeight)";
pub const SCROLL_TO_TOP: &str = "window.scrollTo(0, 0)";
pub const END_OF_PAGE: &str = "window.scrollY + window.innerHeight >= document.body.scrollHeight";

/// Waits and bounds used while driving the listing page.
#[derive(Debug, Clone)]
pub struct ScrollTiming {
    /// Pause after expanding the filter accordion.
    pub expand_wait: Duration,
    /// Pause after ticking the category boxes, for the listing to re-render.
    pub settle_wait: Duration,
    /// Pause after each scroll, for lazy content to load.
    pub scroll_wait: Duration,
    /// Most scrolls performed by a single scroll loop.
    pub max_scrolls: usize,
}

impl Default for ScrollTiming {
    fn default() -> Self {
        Self {
            expand_wait: Duration::from_secs(1),
            settle_wait: Duration::from_secs(20),
            scroll_wait: Duration::from_secs(2),
            max_scrolls: 500,
        }
    }
}

/// Everything a discovery run needs.
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    pub listing_url: String,
    pub category_ids: Vec<String>,
    pub timing: ScrollTiming,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            listing_url: DEFAULT_LISTING_URL.to_string(),
            category_ids: DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect(),
            timing: ScrollTiming::default(),
        }
    }
}

/// Selector of the filter checkbox whose id is `category_id`.
///
/// Ids such as `genesys+cloud` contain characters that are special in CSS, so
/// they are escaped (`#genesys\+cloud`).
pub fn checkbox_selector(category_id: &str) -> String {
    let mut escaped = String::with_capacity(category_id.len() + 4);
    for (i, c) in category_id.chars().enumerate() {
        if i == 0 && c.is_ascii_digit() {
            let _ = write!(escaped, "\\{:x} ", c as u32);
        } else if c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii() {
            escaped.push(c);
        } else {
            escaped.push('\\');
            escaped.push(c);
        }
    }
    format!("input[type='checkbox']#{escaped}")
}

/// Tick the product category checkboxes in the listing's filter panel.
///
/// Expands the products section when it is collapsed, then checks every
/// category box that exists. A missing box is logged and skipped. Returns
/// `false` only when the filter panel or its products section is absent, or
/// when the browser fails.
#[instrument(level = "info", skip(page, timing))]
pub async fn apply_category_filter<P: BrowserPage>(
    page: &P,
    category_ids: &[String],
    timing: &ScrollTiming,
) -> bool {
    match try_apply_category_filter(page, category_ids, timing).await {
        Ok(applied) => applied,
        Err(e) => {
            error!(error = %e, "Error in selecting category filters");
            false
        }
    }
}

async fn try_apply_category_filter<P: BrowserPage>(
    page: &P,
    category_ids: &[String],
    timing: &ScrollTiming,
) -> Result<bool, Box<dyn Error>> {
    let Some(accordion) = page.query_first(FILTER_ACCORDION).await? else {
        warn!("Main accordion not found");
        return Ok(false);
    };
    debug!("Found main accordion");

    let Some(section) = accordion.find_first(PRODUCTS_SECTION).await? else {
        warn!("Products filter section not found");
        return Ok(false);
    };
    debug!("Found products filter section");

    if let Some(button) = section.find_first(ACCORDION_BUTTON).await? {
        if button.attribute("aria-expanded").await?.as_deref() == Some("false") {
            button.click().await?;
            page.wait(timing.expand_wait).await;
            debug!("Expanded products filter section");
        }
    }

    for category in category_ids {
        match section.find_first(&checkbox_selector(category)).await? {
            Some(checkbox) => {
                if !checkbox.is_checked().await? {
                    checkbox.click().await?;
                }
                info!(%category, "Category checkbox selected");
            }
            None => warn!(%category, "Category checkbox not found"),
        }
    }

    page.wait(timing.settle_wait).await;
    Ok(true)
}

/// Scroll through the whole listing and collect every unfiltered card.
///
/// Relative hrefs are resolved against `base` when one is given. Returns an
/// empty list if the browser fails at any point.
#[instrument(level = "info", skip_all)]
pub async fn collect_links_and_regions<P: BrowserPage>(
    page: &P,
    base: Option<&Url>,
    timing: &ScrollTiming,
) -> Vec<LinkRecord> {
    match try_collect_links_and_regions(page, base, timing).await {
        Ok(records) => {
            info!(count = records.len(), "Collected story cards");
            records
        }
        Err(e) => {
            error!(error = %e, "Error while scraping customer story links and regions");
            Vec::new()
        }
    }
}

async fn try_collect_links_and_regions<P: BrowserPage>(
    page: &P,
    base: Option<&Url>,
    timing: &ScrollTiming,
) -> Result<Vec<LinkRecord>, Box<dyn Error>> {
    // Load every lazy batch before looking at the cards.
    let mut scrolls = 0;
    loop {
        if scrolls >= timing.max_scrolls {
            warn!(scrolls, "Scroll limit reached while loading the listing");
            break;
        }
        scrolls += 1;
        if scroll_step(page, timing).await? {
            break;
        }
    }
    info!(scrolls, "Reached the end of the listing");

    page.evaluate(SCROLL_TO_TOP).await?;
    page.wait(timing.scroll_wait).await;

    let mut records = Vec::new();
    let mut scrolls = 0;
    loop {
        records.extend(harvest_cards(page, base).await?);
        if scrolls >= timing.max_scrolls {
            warn!(scrolls, "Scroll limit reached while harvesting the listing");
            break;
        }
        scrolls += 1;
        if scroll_step(page, timing).await? {
            break;
        }
    }
    debug!(scrolls, harvested = records.len(), "Harvest pass finished");

    Ok(records)
}

/// Scroll to the bottom, let the page load, and report whether it stopped growing.
async fn scroll_step<P: BrowserPage>(page: &P, timing: &ScrollTiming) -> Result<bool, Box<dyn Error>> {
    page.evaluate(SCROLL_TO_BOTTOM).await?;
    page.wait(timing.scroll_wait).await;
    let at_end = page.evaluate(END_OF_PAGE).await?;
    Ok(at_end.as_bool().unwrap_or(false))
}

/// Link and region of every unfiltered card currently in the DOM.
async fn harvest_cards<P: BrowserPage>(
    page: &P,
    base: Option<&Url>,
) -> Result<Vec<LinkRecord>, Box<dyn Error>> {
    let cards = page.query_all(STORY_CARD).await?;
    let mut records = Vec::with_capacity(cards.len());

    for card in cards {
        let href = match card.find_first(CARD_LINK).await? {
            Some(link) => link.attribute("href").await?,
            None => None,
        };
        let Some(href) = href.filter(|h| !h.trim().is_empty()) else {
            continue;
        };

        let region = match card.find_first(CARD_REGION).await? {
            Some(tag) => tag.text().await?,
            None => None,
        };
        let region = region
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| UNKNOWN_REGION.to_string());

        records.push(LinkRecord::new(resolve(base, href.trim()), region));
    }

    Ok(records)
}

fn resolve(base: Option<&Url>, href: &str) -> String {
    base.and_then(|b| b.join(href).ok())
        .map(|u| u.to_string())
        .unwrap_or_else(|| href.to_string())
}

/// Collapse exact duplicate `(url, region)` pairs, keeping first-seen order.
pub fn dedup_links(records: Vec<LinkRecord>) -> Vec<LinkRecord> {
    records.into_iter().unique().collect()
}

/// Open the listing, apply the category filter and collect unique links.
///
/// Returns an empty list when navigation fails, the filter cannot be applied
/// or no cards are found.
#[instrument(level = "info", skip_all, fields(url = %options.listing_url))]
pub async fn discover<P: BrowserPage>(page: &P, options: &DiscoveryOptions) -> Vec<LinkRecord> {
    if let Err(e) = page.goto(&options.listing_url).await {
        error!(error = %e, "Failed to open listing page");
        return Vec::new();
    }

    if !apply_category_filter(page, &options.category_ids, &options.timing).await {
        warn!("Failed to apply category filter");
        return Vec::new();
    }

    let base = Url::parse(&options.listing_url).ok();
    let records = collect_links_and_regions(page, base.as_ref(), &options.timing).await;
    let harvested = records.len();
    let unique = dedup_links(records);
    info!(harvested, unique = unique.len(), "Discovered story links");
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    /// An element whose descendants are registered under the exact selector
    /// string the code under test will ask for.
    #[derive(Clone, Default)]
    struct SimElement {
        name: String,
        attrs: Vec<(String, String)>,
        text: Option<String>,
        children: Vec<(String, SimElement)>,
        checked: Rc<Cell<bool>>,
        log: Log,
    }

    impl SimElement {
        fn new(name: &str, log: &Log) -> Self {
            Self {
                name: name.to_string(),
                log: Rc::clone(log),
                ..Default::default()
            }
        }

        fn attr(mut self, key: &str, value: &str) -> Self {
            self.attrs.push((key.to_string(), value.to_string()));
            self
        }

        fn text(mut self, text: &str) -> Self {
            self.text = Some(text.to_string());
            self
        }

        fn child(mut self, selector: &str, child: SimElement) -> Self {
            self.children.push((selector.to_string(), child));
            self
        }
    }

    impl PageElement for SimElement {
        async fn find_first(&self, selector: &str) -> Result<Option<Self>, Box<dyn Error>> {
            Ok(self.find_all(selector).await?.into_iter().next())
        }

        async fn find_all(&self, selector: &str) -> Result<Vec<Self>, Box<dyn Error>> {
            Ok(self
                .children
                .iter()
                .filter(|(s, _)| s == selector)
                .map(|(_, c)| c.clone())
                .collect())
        }

        async fn attribute(&self, name: &str) -> Result<Option<String>, Box<dyn Error>> {
            Ok(self
                .attrs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone()))
        }

        async fn text(&self) -> Result<Option<String>, Box<dyn Error>> {
            Ok(self.text.clone())
        }

        async fn click(&self) -> Result<(), Box<dyn Error>> {
            self.log.borrow_mut().push(format!("click {}", self.name));
            self.checked.set(!self.checked.get());
            Ok(())
        }

        async fn is_checked(&self) -> Result<bool, Box<dyn Error>> {
            Ok(self.checked.get())
        }
    }

    /// A listing page that grows by one batch per bottom scroll until
    /// `pending_loads` runs out.
    struct SimPage {
        log: Log,
        accordion: Option<SimElement>,
        cards: Vec<SimElement>,
        pending_loads: Cell<usize>,
        at_bottom: Cell<bool>,
        broken: bool,
    }

    impl SimPage {
        fn new(log: &Log, pending_loads: usize) -> Self {
            Self {
                log: Rc::clone(log),
                accordion: None,
                cards: Vec::new(),
                pending_loads: Cell::new(pending_loads),
                at_bottom: Cell::new(false),
                broken: false,
            }
        }

        fn events(&self, name: &str) -> usize {
            self.log.borrow().iter().filter(|e| *e == name).count()
        }
    }

    impl BrowserPage for SimPage {
        type Element = SimElement;

        async fn goto(&self, url: &str) -> Result<(), Box<dyn Error>> {
            self.log.borrow_mut().push(format!("goto {url}"));
            Ok(())
        }

        async fn query_all(&self, selector: &str) -> Result<Vec<SimElement>, Box<dyn Error>> {
            Ok(match selector {
                FILTER_ACCORDION => self.accordion.clone().into_iter().collect(),
                STORY_CARD => self.cards.clone(),
                _ => Vec::new(),
            })
        }

        async fn evaluate(&self, script: &str) -> Result<Value, Box<dyn Error>> {
            if self.broken {
                return Err("target closed".into());
            }
            match script {
                SCROLL_TO_BOTTOM => {
                    self.log.borrow_mut().push("bottom".to_string());
                    let pending = self.pending_loads.get();
                    if pending > 0 {
                        self.pending_loads.set(pending - 1);
                        self.at_bottom.set(false);
                    } else {
                        self.at_bottom.set(true);
                    }
                    Ok(Value::Null)
                }
                SCROLL_TO_TOP => {
                    self.log.borrow_mut().push("top".to_string());
                    self.at_bottom.set(false);
                    Ok(Value::Null)
                }
                END_OF_PAGE => Ok(Value::Bool(self.at_bottom.get())),
                other => Err(format!("unexpected script: {other}").into()),
            }
        }

        async fn wait(&self, duration: Duration) {
            self.log.borrow_mut().push(format!("wait {}", duration.as_millis()));
        }
    }

    fn fast_timing() -> ScrollTiming {
        ScrollTiming {
            expand_wait: Duration::from_millis(1),
            settle_wait: Duration::from_millis(20),
            scroll_wait: Duration::from_millis(2),
            max_scrolls: 50,
        }
    }

    fn card(log: &Log, href: Option<&str>, region: Option<&str>) -> SimElement {
        let mut card = SimElement::new("card", log);
        if let Some(href) = href {
            card = card.child(CARD_LINK, SimElement::new("link", log).attr("href", href));
        }
        if let Some(region) = region {
            card = card.child(CARD_REGION, SimElement::new("region", log).text(region));
        }
        card
    }

    fn filter_panel(log: &Log, expanded: &str, boxes: &[(&str, bool)]) -> SimElement {
        let mut section = SimElement::new("section", log).child(
            ACCORDION_BUTTON,
            SimElement::new("button", log).attr("aria-expanded", expanded),
        );
        for (id, checked) in boxes {
            let checkbox = SimElement::new(id, log);
            checkbox.checked.set(*checked);
            section = section.child(&checkbox_selector(id), checkbox);
        }
        SimElement::new("accordion", log).child(PRODUCTS_SECTION, section)
    }

    fn categories() -> Vec<String> {
        DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_checkbox_selector_escapes_css() {
        assert_eq!(
            checkbox_selector("genesys+cloud"),
            r"input[type='checkbox']#genesys\+cloud"
        );
        assert_eq!(
            checkbox_selector("genesys+cloud+ex"),
            r"input[type='checkbox']#genesys\+cloud\+ex"
        );
        assert_eq!(checkbox_selector("plain-id_1"), "input[type='checkbox']#plain-id_1");
        assert_eq!(checkbox_selector("9lives"), r"input[type='checkbox']#\39 lives");
    }

    #[test]
    fn test_checkbox_selectors_parse() {
        for id in DEFAULT_CATEGORIES {
            assert!(scraper::Selector::parse(&checkbox_selector(id)).is_ok());
        }
        assert!(scraper::Selector::parse(STORY_CARD).is_ok());
        assert!(scraper::Selector::parse(PRODUCTS_SECTION).is_ok());
    }

    #[tokio::test]
    async fn test_filter_expands_and_checks_present_boxes() {
        let log = Log::default();
        let mut page = SimPage::new(&log, 0);
        page.accordion = Some(filter_panel(&log, "false", &[("genesys+cloud", false)]));

        let applied = apply_category_filter(&page, &categories(), &fast_timing()).await;

        assert!(applied, "a missing category must not fail the filter");
        let events = log.borrow().clone();
        assert_eq!(
            events,
            vec!["click button", "wait 1", "click genesys+cloud", "wait 20"]
        );
    }

    #[tokio::test]
    async fn test_filter_leaves_expanded_section_and_checked_boxes_alone() {
        let log = Log::default();
        let mut page = SimPage::new(&log, 0);
        page.accordion = Some(filter_panel(
            &log,
            "true",
            &[("genesys+cloud", true), ("genesys+cloud+ex", false)],
        ));

        assert!(apply_category_filter(&page, &categories(), &fast_timing()).await);
        assert_eq!(log.borrow().clone(), vec!["click genesys+cloud+ex", "wait 20"]);
    }

    #[tokio::test]
    async fn test_filter_fails_without_panel() {
        let log = Log::default();
        let page = SimPage::new(&log, 0);
        assert!(!apply_category_filter(&page, &categories(), &fast_timing()).await);
    }

    #[tokio::test]
    async fn test_filter_fails_without_products_section() {
        let log = Log::default();
        let mut page = SimPage::new(&log, 0);
        page.accordion = Some(SimElement::new("accordion", &log));
        assert!(!apply_category_filter(&page, &categories(), &fast_timing()).await);
        assert!(log.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_load_phase_stops_after_exact_scroll_count() {
        let log = Log::default();
        // Two lazy batches: the third scroll lands on the real bottom.
        let page = SimPage::new(&log, 2);

        collect_links_and_regions(&page, None, &fast_timing()).await;

        let events = log.borrow().clone();
        let top = events.iter().position(|e| e == "top").unwrap();
        let load_scrolls = events[..top].iter().filter(|e| *e == "bottom").count();
        assert_eq!(load_scrolls, 3);
        assert_eq!(page.events("bottom"), 4, "harvest pass needs one scroll to confirm the end");
    }

    #[tokio::test]
    async fn test_scroll_loops_are_bounded() {
        let log = Log::default();
        let mut page = SimPage::new(&log, usize::MAX);
        page.cards = vec![card(&log, Some("https://example.com/a"), Some("NA"))];
        let timing = ScrollTiming {
            max_scrolls: 5,
            ..fast_timing()
        };

        let records = collect_links_and_regions(&page, None, &timing).await;

        assert_eq!(page.events("bottom"), 10);
        assert_eq!(dedup_links(records).len(), 1);
    }

    #[tokio::test]
    async fn test_harvest_reads_links_and_regions() {
        let log = Log::default();
        let mut page = SimPage::new(&log, 1);
        page.cards = vec![
            card(&log, Some("/customer-stories/acme/"), Some("  NA ")),
            card(&log, Some("https://other.example/story"), None),
            card(&log, Some("https://example.com/blank"), Some("   ")),
            card(&log, None, Some("EMEA")),
        ];
        let base = Url::parse("https://www.example.com/customer-stories").unwrap();

        let records = collect_links_and_regions(&page, Some(&base), &fast_timing()).await;

        assert_eq!(
            dedup_links(records),
            vec![
                LinkRecord::new("https://www.example.com/customer-stories/acme/", "NA"),
                LinkRecord::new("https://other.example/story", UNKNOWN_REGION),
                LinkRecord::new("https://example.com/blank", UNKNOWN_REGION),
            ]
        );
    }

    #[tokio::test]
    async fn test_browser_failure_yields_empty() {
        let log = Log::default();
        let mut page = SimPage::new(&log, 0);
        page.cards = vec![card(&log, Some("https://example.com/a"), Some("NA"))];
        page.broken = true;

        assert!(collect_links_and_regions(&page, None, &fast_timing()).await.is_empty());
    }

    #[test]
    fn test_dedup_links_keeps_distinct_pairs() {
        let records = vec![
            LinkRecord::new("https://example.com/a", "NA"),
            LinkRecord::new("https://example.com/a", "EMEA"),
            LinkRecord::new("https://example.com/a", "NA"),
        ];
        assert_eq!(
            dedup_links(records),
            vec![
                LinkRecord::new("https://example.com/a", "NA"),
                LinkRecord::new("https://example.com/a", "EMEA"),
            ]
        );
    }

    #[tokio::test]
    async fn test_discover_end_to_end() {
        let log = Log::default();
        let mut page = SimPage::new(&log, 1);
        page.accordion = Some(filter_panel(
            &log,
            "false",
            &[("genesys+cloud", false), ("genesys+cloud+ex", false)],
        ));
        page.cards = vec![
            card(&log, Some("/customer-stories/a/"), Some("NA")),
            card(&log, Some("/customer-stories/b/"), Some("APAC")),
        ];
        let options = DiscoveryOptions {
            timing: fast_timing(),
            ..DiscoveryOptions::default()
        };

        let links = discover(&page, &options).await;

        assert_eq!(
            links,
            vec![
                LinkRecord::new("https://www.genesys.com/customer-stories/a/", "NA"),
                LinkRecord::new("https://www.genesys.com/customer-stories/b/", "APAC"),
            ]
        );
        assert_eq!(log.borrow()[0], format!("goto {DEFAULT_LISTING_URL}"));
    }

    #[tokio::test]
    async fn test_discover_without_filter_returns_nothing() {
        let log = Log::default();
        let mut page = SimPage::new(&log, 0);
        page.cards = vec![card(&log, Some("https://example.com/a"), Some("NA"))];

        let options = DiscoveryOptions {
            timing: fast_timing(),
            ..DiscoveryOptions::default()
        };
        assert!(discover(&page, &options).await.is_empty());
        assert_eq!(page.events("bottom"), 0);
    }
}
