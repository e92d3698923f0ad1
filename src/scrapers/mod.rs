//! Customer story scrapers.
//!
//! The pipeline has two stages, each in its own module:
//!
//! 1. **Discovery** ([`discovery`]): drive a headless browser over the story
//!    listing, apply the product filter, scroll until every card has loaded
//!    and collect `(url, region)` pairs
//! 2. **Details** ([`details`]): fetch each story page over plain HTTP and
//!    extract company, industry, location, partners and quoted speaker
//!
//! | Stage | Transport | Output |
//! |-------|-----------|--------|
//! | Discovery | Chrome via DevTools protocol | link file, overwritten per run |
//! | Details | `reqwest` GET, rotating user agent | details file, appended per row |
//!
//! Story pages come in two markup generations; [`layouts`] holds the
//! per-generation selectors used by the detail extractor.
//!
//! Failures stay local: a missing element is an absent field, a failed page
//! is a skipped row, and a failed browser session is an empty link list.

pub mod details;
pub mod discovery;
pub mod layouts;
