//! Markup strategies for the two generations of story page layout.
//!
//! The story pages were redesigned at some point, and both generations are
//! still served. Fields whose markup changed (partners and the quoted
//! speaker) are read by trying each [`Layout`] in [`LAYOUTS`] order; the first
//! one that produces a non-empty value wins. Supporting a third generation is
//! a matter of adding a variant and its selectors.

use scraper::{ElementRef, Html, Selector};

/// Separator between the quote label and the speaker in the legacy layout.
const EM_DASH: char = '—';

/// A generation of story page markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// The first-generation site markup.
    Legacy,
    /// The redesigned site markup.
    Current,
}

/// Layouts in the order they are tried.
pub const LAYOUTS: [Layout; 2] = [Layout::Legacy, Layout::Current];

impl Layout {
    /// Selector of the sidebar block listing partner links.
    pub fn partner_container(self) -> &'static str {
        match self {
            Layout::Legacy => "div.cs-sidebar-item.cs-partner-container",
            Layout::Current => "div.cs-sidebar-item.cs-custom-container.custom-plain",
        }
    }

    /// Selector of the block holding the customer quote.
    pub fn quote_block(self) -> &'static str {
        match self {
            Layout::Legacy => "div.quote-speaker",
            Layout::Current => "div.wpb_content_element.customer_quote_block",
        }
    }

    /// Selector of the speaker paragraph inside [`Layout::quote_block`].
    pub fn quote_speaker(self) -> &'static str {
        match self {
            Layout::Legacy => "p",
            Layout::Current => "p.cq_block_speaker",
        }
    }

    /// Partner names from this layout's container, in document order.
    ///
    /// Returns `None` when the container is missing or holds no links.
    pub fn partners(self, doc: &Html) -> Option<Vec<String>> {
        let container = first_match(doc, self.partner_container())?;
        let anchor = selector("a")?;
        let partners: Vec<String> = container
            .select(&anchor)
            .map(|a| element_text(&a).trim().to_string())
            .collect();

        if partners.is_empty() {
            None
        } else {
            Some(partners)
        }
    }

    /// The speaker line of this layout's quote block.
    pub fn quote(self, doc: &Html) -> Option<String> {
        let block = first_match(doc, self.quote_block())?;
        let speaker = selector(self.quote_speaker())?;
        let paragraph = block.select(&speaker).next()?;
        let text = element_text(&paragraph);

        match self {
            Layout::Legacy => legacy_speaker(&text),
            Layout::Current => Some(text.trim().to_string()),
        }
    }
}

/// The segment after the first em-dash, up to the next one.
///
/// Legacy speaker lines read `"Name — Title"`; lines without an em-dash are
/// not speaker lines.
fn legacy_speaker(text: &str) -> Option<String> {
    let mut segments = text.split(EM_DASH);
    segments.next()?;
    segments.next().map(|s| s.trim().to_string())
}

pub(crate) fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

pub(crate) fn first_match<'a>(doc: &'a Html, css: &str) -> Option<ElementRef<'a>> {
    let selector = selector(css)?;
    doc.select(&selector).next()
}

pub(crate) fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>()
}
