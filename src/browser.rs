//! Headless browser access for link discovery.
//!
//! Link discovery only needs a handful of page operations, so the rest of the
//! application talks to the browser through two small traits:
//!
//! - [`BrowserPage`]: navigate, query the DOM, evaluate a script, wait
//! - [`PageElement`]: look inside an element, read it, click it
//!
//! Lookups that find nothing return `None` or an empty `Vec`. Errors are
//! reserved for the browser itself failing (a dead CDP connection, a crashed
//! tab), which lets callers treat missing markup as ordinary data.
//!
//! [`ChromeSession`] implements the traits on top of `chromiumoxide`, which
//! launches a local Chrome/Chromium and drives it over the DevTools protocol.

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::{Element, Page};
use futures::StreamExt;
use serde_json::Value;
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// A single element inside a browser page.
pub trait PageElement: Sized {
    /// First descendant matching `selector`, if any.
    async fn find_first(&self, selector: &str) -> Result<Option<Self>, Box<dyn Error>>;

    /// All descendants matching `selector`, in document order.
    async fn find_all(&self, selector: &str) -> Result<Vec<Self>, Box<dyn Error>>;

    /// Value of the attribute `name`, if the element carries it.
    async fn attribute(&self, name: &str) -> Result<Option<String>, Box<dyn Error>>;

    /// Rendered text of the element.
    async fn text(&self) -> Result<Option<String>, Box<dyn Error>>;

    /// Click the element.
    async fn click(&self) -> Result<(), Box<dyn Error>>;

    /// Whether a checkbox element is currently checked.
    async fn is_checked(&self) -> Result<bool, Box<dyn Error>>;
}

/// A browser tab that discovery can drive.
pub trait BrowserPage {
    type Element: PageElement;

    /// Navigate to `url` and wait for the load to finish.
    async fn goto(&self, url: &str) -> Result<(), Box<dyn Error>>;

    /// All elements in the document matching `selector`, in document order.
    async fn query_all(&self, selector: &str) -> Result<Vec<Self::Element>, Box<dyn Error>>;

    /// Evaluate a JavaScript expression and return its JSON value.
    ///
    /// Expressions that produce `undefined` yield [`Value::Null`].
    async fn evaluate(&self, script: &str) -> Result<Value, Box<dyn Error>>;

    /// First element in the document matching `selector`, if any.
    async fn query_first(&self, selector: &str) -> Result<Option<Self::Element>, Box<dyn Error>> {
        Ok(self.query_all(selector).await?.into_iter().next())
    }

    /// Let the page run for `duration` (rendering, lazy loading, animations).
    async fn wait(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

impl PageElement for Element {
    async fn find_first(&self, selector: &str) -> Result<Option<Self>, Box<dyn Error>> {
        Ok(self.find_elements(selector).await?.into_iter().next())
    }

    async fn find_all(&self, selector: &str) -> Result<Vec<Self>, Box<dyn Error>> {
        Ok(self.find_elements(selector).await?)
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>, Box<dyn Error>> {
        Ok(Element::attribute(self, name).await?)
    }

    async fn text(&self) -> Result<Option<String>, Box<dyn Error>> {
        Ok(self.inner_text().await?)
    }

    async fn click(&self) -> Result<(), Box<dyn Error>> {
        Element::click(self).await?;
        Ok(())
    }

    async fn is_checked(&self) -> Result<bool, Box<dyn Error>> {
        let checked = self.property("checked").await?;
        Ok(matches!(checked, Some(Value::Bool(true))))
    }
}

impl BrowserPage for Page {
    type Element = Element;

    async fn goto(&self, url: &str) -> Result<(), Box<dyn Error>> {
        Page::goto(self, url).await?;
        self.wait_for_navigation().await?;
        Ok(())
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<Element>, Box<dyn Error>> {
        Ok(self.find_elements(selector).await?)
    }

    async fn evaluate(&self, script: &str) -> Result<Value, Box<dyn Error>> {
        let result = Page::evaluate(self, script).await?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }
}

/// Options for launching the browser.
#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    /// Show the browser window instead of running headless.
    pub headed: bool,
    /// Explicit Chrome/Chromium executable; autodetected when `None`.
    pub chrome_path: Option<PathBuf>,
}

/// A launched browser with one open tab.
///
/// The DevTools event handler runs on its own tokio task for as long as the
/// session lives. Call [`ChromeSession::close`] to shut Chrome down cleanly.
pub struct ChromeSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
}

impl ChromeSession {
    /// Launch Chrome and open a blank tab.
    #[instrument(level = "info", skip_all, fields(headed = options.headed))]
    pub async fn launch(options: &LaunchOptions) -> Result<Self, Box<dyn Error>> {
        let mut builder = BrowserConfig::builder();
        if options.headed {
            builder = builder.with_head();
        }
        if let Some(path) = &options.chrome_path {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build()?;

        let (browser, mut handler) = Browser::launch(config).await?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    warn!(error = %e, "Browser handler event error");
                }
            }
            debug!("Browser handler finished");
        });

        let page = browser.new_page("about:blank").await?;
        info!("Browser launched");

        Ok(Self {
            browser,
            page,
            handler_task,
        })
    }

    /// The session's working tab.
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Close the browser and wait for the handler task to drain.
    #[instrument(level = "info", skip_all)]
    pub async fn close(mut self) -> Result<(), Box<dyn Error>> {
        self.browser.close().await?;
        self.browser.wait().await?;
        if let Err(e) = self.handler_task.await {
            warn!(error = %e, "Browser handler task did not shut down cleanly");
        }
        info!("Browser closed");
        Ok(())
    }
}
