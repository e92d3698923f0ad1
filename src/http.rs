//! Story page fetching with a rotating `User-Agent`.
//!
//! Each request picks a user-agent string from a [`UserAgentPool`] using an
//! injected random number generator, so production runs rotate through the
//! pool while tests can seed the generator and know which string is sent.
//!
//! There is no status check and no retry: a non-200 response is parsed like
//! any other page and simply fails to match the expected markup downstream.

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use reqwest::Client;
use reqwest::header::USER_AGENT;
use scraper::Html;
use std::error::Error;
use tracing::{debug, instrument};

/// Desktop browser user-agent strings rotated across requests.
pub const DEFAULT_USER_AGENTS: [&str; 5] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:89.0) Gecko/20100101 Firefox/89.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.1.1 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Edge/91.0.864.59",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
];

/// A non-empty set of user-agent strings.
#[derive(Debug, Clone)]
pub struct UserAgentPool {
    agents: Vec<String>,
}

impl UserAgentPool {
    /// Build a pool from `agents`, falling back to [`DEFAULT_USER_AGENTS`]
    /// when the list is empty.
    pub fn new(agents: Vec<String>) -> Self {
        if agents.is_empty() {
            return Self::default();
        }
        Self { agents }
    }

    /// Pick one user agent with `rng`.
    pub fn choose<'a, R: Rng + ?Sized>(&'a self, rng: &mut R) -> &'a str {
        // The pool is never empty, so `choose` always returns Some.
        self.agents
            .choose(rng)
            .map(String::as_str)
            .unwrap_or(DEFAULT_USER_AGENTS[0])
    }
}

impl Default for UserAgentPool {
    fn default() -> Self {
        Self {
            agents: DEFAULT_USER_AGENTS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Fetches story pages over plain HTTP GET.
#[derive(Debug)]
pub struct PageFetcher<R = StdRng> {
    client: Client,
    user_agents: UserAgentPool,
    rng: R,
}

impl PageFetcher<StdRng> {
    /// Fetcher with an entropy-seeded generator.
    pub fn new(user_agents: UserAgentPool) -> Self {
        Self::with_rng(user_agents, StdRng::from_os_rng())
    }
}

impl<R: Rng> PageFetcher<R> {
    /// Fetcher that draws user agents from `rng`.
    pub fn with_rng(user_agents: UserAgentPool, rng: R) -> Self {
        Self {
            client: Client::new(),
            user_agents,
            rng,
        }
    }

    /// GET `url` and parse the body as an HTML document.
    #[instrument(level = "debug", skip(self))]
    pub async fn fetch_page(&mut self, url: &str) -> Result<Html, Box<dyn Error>> {
        let user_agent = self.user_agents.choose(&mut self.rng).to_string();
        debug!(%user_agent, "Requesting story page");

        let response = self
            .client
            .get(url)
            .header(USER_AGENT, user_agent)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(%status, bytes = body.len(), "Received story page");

        Ok(Html::parse_document(&body))
    }
}
