// src/extract/mod.rs
pub mod html;
pub mod plain;
pub mod rendered;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::source::{FetchStrategy, SelectorRule};
use plain::PlainFetcher;
use rendered::RenderedFetcher;

/// Desktop Chrome UA; some listing sites refuse default client agents.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("building http client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("starting browser `{browser}`: {source}")]
    BrowserSpawn {
        browser: String,
        #[source]
        source: std::io::Error,
    },
    #[error("rendering {url} did not finish within {secs}s")]
    RenderTimeout { url: String, secs: u64 },
    #[error("browser exited with {status} for {url}: {stderr}")]
    BrowserFailed {
        url: String,
        status: String,
        stderr: String,
    },
    #[error("invalid selector <{tag} class=\"{class}\">: {source}")]
    Selector {
        tag: String,
        class: String,
        #[source]
        source: regex::Error,
    },
}

/// Given a page and a selector, return the matched tag texts.
/// An empty vector is a valid answer (selector matched nothing).
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(
        &self,
        url: &str,
        selector: &SelectorRule,
        strategy: FetchStrategy,
    ) -> Result<Vec<String>, FetchError>;
}

#[derive(Debug, Clone)]
pub struct ExtractSettings {
    pub user_agent: String,
    pub fetch_timeout: Duration,
    pub browser: String,
    pub render_timeout: Duration,
}

impl Default for ExtractSettings {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            fetch_timeout: Duration::from_secs(30),
            browser: "chromium".to_string(),
            render_timeout: Duration::from_secs(20),
        }
    }
}

/// Fetches the document with the requested strategy, then applies the
/// same selector semantics to either.
pub struct PageExtractor {
    plain: PlainFetcher,
    rendered: RenderedFetcher,
}

impl PageExtractor {
    pub fn new(settings: &ExtractSettings) -> Result<Self, FetchError> {
        Ok(Self {
            plain: PlainFetcher::new(&settings.user_agent, settings.fetch_timeout)?,
            rendered: RenderedFetcher::new(
                &settings.browser,
                &settings.user_agent,
                settings.render_timeout,
            ),
        })
    }
}

#[async_trait]
impl Extractor for PageExtractor {
    async fn extract(
        &self,
        url: &str,
        selector: &SelectorRule,
        strategy: FetchStrategy,
    ) -> Result<Vec<String>, FetchError> {
        let document = match strategy {
            FetchStrategy::Plain => self.plain.fetch(url).await?,
            FetchStrategy::Rendered => self.rendered.fetch(url).await?,
        };
        let texts = html::select_texts(&document, selector).map_err(|source| {
            FetchError::Selector {
                tag: selector.tag.clone(),
                class: selector.class.clone(),
                source,
            }
        })?;
        tracing::debug!(url, ?strategy, matched = texts.len(), "page extracted");
        Ok(texts)
    }
}
