//! Raw page fetching for bookmark distillation.

use std::time::Duration;

use async_trait::async_trait;
use html2text::render::TrivialDecorator;
use serde::{Deserialize, Serialize};

use super::CapabilityError;

/// Maximum characters of page text handed to the model.
pub const DEFAULT_MAX_CHARS: usize = 8000;

const USER_AGENT: &str = "Mozilla/5.0 (LocalTriage; content digest)";

/// Wrap width for HTML-to-text rendering.
const TEXT_WIDTH: usize = 100;

/// A fetched page, reduced to readable text. Fetch failures are reported in
/// `error` rather than as an `Err`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchedContent {
    pub url: String,
    pub title: String,
    pub text: String,
    pub word_count: usize,
    pub error: Option<String>,
}

impl FetchedContent {
    fn failed(url: &str, reason: String) -> Self {
        Self {
            url: url.to_string(),
            title: String::new(),
            text: format!("[Could not fetch content: {reason}]"),
            word_count: 0,
            error: Some(reason),
        }
    }
}

#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> FetchedContent;
}

/// Fetches pages over HTTP and renders them to plain text.
pub struct HttpContentFetcher {
    http: reqwest::Client,
    max_chars: usize,
}

impl HttpContentFetcher {
    pub fn new(timeout: Duration) -> Result<Self, CapabilityError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            http,
            max_chars: DEFAULT_MAX_CHARS,
        })
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    async fn fetch_html(&self, url: &str) -> Result<String, CapabilityError> {
        let response = self.http.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }
}

#[async_trait]
impl ContentFetcher for HttpContentFetcher {
    async fn fetch(&self, url: &str) -> FetchedContent {
        let html = match self.fetch_html(url).await {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!(url, error = %e, "failed to fetch page");
                return FetchedContent::failed(url, e.message);
            }
        };

        match html_to_content(url, &html, self.max_chars) {
            Ok(content) => {
                tracing::debug!(url, words = content.word_count, "fetched page");
                content
            }
            Err(e) => {
                tracing::warn!(url, error = %e, "failed to render page");
                FetchedContent::failed(url, e.message)
            }
        }
    }
}

/// Page furniture dropped before rendering.
const BOILERPLATE: &str = "script, style, nav, footer, header, aside";

/// Reduce an HTML document to its title and readable text.
///
/// Navigation, headers, footers, sidebars and scripts are removed first.
/// Links render as their text alone, without footnotes.
pub fn html_to_content(
    url: &str,
    html: &str,
    max_chars: usize,
) -> Result<FetchedContent, CapabilityError> {
    let mut document = scraper::Html::parse_document(html);
    let title = page_title(&document);
    strip_boilerplate(&mut document);

    let rendered = html2text::config::with_decorator(TrivialDecorator::new())
        .string_from_read(document.html().as_bytes(), TEXT_WIDTH)
        .map_err(|e| CapabilityError::new(format!("HTML: {e}")))?;
    let text: String = rendered.trim().chars().take(max_chars).collect();
    let word_count = text.split_whitespace().count();
    Ok(FetchedContent {
        url: url.to_string(),
        title,
        text,
        word_count,
        error: None,
    })
}

fn strip_boilerplate(document: &mut scraper::Html) {
    let Ok(selector) = scraper::Selector::parse(BOILERPLATE) else {
        return;
    };
    let ids: Vec<_> = document.select(&selector).map(|el| el.id()).collect();
    for id in ids {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }
}

fn page_title(document: &scraper::Html) -> String {
    let Ok(selector) = scraper::Selector::parse("title") else {
        return String::new();
    };
    document
        .select(&selector)
        .next()
        .map(|node| node.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}
