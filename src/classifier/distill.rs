//! Bookmark distillation: fetch a page, screen it, summarize it.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::parse::{first_json_object, int_field, string_field, string_list};
use super::prompts::{bookmark_block, BOOKMARK_SCREENING_TEMPLATE, DISTILL_TEMPLATE};
use crate::capabilities::{Bookmark, ContentFetcher, FetchedContent};
use crate::inference::ProviderKind;
use crate::privacy::PrivacyRouter;

/// Reading speed used to estimate read time when the model gives none.
const WORDS_PER_MINUTE: usize = 250;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistillCategory {
    Tech,
    Business,
    Science,
    Health,
    Politics,
    Culture,
    Tutorial,
    Reference,
    Tool,
    Other,
}

impl DistillCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistillCategory::Tech => "tech",
            DistillCategory::Business => "business",
            DistillCategory::Science => "science",
            DistillCategory::Health => "health",
            DistillCategory::Politics => "politics",
            DistillCategory::Culture => "culture",
            DistillCategory::Tutorial => "tutorial",
            DistillCategory::Reference => "reference",
            DistillCategory::Tool => "tool",
            DistillCategory::Other => "other",
        }
    }

    /// Case-insensitive; anything unknown is `Other`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "tech" => DistillCategory::Tech,
            "business" => DistillCategory::Business,
            "science" => DistillCategory::Science,
            "health" => DistillCategory::Health,
            "politics" => DistillCategory::Politics,
            "culture" => DistillCategory::Culture,
            "tutorial" => DistillCategory::Tutorial,
            "reference" => DistillCategory::Reference,
            "tool" => DistillCategory::Tool,
            _ => DistillCategory::Other,
        }
    }
}

impl fmt::Display for DistillCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A summarized bookmark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookmarkDigest {
    pub bookmark: Bookmark,
    pub summary: String,
    pub key_takeaways: Vec<String>,
    pub category: DistillCategory,
    pub suggested_tags: Vec<String>,
    pub full_text: String,
    pub word_count: usize,
    pub read_time_minutes: u32,
    pub is_sensitive: bool,
    pub analyzed_locally: bool,
    /// Why the digest is a fallback, if it is one.
    pub error: Option<String>,
}

/// Estimated minutes to read `word_count` words; at least one.
pub fn estimate_read_time(word_count: usize) -> u32 {
    (word_count / WORDS_PER_MINUTE).max(1) as u32
}

/// The digest produced when the page could not be fetched or summarized.
pub fn fallback_digest(bookmark: &Bookmark, page: &FetchedContent, error: String) -> BookmarkDigest {
    let label = if bookmark.title.is_empty() {
        &bookmark.url
    } else {
        &bookmark.title
    };
    BookmarkDigest {
        bookmark: bookmark.clone(),
        summary: format!("Content from {label}"),
        key_takeaways: Vec::new(),
        category: DistillCategory::Other,
        suggested_tags: Vec::new(),
        full_text: page.text.clone(),
        word_count: page.word_count,
        read_time_minutes: estimate_read_time(page.word_count),
        is_sensitive: false,
        analyzed_locally: true,
        error: Some(error),
    }
}

/// Parse a distillation answer. `None` when the text holds no JSON object.
pub fn parse_digest(
    bookmark: &Bookmark,
    page: &FetchedContent,
    raw: &str,
    is_sensitive: bool,
    analyzed_locally: bool,
) -> Option<BookmarkDigest> {
    let obj = first_json_object(raw)?;
    let read_time_minutes = int_field(&obj, "read_time_minutes")
        .filter(|m| *m > 0)
        .map(|m| m.min(u32::MAX as i64) as u32)
        .unwrap_or_else(|| estimate_read_time(page.word_count));

    Some(BookmarkDigest {
        bookmark: bookmark.clone(),
        summary: string_field(&obj, "summary").unwrap_or_default(),
        key_takeaways: string_list(&obj, "key_takeaways"),
        category: string_field(&obj, "category")
            .map(|c| DistillCategory::parse(&c))
            .unwrap_or(DistillCategory::Other),
        suggested_tags: string_list(&obj, "suggested_tags")
            .into_iter()
            .map(|t| t.to_lowercase())
            .collect(),
        full_text: page.text.clone(),
        word_count: page.word_count,
        read_time_minutes,
        is_sensitive,
        analyzed_locally,
        error: None,
    })
}

/// Fetch and summarize a bookmark. Never fails: every failure yields a
/// fallback digest with `error` set.
///
/// Pages are screened like email, so a bookmarked bank statement or patient
/// portal is only ever summarized by the local model.
pub async fn distill(
    router: &PrivacyRouter,
    fetcher: &dyn ContentFetcher,
    bookmark: &Bookmark,
    preferred: Option<ProviderKind>,
) -> BookmarkDigest {
    let page = fetcher.fetch(&bookmark.url).await;
    if let Some(error) = &page.error {
        return fallback_digest(bookmark, &page, format!("fetch failed: {error}"));
    }

    let outcome = match router
        .screen_then_analyze(
            &bookmark_block(bookmark, &page),
            BOOKMARK_SCREENING_TEMPLATE,
            DISTILL_TEMPLATE,
            preferred,
        )
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::warn!(url = %bookmark.url, error = %e, "failed to distill bookmark");
            return fallback_digest(bookmark, &page, e.to_string());
        }
    };

    match parse_digest(
        bookmark,
        &page,
        &outcome.analysis.text,
        outcome.decision.sensitive,
        outcome.kept_local,
    ) {
        Some(digest) => {
            tracing::info!(
                url = %bookmark.url,
                category = %digest.category,
                local = digest.analyzed_locally,
                "distilled bookmark"
            );
            digest
        }
        None => {
            let mut digest =
                fallback_digest(bookmark, &page, "model answer was not JSON".to_string());
            digest.is_sensitive = outcome.decision.sensitive;
            digest.analyzed_locally = outcome.kept_local;
            digest
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::RoutingSettings;
    use crate::test_support::{FakeFetcher, FakeProvider};

    fn bookmark(title: &str) -> Bookmark {
        Bookmark {
            url: "https://example.com/post".into(),
            title: title.into(),
            ..Default::default()
        }
    }

    fn router(local: Arc<FakeProvider>) -> PrivacyRouter {
        PrivacyRouter::new(local, vec![], RoutingSettings::default())
    }

    #[test]
    fn test_read_time_floor() {
        assert_eq!(estimate_read_time(0), 1);
        assert_eq!(estimate_read_time(249), 1);
        assert_eq!(estimate_read_time(1000), 4);
    }

    #[test]
    fn test_category_parse() {
        assert_eq!(DistillCategory::parse("Tutorial"), DistillCategory::Tutorial);
        assert_eq!(DistillCategory::parse("cooking"), DistillCategory::Other);
    }

    #[tokio::test]
    async fn test_distill_parses_digest() {
        let local = FakeProvider::new(ProviderKind::Ollama)
            .reply("CLEAN")
            .reply(r#"Here you go: {"summary": "Ownership explained.", "key_takeaways": ["a", "b", "c"],
                "category": "Tutorial", "suggested_tags": ["Rust", "memory"], "read_time_minutes": 7}"#)
            .arc();
        let router = router(local);
        let fetcher = FakeFetcher::with_text("Ownership", "word ".repeat(600).trim());

        let digest = distill(&router, &fetcher, &bookmark("Ownership"), None).await;
        assert_eq!(digest.summary, "Ownership explained.");
        assert_eq!(digest.key_takeaways.len(), 3);
        assert_eq!(digest.category, DistillCategory::Tutorial);
        assert_eq!(digest.suggested_tags, vec!["rust", "memory"]);
        assert_eq!(digest.read_time_minutes, 7);
        assert_eq!(digest.word_count, 600);
        assert!(digest.error.is_none());
    }

    #[tokio::test]
    async fn test_distill_unparseable_falls_back() {
        let local = FakeProvider::new(ProviderKind::Ollama)
            .reply("CLEAN")
            .reply("This page is about Rust.")
            .arc();
        let router = router(local);
        let fetcher = FakeFetcher::with_text("", "word ".repeat(1000).trim());

        let digest = distill(&router, &fetcher, &bookmark(""), None).await;
        assert_eq!(digest.summary, "Content from https://example.com/post");
        assert!(digest.key_takeaways.is_empty());
        assert_eq!(digest.category, DistillCategory::Other);
        assert!(digest.suggested_tags.is_empty());
        assert_eq!(digest.read_time_minutes, 4);
        assert!(digest.error.is_some());
    }

    #[tokio::test]
    async fn test_distill_screening_failure_falls_back_without_cloud() {
        let local = FakeProvider::new(ProviderKind::Ollama)
            .fail(crate::test_support::connection_refused())
            .arc();
        let router = router(local);
        let fetcher = FakeFetcher::with_text("Title", "some text");

        let digest = distill(&router, &fetcher, &bookmark("My Post"), None).await;
        assert_eq!(digest.summary, "Content from My Post");
        assert_eq!(digest.read_time_minutes, 1);
        assert!(digest.error.unwrap().contains("screening failed"));
    }

    #[tokio::test]
    async fn test_distill_skips_models_when_fetch_failed() {
        let local = FakeProvider::new(ProviderKind::Ollama).always("CLEAN").arc();
        let router = router(local.clone());
        let mut fetcher = FakeFetcher::with_text("", "");
        fetcher.page.error = Some("HTTP 404".into());

        let digest = distill(&router, &fetcher, &bookmark("Gone"), None).await;
        assert_eq!(local.calls(), 0);
        assert_eq!(digest.summary, "Content from Gone");
        assert_eq!(digest.error.as_deref(), Some("fetch failed: HTTP 404"));
    }
}
