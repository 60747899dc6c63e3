//! Bookmark commands: digest one page, or ingest a browser's bookmarks.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::json;

use super::{parse_provider, AppState, CommandError};
use crate::capabilities::{Bookmark, BookmarkSource, ContentFetcher};
use crate::classifier::{distill, BookmarkDigest};
use crate::ledger::{ContentSource, LedgerError, NewContentItem};

/// Bookmarks digested when a query sets no limit.
pub const DEFAULT_BOOKMARK_LIMIT: usize = 50;

/// Which bookmarks to ingest.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookmarkQuery {
    /// Case-insensitive substring of the folder path, e.g. `"reading"`.
    #[serde(default)]
    pub folder: Option<String>,
    /// Only bookmarks added within this many days. Undated ones are skipped.
    #[serde(default)]
    pub since_days: Option<u32>,
    /// Maximum bookmarks to digest, newest first. Defaults to
    /// [`DEFAULT_BOOKMARK_LIMIT`].
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub provider: Option<String>,
}

/// Fetch and summarize a single bookmark.
pub async fn digest_bookmark(
    state: &AppState,
    fetcher: &dyn ContentFetcher,
    bookmark: &Bookmark,
    provider: Option<&str>,
) -> Result<BookmarkDigest, CommandError> {
    validate_url(&bookmark.url)?;
    let preferred = parse_provider(provider)?;
    Ok(distill(&state.router, fetcher, bookmark, preferred).await)
}

/// Digest the bookmarks matching `query` and record them as content items.
///
/// Pages are fetched and summarized one at a time. A page that fails to
/// fetch or summarize still yields a fallback digest.
pub async fn ingest_bookmarks(
    state: &AppState,
    source: &dyn BookmarkSource,
    fetcher: &dyn ContentFetcher,
    account_id: i64,
    query: &BookmarkQuery,
) -> Result<Vec<BookmarkDigest>, CommandError> {
    let preferred = parse_provider(query.provider.as_deref())?;
    {
        let db = state.ledger()?;
        if db.get_account(account_id)?.is_none() {
            return Err(LedgerError::AccountNotFound { account_id }.into());
        }
    }

    let selected = select_bookmarks(source.list_bookmarks().await?, query, Utc::now());
    tracing::info!(
        account_id,
        count = selected.len(),
        folder = query.folder.as_deref().unwrap_or(""),
        "ingesting bookmarks"
    );

    let mut digests = Vec::with_capacity(selected.len());
    for bookmark in &selected {
        let digest = distill(&state.router, fetcher, bookmark, preferred).await;
        let item_id = {
            let db = state.ledger()?;
            db.insert_content_item(&bookmark_item(account_id, &digest))?
        };
        tracing::debug!(item_id, url = %bookmark.url, "recorded bookmark digest");
        digests.push(digest);
    }
    Ok(digests)
}

/// Keep the http(s) bookmarks matching `query`, newest first, up to its limit.
pub fn select_bookmarks(
    mut bookmarks: Vec<Bookmark>,
    query: &BookmarkQuery,
    now: DateTime<Utc>,
) -> Vec<Bookmark> {
    if let Some(folder) = query.folder.as_deref().map(str::to_lowercase) {
        bookmarks.retain(|b| b.folder.to_lowercase().contains(&folder));
    }
    if let Some(days) = query.since_days {
        let cutoff = now - Duration::days(i64::from(days));
        bookmarks.retain(|b| b.date_added.is_some_and(|added| added >= cutoff));
    }
    bookmarks.retain(|b| validate_url(&b.url).is_ok());
    // Undated bookmarks sort last.
    bookmarks.sort_by(|a, b| b.date_added.cmp(&a.date_added));
    bookmarks.truncate(query.limit.unwrap_or(DEFAULT_BOOKMARK_LIMIT));
    bookmarks
}

fn validate_url(url: &str) -> Result<(), CommandError> {
    let lower = url.trim().to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        Ok(())
    } else {
        Err(CommandError::Validation(format!(
            "bookmark url must be http(s): {url:?}"
        )))
    }
}

fn bookmark_item(account_id: i64, digest: &BookmarkDigest) -> NewContentItem {
    let bookmark = &digest.bookmark;
    NewContentItem {
        account_id,
        source: ContentSource::Bookmark,
        external_id: bookmark.url.clone(),
        title: bookmark.title.clone(),
        snippet: digest.summary.chars().take(200).collect(),
        full_content: (!digest.full_text.is_empty()).then(|| digest.full_text.clone()),
        sender: None,
        url: Some(bookmark.url.clone()),
        metadata: json!({
            "folder": bookmark.folder,
            "tags": bookmark.tags,
            "date_added": bookmark.date_added.map(|d| d.to_rfc3339()),
            "suggested_tags": digest.suggested_tags,
            "key_takeaways": digest.key_takeaways,
            "word_count": digest.word_count,
            "read_time_minutes": digest.read_time_minutes,
            "error": digest.error,
        }),
        category: Some(digest.category.as_str().to_string()),
        summary: Some(digest.summary.clone()),
        sensitivity_flag: digest.is_sensitive,
        ai_provider_used: Some(
            if digest.analyzed_locally {
                "local"
            } else {
                "cloud"
            }
            .to_string(),
        ),
    }
}
