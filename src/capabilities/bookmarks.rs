//! Local bookmark discovery.
//!
//! Chrome keeps bookmarks in a plain JSON file in the profile directory, so
//! no browser extension is needed to read them.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::CapabilityError;

/// Microseconds between 1601-01-01 (Chrome's epoch) and 1970-01-01.
const CHROME_EPOCH_OFFSET_MICROS: i64 = 11_644_473_600_000_000;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub date_added: Option<DateTime<Utc>>,
    /// Slash-separated folder path, e.g. `"Bookmarks bar/Reading"`.
    #[serde(default)]
    pub folder: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[async_trait]
pub trait BookmarkSource: Send + Sync {
    async fn list_bookmarks(&self) -> Result<Vec<Bookmark>, CapabilityError>;
}

// ─── Chrome ──────────────────────────────────────────────────────────────────

/// Reads a Chrome/Chromium `Bookmarks` file.
pub struct ChromeBookmarks {
    path: PathBuf,
}

impl ChromeBookmarks {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Locate the default profile's bookmarks file for this platform.
    pub fn discover() -> Option<Self> {
        candidate_paths()
            .into_iter()
            .find(|p| p.exists())
            .map(Self::from_path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl BookmarkSource for ChromeBookmarks {
    async fn list_bookmarks(&self) -> Result<Vec<Bookmark>, CapabilityError> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        let bookmarks = parse_chrome_bookmarks(&raw)?;
        tracing::info!(
            path = %self.path.display(),
            count = bookmarks.len(),
            "loaded bookmarks"
        );
        Ok(bookmarks)
    }
}

fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if cfg!(target_os = "macos") {
        if let Some(home) = dirs::home_dir() {
            let base = home.join("Library/Application Support/Google/Chrome");
            paths.push(base.join("Default/Bookmarks"));
            paths.push(base.join("Profile 1/Bookmarks"));
        }
    } else if cfg!(target_os = "windows") {
        if let Some(local) = dirs::data_local_dir() {
            paths.push(local.join("Google/Chrome/User Data/Default/Bookmarks"));
        }
    } else if let Some(config) = dirs::config_dir() {
        paths.push(config.join("google-chrome/Default/Bookmarks"));
        paths.push(config.join("chromium/Default/Bookmarks"));
    }
    paths
}

/// Flatten a Chrome bookmarks document into a list.
pub fn parse_chrome_bookmarks(raw: &str) -> Result<Vec<Bookmark>, CapabilityError> {
    let doc: Value = serde_json::from_str(raw)?;
    let roots = doc
        .get("roots")
        .ok_or_else(|| CapabilityError::new("bookmarks file has no 'roots'"))?;
    let mut out = Vec::new();
    walk(roots, "", &mut out);
    Ok(out)
}

fn walk(node: &Value, folder: &str, out: &mut Vec<Bookmark>) {
    let Some(obj) = node.as_object() else {
        return;
    };
    match obj.get("type").and_then(Value::as_str) {
        Some("url") => out.push(Bookmark {
            url: str_field(node, "url"),
            title: str_field(node, "name"),
            date_added: obj
                .get("date_added")
                .and_then(Value::as_str)
                .and_then(chrome_timestamp),
            folder: folder.to_string(),
            tags: Vec::new(),
        }),
        Some("folder") => {
            let name = str_field(node, "name");
            let sub = if folder.is_empty() {
                name
            } else {
                format!("{folder}/{name}")
            };
            if let Some(children) = obj.get("children").and_then(Value::as_array) {
                for child in children {
                    walk(child, &sub, out);
                }
            }
        }
        _ => {
            for value in obj.values() {
                walk(value, folder, out);
            }
        }
    }
}

fn str_field(node: &Value, key: &str) -> String {
    node.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Convert Chrome's microseconds-since-1601 string to UTC.
fn chrome_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let micros: i64 = raw.parse().ok()?;
    DateTime::from_timestamp_micros(micros.checked_sub(CHROME_EPOCH_OFFSET_MICROS)?)
}
