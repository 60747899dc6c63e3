//! Outbound capabilities: the external systems the triage pipeline reads
//! from and acts on.
//!
//! Each capability is an async trait so the command layer can be wired to a
//! real mail provider in production and to in-memory fakes in tests.

pub mod bookmarks;
pub mod content;
pub mod mail;
pub mod unsubscribe;

use thiserror::Error;

pub use bookmarks::{Bookmark, BookmarkSource, ChromeBookmarks};
pub use content::{ContentFetcher, FetchedContent, HttpContentFetcher};
pub use mail::{EmailMessage, MailCapability};
pub use unsubscribe::{HttpUnsubscriber, UnsubscribeClient};

/// A failed call to an external capability.
///
/// Carries only a message: the executor records it verbatim as the
/// action's error.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct CapabilityError {
    pub message: String,
}

impl CapabilityError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for CapabilityError {
    fn from(e: reqwest::Error) -> Self {
        CapabilityError::new(e.to_string())
    }
}

impl From<std::io::Error> for CapabilityError {
    fn from(e: std::io::Error) -> Self {
        CapabilityError::new(e.to_string())
    }
}

impl From<serde_json::Error> for CapabilityError {
    fn from(e: serde_json::Error) -> Self {
        CapabilityError::new(format!("invalid JSON: {e}"))
    }
}
