//! Mail transport contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::CapabilityError;

/// One message as delivered by the mail transport.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub id: String,
    pub thread_id: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub body_text: String,
    #[serde(default)]
    pub body_html: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub has_attachments: bool,
}

impl EmailMessage {
    /// Plain-text body, or the snippet when the message has none.
    pub fn best_body(&self) -> &str {
        if self.body_text.trim().is_empty() {
            &self.snippet
        } else {
            &self.body_text
        }
    }
}

/// Operations against a user's mailbox.
///
/// Every mutating call is idempotent on the provider side (archiving an
/// archived message is a no-op), which is what makes at-least-once
/// execution safe.
#[async_trait]
pub trait MailCapability: Send + Sync {
    /// One page of messages matching `query`, plus the next page token.
    async fn fetch_messages(
        &self,
        query: &str,
        max_results: usize,
        page_token: Option<&str>,
    ) -> Result<(Vec<EmailMessage>, Option<String>), CapabilityError>;

    /// Remove the message from the inbox.
    async fn archive(&self, message_id: &str) -> Result<(), CapabilityError>;

    /// Move to trash. Never a permanent delete.
    async fn trash(&self, message_id: &str) -> Result<(), CapabilityError>;

    async fn mark_read(&self, message_id: &str) -> Result<(), CapabilityError>;

    /// Resolve a label name to its id, creating the label if needed.
    async fn get_or_create_label(&self, name: &str) -> Result<String, CapabilityError>;

    async fn add_label(&self, message_id: &str, label_id: &str) -> Result<(), CapabilityError>;

    /// Create (never send) a draft. Returns the draft id.
    async fn create_draft(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        thread_id: Option<&str>,
    ) -> Result<String, CapabilityError>;
}
