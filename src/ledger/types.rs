//! Ledger record types.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

// ─── Enums stored as TEXT ───────────────────────────────────────────────────

/// Where a content item came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentSource {
    Email,
    Bookmark,
    Rss,
    Photo,
}

impl ContentSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentSource::Email => "email",
            ContentSource::Bookmark => "bookmark",
            ContentSource::Rss => "rss",
            ContentSource::Photo => "photo",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "email" => Some(ContentSource::Email),
            "bookmark" => Some(ContentSource::Bookmark),
            "rss" => Some(ContentSource::Rss),
            "photo" => Some(ContentSource::Photo),
            _ => None,
        }
    }
}

/// Status of a review batch. Only `Pending` accepts a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected,
    Partial,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::Approved => "approved",
            ReviewStatus::Rejected => "rejected",
            ReviewStatus::Partial => "partial",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ReviewStatus::Pending),
            "approved" => Some(ReviewStatus::Approved),
            "rejected" => Some(ReviewStatus::Rejected),
            "partial" => Some(ReviewStatus::Partial),
            _ => None,
        }
    }
}

impl std::fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A side effect that can be proposed for review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Label,
    Archive,
    Delete,
    Unsubscribe,
    DraftReply,
    MarkRead,
    BookmarkTag,
    PublishSummary,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Label => "label",
            ActionKind::Archive => "archive",
            ActionKind::Delete => "delete",
            ActionKind::Unsubscribe => "unsubscribe",
            ActionKind::DraftReply => "draft_reply",
            ActionKind::MarkRead => "mark_read",
            ActionKind::BookmarkTag => "bookmark_tag",
            ActionKind::PublishSummary => "publish_summary",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "label" => Some(ActionKind::Label),
            "archive" => Some(ActionKind::Archive),
            "delete" => Some(ActionKind::Delete),
            "unsubscribe" => Some(ActionKind::Unsubscribe),
            "draft_reply" => Some(ActionKind::DraftReply),
            "mark_read" => Some(ActionKind::MarkRead),
            "bookmark_tag" => Some(ActionKind::BookmarkTag),
            "publish_summary" => Some(ActionKind::PublishSummary),
            _ => None,
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Records ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub name: String,
    pub email: String,
    /// Mail provider credential. `None` once revoked.
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    pub is_active: bool,
    pub created_at: String,
}

/// A content item to be inserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewContentItem {
    pub account_id: i64,
    pub source: ContentSource,
    pub external_id: String,
    pub title: String,
    pub snippet: String,
    pub full_content: Option<String>,
    pub sender: Option<String>,
    pub url: Option<String>,
    pub metadata: serde_json::Value,
    pub category: Option<String>,
    pub summary: Option<String>,
    pub sensitivity_flag: bool,
    /// `"local"` or `"cloud"`.
    pub ai_provider_used: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: i64,
    pub account_id: i64,
    pub source: ContentSource,
    pub external_id: String,
    pub title: String,
    pub snippet: String,
    pub full_content: Option<String>,
    pub sender: Option<String>,
    pub url: Option<String>,
    pub metadata: serde_json::Value,
    pub category: Option<String>,
    pub summary: Option<String>,
    pub sensitivity_flag: bool,
    pub ai_provider_used: Option<String>,
    pub created_at: String,
    pub processed_at: Option<String>,
}

impl ContentItem {
    /// A string entry of the metadata map.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(serde_json::Value::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewBatch {
    pub id: i64,
    pub account_id: i64,
    pub status: ReviewStatus,
    pub batch_summary: String,
    pub item_count: i64,
    pub created_at: String,
    pub reviewed_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedAction {
    pub id: i64,
    pub batch_id: i64,
    pub content_item_id: i64,
    pub action_kind: ActionKind,
    pub action_params: serde_json::Value,
    pub reason: String,
    /// `None` until the batch is reviewed.
    pub approved: Option<bool>,
    pub executed: bool,
    pub executed_at: Option<String>,
    pub error: Option<String>,
}

impl ProposedAction {
    /// A string entry of the params map.
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.action_params
            .get(key)
            .and_then(serde_json::Value::as_str)
    }
}

/// An action joined with the item it applies to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDetail {
    pub action: ProposedAction,
    pub item: Option<ContentItem>,
}

/// A batch with everything needed to review it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchDetails {
    pub batch: ReviewBatch,
    pub actions: Vec<ActionDetail>,
}

/// A reviewer's decision on a pending batch.
///
/// `reject_all` wins over everything. Otherwise `None` approves every
/// action and `Some(ids)` approves exactly those.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    #[serde(default)]
    pub approved_action_ids: Option<HashSet<i64>>,
    #[serde(default)]
    pub reject_all: bool,
}

impl ApprovalRequest {
    pub fn approve_all() -> Self {
        Self::default()
    }

    pub fn reject_all() -> Self {
        Self {
            approved_action_ids: None,
            reject_all: true,
        }
    }

    pub fn approve_only(ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            approved_action_ids: Some(ids.into_iter().collect()),
            reject_all: false,
        }
    }

    /// Whether the action with `id` is approved under this decision.
    pub fn approves(&self, id: i64) -> bool {
        if self.reject_all {
            return false;
        }
        match &self.approved_action_ids {
            None => true,
            Some(ids) => ids.contains(&id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_round_trip_through_strings() {
        for kind in [
            ActionKind::Label,
            ActionKind::Archive,
            ActionKind::Delete,
            ActionKind::Unsubscribe,
            ActionKind::DraftReply,
            ActionKind::MarkRead,
            ActionKind::BookmarkTag,
            ActionKind::PublishSummary,
        ] {
            assert_eq!(ActionKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ReviewStatus::parse("partial"), Some(ReviewStatus::Partial));
        assert_eq!(ReviewStatus::parse("PENDING"), None);
        assert_eq!(ContentSource::parse("rss"), Some(ContentSource::Rss));
    }

    #[test]
    fn test_approval_request_semantics() {
        assert!(ApprovalRequest::approve_all().approves(7));
        assert!(!ApprovalRequest::reject_all().approves(7));
        let only = ApprovalRequest::approve_only([1, 2]);
        assert!(only.approves(1));
        assert!(!only.approves(3));
        let both = ApprovalRequest {
            approved_action_ids: Some([1].into_iter().collect()),
            reject_all: true,
        };
        assert!(!both.approves(1));
    }

    #[test]
    fn test_approval_request_deserializes_defaults() {
        let req: ApprovalRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req, ApprovalRequest::approve_all());
        let req: ApprovalRequest =
            serde_json::from_str(r#"{"approved_action_ids": [3, 4]}"#).unwrap();
        assert!(req.approves(3));
        assert!(!req.approves(5));
    }

    #[test]
    fn test_account_never_serializes_token() {
        let account = Account {
            id: 1,
            name: "Me".into(),
            email: "me@example.com".into(),
            refresh_token: Some("secret".into()),
            is_active: true,
            created_at: "2026-10-16T00:00:00Z".into(),
        };
        let json = serde_json::to_string(&account).unwrap();
        assert!(!json.contains("secret"));
    }
}
