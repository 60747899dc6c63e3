//! Email triage: screen, classify, and parse into a typed result.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::parse::{first_json_object, int_field, string_field, string_list, truncate_chars};
use super::prompts::{
    email_block, unsubscribe_block, EMAIL_CLASSIFICATION_TEMPLATE, EMAIL_SCREENING_TEMPLATE,
    UNSUBSCRIBE_TEMPLATE,
};
use crate::capabilities::EmailMessage;
use crate::inference::{CompletionRequest, ProviderKind};
use crate::privacy::screening::render;
use crate::privacy::{PrivacyRouter, RouterError};

/// Characters of raw model output kept as the reason when parsing fails.
const FALLBACK_REASON_CHARS: usize = 200;

const DEFAULT_PRIORITY: u8 = 3;

// ─── Categories & Actions ───────────────────────────────────────────────────

/// Triage category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailCategory {
    Junk,
    Newsletter,
    Receipt,
    Social,
    Actionable,
    Fyi,
    Personal,
    Important,
    /// Classification of this message failed.
    Error,
}

impl EmailCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailCategory::Junk => "junk",
            EmailCategory::Newsletter => "newsletter",
            EmailCategory::Receipt => "receipt",
            EmailCategory::Social => "social",
            EmailCategory::Actionable => "actionable",
            EmailCategory::Fyi => "fyi",
            EmailCategory::Personal => "personal",
            EmailCategory::Important => "important",
            EmailCategory::Error => "error",
        }
    }

    /// Case-insensitive parse of a model-produced category.
    ///
    /// `error` is internal and never accepted from a model.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "junk" => Some(EmailCategory::Junk),
            "newsletter" => Some(EmailCategory::Newsletter),
            "receipt" => Some(EmailCategory::Receipt),
            "social" => Some(EmailCategory::Social),
            "actionable" => Some(EmailCategory::Actionable),
            "fyi" => Some(EmailCategory::Fyi),
            "personal" => Some(EmailCategory::Personal),
            "important" => Some(EmailCategory::Important),
            _ => None,
        }
    }
}

impl fmt::Display for EmailCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An action the classifier may suggest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    Archive,
    Delete,
    Unsubscribe,
    Label,
    DraftReply,
    MarkRead,
    /// Leave the message alone. Never becomes a proposed action.
    Keep,
}

impl SuggestedAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestedAction::Archive => "archive",
            SuggestedAction::Delete => "delete",
            SuggestedAction::Unsubscribe => "unsubscribe",
            SuggestedAction::Label => "label",
            SuggestedAction::DraftReply => "draft_reply",
            SuggestedAction::MarkRead => "mark_read",
            SuggestedAction::Keep => "keep",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "archive" => Some(SuggestedAction::Archive),
            "delete" | "trash" => Some(SuggestedAction::Delete),
            "unsubscribe" => Some(SuggestedAction::Unsubscribe),
            "label" => Some(SuggestedAction::Label),
            "draft_reply" | "reply" => Some(SuggestedAction::DraftReply),
            "mark_read" => Some(SuggestedAction::MarkRead),
            "keep" => Some(SuggestedAction::Keep),
            _ => None,
        }
    }
}

// ─── Result ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub email_id: String,
    pub category: EmailCategory,
    pub reason: String,
    pub suggested_actions: Vec<SuggestedAction>,
    /// 1 = ignore … 5 = urgent.
    pub priority: u8,
    pub is_sensitive: bool,
    pub analyzed_locally: bool,
    pub unsubscribe_url: Option<String>,
    pub reply_body: Option<String>,
}

impl ClassificationResult {
    /// The result recorded for a message whose classification failed.
    pub fn failed(email_id: &str, error: &str) -> Self {
        Self {
            email_id: email_id.to_string(),
            category: EmailCategory::Error,
            reason: error.to_string(),
            suggested_actions: vec![SuggestedAction::Keep],
            priority: DEFAULT_PRIORITY,
            is_sensitive: false,
            analyzed_locally: true,
            unsubscribe_url: None,
            reply_body: None,
        }
    }

    pub fn suggests(&self, action: SuggestedAction) -> bool {
        self.suggested_actions.contains(&action)
    }
}

/// Parse a classification answer. Never fails: unparseable output becomes
/// an `fyi` result whose reason is the start of the raw text.
pub fn parse_classification(
    email_id: &str,
    raw: &str,
    is_sensitive: bool,
    analyzed_locally: bool,
) -> ClassificationResult {
    let Some(obj) = first_json_object(raw) else {
        tracing::debug!(email_id, raw_len = raw.len(), "classification was not JSON");
        return ClassificationResult {
            email_id: email_id.to_string(),
            category: EmailCategory::Fyi,
            reason: truncate_chars(raw, FALLBACK_REASON_CHARS),
            suggested_actions: vec![SuggestedAction::Keep],
            priority: DEFAULT_PRIORITY,
            is_sensitive,
            analyzed_locally,
            unsubscribe_url: None,
            reply_body: None,
        };
    };

    let category = string_field(&obj, "category")
        .and_then(|c| EmailCategory::parse(&c))
        .unwrap_or(EmailCategory::Fyi);

    let mut suggested_actions: Vec<SuggestedAction> = Vec::new();
    for action in string_list(&obj, "suggested_actions")
        .iter()
        .filter_map(|a| SuggestedAction::parse(a))
    {
        if !suggested_actions.contains(&action) {
            suggested_actions.push(action);
        }
    }
    if suggested_actions.is_empty() {
        suggested_actions.push(SuggestedAction::Keep);
    }

    let priority = int_field(&obj, "priority")
        .map(|p| p.clamp(1, 5) as u8)
        .unwrap_or(DEFAULT_PRIORITY);

    ClassificationResult {
        email_id: email_id.to_string(),
        category,
        reason: string_field(&obj, "reason").unwrap_or_default(),
        suggested_actions,
        priority,
        is_sensitive,
        analyzed_locally,
        unsubscribe_url: string_field(&obj, "unsubscribe_url").filter(|u| is_unsubscribe_target(u)),
        reply_body: string_field(&obj, "reply_body"),
    }
}

fn is_unsubscribe_target(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("mailto:")
}

// ─── Classification ─────────────────────────────────────────────────────────

/// Classify one message through the privacy router.
///
/// Only routing failures are errors; anything the model says is parsed into
/// a result. When the model suggests unsubscribing without naming a link,
/// the local model is asked to find one.
pub async fn classify_email(
    router: &PrivacyRouter,
    msg: &EmailMessage,
    preferred: Option<ProviderKind>,
) -> Result<ClassificationResult, RouterError> {
    let outcome = router
        .screen_then_analyze(
            &email_block(msg),
            EMAIL_SCREENING_TEMPLATE,
            EMAIL_CLASSIFICATION_TEMPLATE,
            preferred,
        )
        .await?;

    let mut result = parse_classification(
        &msg.id,
        &outcome.analysis.text,
        outcome.decision.sensitive,
        outcome.kept_local,
    );

    if result.suggests(SuggestedAction::Unsubscribe) && result.unsubscribe_url.is_none() {
        result.unsubscribe_url = find_unsubscribe_url(router, msg).await;
    }

    tracing::info!(
        email_id = %msg.id,
        category = %result.category,
        priority = result.priority,
        sensitive = result.is_sensitive,
        local = result.analyzed_locally,
        "classified email"
    );
    Ok(result)
}

/// Classify messages one after another. A failure affects only its own
/// message, which gets an `error` result.
pub async fn batch_classify(
    router: &PrivacyRouter,
    messages: &[EmailMessage],
    preferred: Option<ProviderKind>,
) -> Vec<ClassificationResult> {
    let mut results = Vec::with_capacity(messages.len());
    for msg in messages {
        match classify_email(router, msg, preferred).await {
            Ok(result) => results.push(result),
            Err(e) => {
                tracing::error!(email_id = %msg.id, error = %e, "failed to classify email");
                results.push(ClassificationResult::failed(&msg.id, &e.to_string()));
            }
        }
    }
    results
}

/// Ask the local model for the message's unsubscribe link.
///
/// The body can be anything the sender wrote, so this never leaves the
/// local provider. Any failure yields `None`.
pub async fn find_unsubscribe_url(router: &PrivacyRouter, msg: &EmailMessage) -> Option<String> {
    let body = unsubscribe_block(msg);
    if body.trim().is_empty() {
        return None;
    }
    let request = CompletionRequest::new(render(UNSUBSCRIBE_TEMPLATE, &body)).with_temperature(0.1);
    let response = match router.complete(&request, Some(ProviderKind::Ollama)).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(email_id = %msg.id, error = %e, "unsubscribe lookup failed");
            return None;
        }
    };

    let obj = first_json_object(&response.text)?;
    if obj.get("has_unsubscribe").and_then(serde_json::Value::as_bool) == Some(false) {
        return None;
    }
    string_field(&obj, "unsubscribe_url").filter(|u| is_unsubscribe_target(u))
}
