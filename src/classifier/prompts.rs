//! Prompt templates for email triage and content distillation.
//!
//! Every template has exactly one placeholder, `{content}`, which receives a
//! pre-formatted block (headers plus body). User text is therefore never
//! interpreted as a template.

use crate::capabilities::{Bookmark, EmailMessage, FetchedContent};

/// Longest body excerpt sent to a model for email triage.
pub const EMAIL_BODY_PREVIEW_CHARS: usize = 2000;

/// Longest HTML excerpt scanned for an unsubscribe link.
pub const UNSUBSCRIBE_BODY_CHARS: usize = 6000;

pub const EMAIL_SCREENING_TEMPLATE: &str = r#"Analyze this email for sensitive content. Respond with ONLY "SENSITIVE" or "CLEAN".

Sensitive means: contains PII (SSN, account numbers, medical info, passwords, financial details),
or is clearly personal/private in nature (health, legal, intimate).

Email:
{content}

Your response (one word):"#;

pub const EMAIL_CLASSIFICATION_TEMPLATE: &str = r#"Classify this email into exactly ONE category and provide a brief reason.

Categories:
- JUNK: spam, marketing you never signed up for, scams
- NEWSLETTER: subscribed newsletters, digests, updates from services
- RECEIPT: purchase confirmations, shipping notifications, invoices
- SOCIAL: social media notifications, friend requests
- ACTIONABLE: requires a response or action from the user
- FYI: informational, no action needed but worth knowing
- PERSONAL: from a real person, personal communication
- IMPORTANT: urgent, time-sensitive, or high-priority

Email:
{content}

Respond in JSON format:
{"category": "CATEGORY", "reason": "brief reason", "suggested_actions": ["action1"], "priority": 1-5}

Suggested actions can include: archive, delete, unsubscribe, label, draft_reply, mark_read, keep
Priority: 1=ignore, 2=low, 3=normal, 4=high, 5=urgent
If you suggest unsubscribe and see the link, add "unsubscribe_url".
If you suggest draft_reply, add a short "reply_body"."#;

pub const UNSUBSCRIBE_TEMPLATE: &str = r#"Look at this email body and find any unsubscribe link or mechanism.

Email body (HTML):
{content}

If you find an unsubscribe link, respond with JSON:
{"has_unsubscribe": true, "unsubscribe_url": "the url", "method": "link"}

If there's a mailto unsubscribe:
{"has_unsubscribe": true, "unsubscribe_url": "mailto:...", "method": "mailto"}

If none found:
{"has_unsubscribe": false}"#;

pub const BOOKMARK_SCREENING_TEMPLATE: &str = r#"Analyze this saved web page for sensitive content. Respond with ONLY "SENSITIVE" or "CLEAN".

Sensitive means: contains PII (SSN, account numbers, medical info, passwords, financial details),
or is clearly personal/private in nature (health, legal, intimate), such as a private
document, an account dashboard or a medical portal.

Page:
{content}

Your response (one word):"#;

pub const DISTILL_TEMPLATE: &str = r#"Analyze this article/page and provide a structured digest.

{content}

Respond in JSON:
{
    "summary": "2-3 sentence summary of the key points",
    "key_takeaways": ["takeaway 1", "takeaway 2", "takeaway 3"],
    "category": "one of: tech, business, science, health, politics, culture, tutorial, reference, tool, other",
    "suggested_tags": ["tag1", "tag2", "tag3"],
    "read_time_minutes": estimated_minutes_to_read_original
}"#;

/// The block substituted into the email templates.
pub fn email_block(msg: &EmailMessage) -> String {
    let body: String = msg.best_body().chars().take(EMAIL_BODY_PREVIEW_CHARS).collect();
    format!(
        "From: {}\nSubject: {}\nDate: {}\nBody: {}",
        msg.sender, msg.subject, msg.date, body
    )
}

/// The block substituted into the unsubscribe template.
pub fn unsubscribe_block(msg: &EmailMessage) -> String {
    let body = if msg.body_html.trim().is_empty() {
        msg.best_body()
    } else {
        &msg.body_html
    };
    body.chars().take(UNSUBSCRIBE_BODY_CHARS).collect()
}

/// The block substituted into the bookmark templates.
pub fn bookmark_block(bookmark: &Bookmark, page: &FetchedContent) -> String {
    let title = if bookmark.title.is_empty() {
        &page.title
    } else {
        &bookmark.title
    };
    format!(
        "Title: {title}\nURL: {}\nContent:\n{}",
        bookmark.url, page.text
    )
}
