//! Review batches: creation from classified email and the approval state
//! machine.
//!
//! ```text
//! PENDING ──review──▶ APPROVED | REJECTED | PARTIAL   (terminal)
//! ```
//!
//! The status is recomputed from the full set of action flags on every
//! transition; it is never patched incrementally.

use std::collections::{BTreeMap, HashMap};

use rusqlite::{params, TransactionBehavior};
use serde::Serialize;
use serde_json::{json, Map, Value};

use super::database::{insert_item, now, query_batch, LedgerDatabase};
use super::errors::LedgerError;
use super::types::{
    ActionKind, ApprovalRequest, ContentSource, NewContentItem, ReviewBatch, ReviewStatus,
};
use crate::capabilities::EmailMessage;
use crate::classifier::{ClassificationResult, SuggestedAction};

/// Label applied when a label action carries no name.
pub const DEFAULT_LABEL: &str = "automate/general";

/// Result of a review transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewOutcome {
    pub batch: ReviewBatch,
    pub approved_count: usize,
    pub rejected_count: usize,
}

// ─── Pure State Machine ─────────────────────────────────────────────────────

/// Batch status for a set of approval flags.
///
/// All true → approved, none true → rejected, otherwise partial. An empty
/// set has no true flag and is therefore rejected.
pub fn compute_status(flags: &[bool]) -> ReviewStatus {
    let approved = flags.iter().filter(|f| **f).count();
    if approved == 0 {
        ReviewStatus::Rejected
    } else if approved == flags.len() {
        ReviewStatus::Approved
    } else {
        ReviewStatus::Partial
    }
}

/// The flag each action gets, and the resulting batch status.
///
/// A batch without actions is approved by a blanket approval and rejected
/// by anything else.
pub fn apply_decision(action_ids: &[i64], request: &ApprovalRequest) -> (Vec<bool>, ReviewStatus) {
    let flags: Vec<bool> = action_ids.iter().map(|id| request.approves(*id)).collect();
    let status = if action_ids.is_empty()
        && !request.reject_all
        && request.approved_action_ids.is_none()
    {
        ReviewStatus::Approved
    } else {
        compute_status(&flags)
    };
    (flags, status)
}

/// The action a suggestion turns into. `keep` proposes nothing.
pub fn action_for(suggestion: SuggestedAction) -> Option<ActionKind> {
    match suggestion {
        SuggestedAction::Archive => Some(ActionKind::Archive),
        SuggestedAction::Delete => Some(ActionKind::Delete),
        SuggestedAction::Unsubscribe => Some(ActionKind::Unsubscribe),
        SuggestedAction::Label => Some(ActionKind::Label),
        SuggestedAction::DraftReply => Some(ActionKind::DraftReply),
        SuggestedAction::MarkRead => Some(ActionKind::MarkRead),
        SuggestedAction::Keep => None,
    }
}

/// Parameters stored with a proposed action.
pub fn action_params(kind: ActionKind, classification: &ClassificationResult) -> Value {
    let mut params = Map::new();
    match kind {
        ActionKind::Label => {
            params.insert(
                "label".into(),
                json!(format!("automate/{}", classification.category.as_str())),
            );
        }
        ActionKind::Unsubscribe => {
            if let Some(url) = &classification.unsubscribe_url {
                params.insert("unsubscribe_url".into(), json!(url));
            }
        }
        ActionKind::DraftReply => {
            if let Some(body) = &classification.reply_body {
                params.insert("reply_body".into(), json!(body));
            }
        }
        _ => {}
    }
    Value::Object(params)
}

/// `"Email batch: 2 junk, 1 personal"`: counts per category, alphabetical.
pub fn batch_summary<'a>(categories: impl IntoIterator<Item = &'a str>) -> String {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for category in categories {
        *counts.entry(category).or_default() += 1;
    }
    let parts: Vec<String> = counts
        .iter()
        .map(|(category, count)| format!("{count} {category}"))
        .collect();
    format!("Email batch: {}", parts.join(", "))
}

// ─── Ledger Operations ──────────────────────────────────────────────────────

impl LedgerDatabase {
    /// Record a classified email run as one pending batch.
    ///
    /// Classifications without a matching message are skipped but still
    /// counted in `item_count`. Nothing is executed here.
    pub fn create_email_batch(
        &mut self,
        account_id: i64,
        classifications: &[ClassificationResult],
        messages: &[EmailMessage],
    ) -> Result<ReviewBatch, LedgerError> {
        if self.get_account(account_id)?.is_none() {
            return Err(LedgerError::AccountNotFound { account_id });
        }
        let by_id: HashMap<&str, &EmailMessage> =
            messages.iter().map(|m| (m.id.as_str(), m)).collect();

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute(
            "INSERT INTO review_batches (account_id, status, item_count, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                account_id,
                ReviewStatus::Pending.as_str(),
                classifications.len() as i64,
                now()
            ],
        )?;
        let batch_id = tx.last_insert_rowid();

        let mut categories = Vec::new();
        let mut action_count = 0usize;
        for classification in classifications {
            let Some(msg) = by_id.get(classification.email_id.as_str()) else {
                tracing::debug!(email_id = %classification.email_id, "no message for classification, skipping");
                continue;
            };

            let item_id = insert_item(&tx, &email_item(account_id, classification, msg))?;

            for kind in classification.suggested_actions.iter().filter_map(|s| action_for(*s)) {
                let params_json = serde_json::to_string(&action_params(kind, classification))?;
                tx.execute(
                    "INSERT INTO proposed_actions
                     (batch_id, content_item_id, action_type, action_params, reason)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![batch_id, item_id, kind.as_str(), params_json, classification.reason],
                )?;
                action_count += 1;
            }
            categories.push(classification.category.as_str());
        }

        let summary = batch_summary(categories);
        tx.execute(
            "UPDATE review_batches SET batch_summary = ?2 WHERE id = ?1",
            params![batch_id, summary],
        )?;
        let batch = query_batch(&tx, batch_id)?.ok_or(LedgerError::BatchNotFound { batch_id })?;
        tx.commit()?;

        tracing::info!(batch_id, account_id, actions = action_count, summary = %batch.batch_summary, "review batch created");
        Ok(batch)
    }

    /// Apply a reviewer's decision to a pending batch.
    ///
    /// The read, the recomputation and the writes share one IMMEDIATE
    /// transaction, so two concurrent reviews of one batch cannot both
    /// succeed. A batch that has left PENDING is rejected with
    /// [`LedgerError::BatchNotPending`].
    pub fn review_batch(
        &mut self,
        batch_id: i64,
        request: &ApprovalRequest,
    ) -> Result<ReviewOutcome, LedgerError> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let batch = query_batch(&tx, batch_id)?.ok_or(LedgerError::BatchNotFound { batch_id })?;
        if batch.status != ReviewStatus::Pending {
            return Err(LedgerError::BatchNotPending {
                batch_id,
                status: batch.status,
            });
        }

        let action_ids: Vec<i64> = {
            let mut stmt =
                tx.prepare("SELECT id FROM proposed_actions WHERE batch_id = ?1 ORDER BY id ASC")?;
            let rows = stmt.query_map(params![batch_id], |row| row.get(0))?;
            let mut ids = Vec::new();
            for row in rows {
                ids.push(row?);
            }
            ids
        };

        if let Some(requested) = &request.approved_action_ids {
            let unknown = requested.iter().filter(|id| !action_ids.contains(*id)).count();
            if unknown > 0 {
                tracing::debug!(batch_id, unknown, "ignoring approval ids outside the batch");
            }
        }

        let (flags, status) = apply_decision(&action_ids, request);
        {
            let mut stmt = tx.prepare("UPDATE proposed_actions SET approved = ?2 WHERE id = ?1")?;
            for (id, flag) in action_ids.iter().zip(&flags) {
                stmt.execute(params![id, *flag as i32])?;
            }
        }
        tx.execute(
            "UPDATE review_batches SET status = ?2, reviewed_at = ?3 WHERE id = ?1",
            params![batch_id, status.as_str(), now()],
        )?;
        let batch = query_batch(&tx, batch_id)?.ok_or(LedgerError::BatchNotFound { batch_id })?;
        tx.commit()?;

        let approved_count = flags.iter().filter(|f| **f).count();
        let outcome = ReviewOutcome {
            batch,
            approved_count,
            rejected_count: flags.len() - approved_count,
        };
        tracing::info!(
            batch_id,
            status = %status,
            approved = outcome.approved_count,
            rejected = outcome.rejected_count,
            "review batch decided"
        );
        Ok(outcome)
    }
}

fn email_item(
    account_id: i64,
    classification: &ClassificationResult,
    msg: &EmailMessage,
) -> NewContentItem {
    NewContentItem {
        account_id,
        source: ContentSource::Email,
        external_id: msg.id.clone(),
        title: msg.subject.clone(),
        snippet: msg.snippet.clone(),
        full_content: (!msg.body_text.is_empty()).then(|| msg.body_text.clone()),
        sender: (!msg.sender.is_empty()).then(|| msg.sender.clone()),
        url: None,
        metadata: json!({
            "thread_id": (!msg.thread_id.is_empty()).then_some(&msg.thread_id),
            "date": msg.date,
            "labels": msg.labels,
            "has_attachments": msg.has_attachments,
            "priority": classification.priority,
        }),
        category: Some(classification.category.as_str().to_string()),
        summary: Some(classification.reason.clone()),
        sensitivity_flag: classification.is_sensitive,
        ai_provider_used: Some(
            if classification.analyzed_locally {
                "local"
            } else {
                "cloud"
            }
            .to_string(),
        ),
    }
}
