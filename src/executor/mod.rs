//! Action executor: applies approved actions against the mailbox.
//!
//! A pass snapshots the runnable actions under the ledger lock, performs
//! every side effect with the lock released, then writes all outcomes back
//! in one transaction. One action failing never stops the others.

use std::sync::Mutex;

use serde::Serialize;
use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

use crate::capabilities::{CapabilityError, MailCapability, UnsubscribeClient};
use crate::ledger::{
    ActionKind, ActionOutcome, ContentItem, LedgerDatabase, LedgerError, ProposedAction,
    DEFAULT_LABEL,
};

/// Error recorded for an action whose content item is gone.
pub const MISSING_ITEM_ERROR: &str = "Content item not found";

// ─── Errors ─────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("ledger lock poisoned")]
    LockPoisoned,

    /// The action kind has no mailbox counterpart.
    #[error("unsupported action: {kind}")]
    UnsupportedAction { kind: ActionKind },

    #[error(transparent)]
    Capability(#[from] CapabilityError),

    /// The unsubscribe request failed; the message was still archived.
    #[error("unsubscribe request to {url} failed: {reason}")]
    UnsubscribeFailed { url: String, reason: String },

    /// Neither the unsubscribe request nor the archive went through.
    #[error("unsubscribe request to {url} failed: {reason}; archive failed: {archive}")]
    UnsubscribeAndArchiveFailed {
        url: String,
        reason: String,
        archive: String,
    },
}

// ─── Summary ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionFailure {
    pub action_id: i64,
    pub error: String,
}

/// Counts for one execution pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Dispatch failures. Actions with a missing item count as failed but
    /// are not listed here.
    pub errors: Vec<ActionFailure>,
}

// ─── Execution ──────────────────────────────────────────────────────────────

/// Execute every approved, not-yet-executed action of a reviewed batch.
///
/// A pending batch has nothing runnable and yields an empty summary.
pub async fn execute_approved_actions(
    ledger: &Mutex<LedgerDatabase>,
    batch_id: i64,
    mail: &dyn MailCapability,
    unsubscriber: &dyn UnsubscribeClient,
) -> Result<ExecutionSummary, ExecutorError> {
    let pass_id = Uuid::new_v4();
    let span = tracing::info_span!("execute_batch", batch_id, pass_id = %pass_id);
    run_pass(ledger, batch_id, mail, unsubscriber)
        .instrument(span)
        .await
}

async fn run_pass(
    ledger: &Mutex<LedgerDatabase>,
    batch_id: i64,
    mail: &dyn MailCapability,
    unsubscriber: &dyn UnsubscribeClient,
) -> Result<ExecutionSummary, ExecutorError> {
    let work: Vec<(ProposedAction, Option<ContentItem>)> = {
        let db = ledger.lock().map_err(|_| ExecutorError::LockPoisoned)?;
        let mut work = Vec::new();
        for action in db.executable_actions(batch_id)? {
            let item = db.get_content_item(action.content_item_id)?;
            work.push((action, item));
        }
        work
    };

    let mut summary = ExecutionSummary {
        total: work.len(),
        ..Default::default()
    };
    let mut outcomes = Vec::with_capacity(work.len());

    for (action, item) in &work {
        let Some(item) = item else {
            tracing::warn!(action_id = action.id, "content item missing, marking failed");
            summary.failed += 1;
            outcomes.push(ActionOutcome {
                action_id: action.id,
                error: Some(MISSING_ITEM_ERROR.to_string()),
            });
            continue;
        };

        match dispatch(action, item, mail, unsubscriber).await {
            Ok(()) => {
                tracing::info!(
                    action_id = action.id,
                    kind = %action.action_kind,
                    external_id = %item.external_id,
                    "executed action"
                );
                summary.succeeded += 1;
                outcomes.push(ActionOutcome {
                    action_id: action.id,
                    error: None,
                });
            }
            Err(e) => {
                let error = e.to_string();
                tracing::error!(
                    action_id = action.id,
                    kind = %action.action_kind,
                    external_id = %item.external_id,
                    error = %error,
                    "action failed"
                );
                summary.failed += 1;
                summary.errors.push(ActionFailure {
                    action_id: action.id,
                    error: error.clone(),
                });
                outcomes.push(ActionOutcome {
                    action_id: action.id,
                    error: Some(error),
                });
            }
        }
    }

    {
        let mut db = ledger.lock().map_err(|_| ExecutorError::LockPoisoned)?;
        db.record_outcomes(&outcomes)?;
    }

    tracing::info!(
        total = summary.total,
        succeeded = summary.succeeded,
        failed = summary.failed,
        "execution pass finished"
    );
    Ok(summary)
}

/// Perform one action against the mailbox.
async fn dispatch(
    action: &ProposedAction,
    item: &ContentItem,
    mail: &dyn MailCapability,
    unsubscriber: &dyn UnsubscribeClient,
) -> Result<(), ExecutorError> {
    let message_id = item.external_id.as_str();

    match action.action_kind {
        ActionKind::Archive => mail.archive(message_id).await?,
        ActionKind::Delete => mail.trash(message_id).await?,
        ActionKind::MarkRead => mail.mark_read(message_id).await?,
        ActionKind::Label => {
            let name = action.param_str("label").unwrap_or(DEFAULT_LABEL);
            let label_id = mail.get_or_create_label(name).await?;
            mail.add_label(message_id, &label_id).await?;
        }
        ActionKind::Unsubscribe => {
            let mut failure = None;
            if let Some(url) = action.param_str("unsubscribe_url").filter(|u| is_http(u)) {
                if let Err(e) = unsubscriber.unsubscribe(url).await {
                    failure = Some((url.to_string(), e.to_string()));
                }
            }
            let archived = mail.archive(message_id).await;
            match (failure, archived) {
                (None, archived) => archived?,
                (Some((url, reason)), Ok(())) => {
                    return Err(ExecutorError::UnsubscribeFailed { url, reason });
                }
                (Some((url, reason)), Err(e)) => {
                    return Err(ExecutorError::UnsubscribeAndArchiveFailed {
                        url,
                        reason,
                        archive: e.to_string(),
                    });
                }
            }
        }
        ActionKind::DraftReply => {
            let body = action.param_str("reply_body").filter(|b| !b.is_empty());
            let sender = item.sender.as_deref().filter(|s| !s.is_empty());
            if let (Some(body), Some(to)) = (body, sender) {
                let subject = format!("Re: {}", item.title);
                let thread_id = item.metadata_str("thread_id").filter(|t| !t.is_empty());
                mail.create_draft(to, &subject, body, thread_id).await?;
            } else {
                tracing::debug!(action_id = action.id, "draft reply without body or sender, nothing to do");
            }
        }
        ActionKind::BookmarkTag | ActionKind::PublishSummary => {
            return Err(ExecutorError::UnsupportedAction {
                kind: action.action_kind,
            });
        }
    }
    Ok(())
}

fn is_http(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}
