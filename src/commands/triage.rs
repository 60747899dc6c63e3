//! Email triage commands: classify into a review batch, then review it.

use serde::Serialize;

use super::{AppState, CommandError};
use crate::capabilities::EmailMessage;
use crate::classifier::batch_classify;
use crate::executor::{execute_approved_actions, ExecutionSummary};
use crate::ledger::{ApprovalRequest, LedgerError, ReviewStatus};

// ─── Response Types ─────────────────────────────────────────────────────────

/// A freshly proposed batch awaiting review.
#[derive(Debug, Clone, Serialize)]
pub struct BatchCreated {
    pub batch_id: i64,
    pub summary: String,
    pub item_count: i64,
}

/// Result of a review, with the execution pass when one ran.
#[derive(Debug, Clone, Serialize)]
pub struct ApprovalOutcome {
    pub batch_id: i64,
    pub status: ReviewStatus,
    pub approved_count: usize,
    pub rejected_count: usize,
    pub execution: Option<ExecutionSummary>,
}

// ─── Commands ───────────────────────────────────────────────────────────────

/// Classify `messages` and record the proposals as one pending batch.
///
/// Nothing touches the mailbox here. Messages whose classification fails
/// still land in the batch, under the `error` category with no actions.
pub async fn classify_and_propose(
    state: &AppState,
    account_id: i64,
    messages: &[EmailMessage],
) -> Result<BatchCreated, CommandError> {
    if messages.is_empty() {
        return Err(CommandError::Validation("no messages to classify".into()));
    }
    let max = state.settings.email_batch_size;
    if messages.len() > max {
        return Err(CommandError::Validation(format!(
            "{} messages exceed the batch size of {max}",
            messages.len()
        )));
    }

    // Fail before spending model calls on an unknown account.
    {
        let db = state.ledger()?;
        if db.get_account(account_id)?.is_none() {
            return Err(LedgerError::AccountNotFound { account_id }.into());
        }
    }

    tracing::info!(account_id, count = messages.len(), "classifying email batch");
    let classifications = batch_classify(&state.router, messages, None).await;

    let batch = {
        let mut db = state.ledger()?;
        db.create_email_batch(account_id, &classifications, messages)?
    };

    Ok(BatchCreated {
        batch_id: batch.id,
        summary: batch.batch_summary,
        item_count: batch.item_count,
    })
}

/// Apply a reviewer's decision and execute whatever it approved.
///
/// Reviews of the same batch are serialized; the second one sees a batch
/// that is no longer pending and fails with `BatchNotPending`.
pub async fn review_batch(
    state: &AppState,
    batch_id: i64,
    request: &ApprovalRequest,
) -> Result<ApprovalOutcome, CommandError> {
    let _guard = state.locks.lock(batch_id).await;

    let outcome = {
        let mut db = state.ledger()?;
        db.review_batch(batch_id, request)?
    };

    let execution = if outcome.approved_count > 0 {
        Some(
            execute_approved_actions(
                &state.ledger,
                batch_id,
                state.mail.as_ref(),
                state.unsubscriber.as_ref(),
            )
            .await?,
        )
    } else {
        None
    };

    Ok(ApprovalOutcome {
        batch_id,
        status: outcome.batch.status,
        approved_count: outcome.approved_count,
        rejected_count: outcome.rejected_count,
        execution,
    })
}

/// Run the approved actions of a reviewed batch that have not executed yet.
///
/// Picks up after a review whose execution pass was cut short. Actions that
/// already ran, successfully or not, are never repeated.
pub async fn execute_batch(
    state: &AppState,
    batch_id: i64,
) -> Result<ExecutionSummary, CommandError> {
    let _guard = state.locks.lock(batch_id).await;

    let status = {
        let db = state.ledger()?;
        db.get_batch(batch_id)?
            .ok_or(LedgerError::BatchNotFound { batch_id })?
            .status
    };
    if status == ReviewStatus::Pending {
        return Err(CommandError::Validation(format!(
            "batch {batch_id} has not been reviewed"
        )));
    }

    Ok(execute_approved_actions(
        &state.ledger,
        batch_id,
        state.mail.as_ref(),
        state.unsubscriber.as_ref(),
    )
    .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::commands::testing;
    use crate::inference::ProviderKind;
    use crate::test_support::{connection_refused, email, FakeProvider};

    const JUNK: &str = r#"{"category": "junk", "reason": "prize scam", "suggested_actions": ["delete"], "priority": 1}"#;
    const PERSONAL: &str = r#"{"category": "personal", "reason": "family", "suggested_actions": ["keep"], "priority": 4}"#;
    const PERSONAL_ARCHIVE: &str = r#"Sure! {"category": "personal", "reason": "old trip", "suggested_actions": ["archive", "mark_read"]}"#;

    fn inbox() -> Vec<EmailMessage> {
        vec![
            email("m1", "spam@x.com", "WIN", "prize"),
            email("m2", "mom@x.com", "Dinner", "Sunday?"),
            email("m3", "friend@x.com", "Trip", "photos"),
        ]
    }

    #[tokio::test]
    async fn test_classify_and_review_end_to_end() {
        let local = FakeProvider::new(ProviderKind::Ollama)
            .reply("CLEAN")
            .reply(JUNK)
            .reply("CLEAN")
            .reply(PERSONAL)
            .reply("CLEAN")
            .reply(PERSONAL_ARCHIVE)
            .arc();
        let (state, account, mail, _) = testing::state(local, vec![]);

        let created = classify_and_propose(&state, account, &inbox()).await.unwrap();
        assert_eq!(created.summary, "Email batch: 1 junk, 2 personal");
        assert_eq!(created.item_count, 3);
        assert!(mail.calls().is_empty());

        let outcome = review_batch(&state, created.batch_id, &ApprovalRequest::approve_all())
            .await
            .unwrap();
        assert_eq!(outcome.status, ReviewStatus::Approved);
        assert_eq!(outcome.approved_count, 3);
        let execution = outcome.execution.unwrap();
        assert_eq!(execution.total, 3);
        assert_eq!(execution.succeeded, 3);
        assert_eq!(mail.calls(), vec!["trash:m1", "archive:m3", "mark_read:m3"]);
    }

    #[tokio::test]
    async fn test_sensitive_mail_never_reaches_cloud() {
        let local = FakeProvider::new(ProviderKind::Ollama)
            .reply("SENSITIVE")
            .reply(PERSONAL)
            .arc();
        let claude = FakeProvider::new(ProviderKind::Claude).always(JUNK).arc();
        let (state, account, _, _) = testing::state(local, vec![claude.clone()]);

        let messages = vec![email("m1", "bank@x.com", "Statement", "IBAN DE89...")];
        let created = classify_and_propose(&state, account, &messages).await.unwrap();
        assert_eq!(created.summary, "Email batch: 1 personal");
        assert_eq!(claude.calls(), 0);

        let db = state.ledger().unwrap();
        let items = db.get_batch_details(created.batch_id).unwrap().unwrap();
        assert!(items.actions.is_empty());
    }

    #[tokio::test]
    async fn test_clean_mail_goes_to_cloud() {
        let local = FakeProvider::new(ProviderKind::Ollama).reply("CLEAN").arc();
        let claude = FakeProvider::new(ProviderKind::Claude).reply(JUNK).arc();
        let (state, account, _, _) = testing::state(local, vec![claude.clone()]);

        let messages = vec![email("m1", "spam@x.com", "WIN", "prize")];
        let created = classify_and_propose(&state, account, &messages).await.unwrap();
        assert_eq!(created.summary, "Email batch: 1 junk");
        assert_eq!(claude.calls(), 1);
    }

    #[tokio::test]
    async fn test_screening_outage_yields_error_category() {
        let local = FakeProvider::new(ProviderKind::Ollama)
            .fail(connection_refused())
            .arc();
        let claude = FakeProvider::new(ProviderKind::Claude).always(JUNK).arc();
        let (state, account, _, _) = testing::state(local, vec![claude.clone()]);

        let messages = vec![email("m1", "spam@x.com", "WIN", "prize")];
        let created = classify_and_propose(&state, account, &messages).await.unwrap();
        assert_eq!(created.summary, "Email batch: 1 error");
        assert_eq!(claude.calls(), 0);
    }

    #[tokio::test]
    async fn test_classify_validation() {
        let local = FakeProvider::new(ProviderKind::Ollama).arc();
        let (mut state, account, _, _) = testing::state(local.clone(), vec![]);

        let err = classify_and_propose(&state, account, &[]).await.unwrap_err();
        assert!(matches!(err, CommandError::Validation(_)));

        let err = classify_and_propose(&state, 999, &inbox()).await.unwrap_err();
        assert!(matches!(
            err,
            CommandError::Ledger(LedgerError::AccountNotFound { account_id: 999 })
        ));

        state.settings.email_batch_size = 2;
        let err = classify_and_propose(&state, account, &inbox()).await.unwrap_err();
        assert!(err.is_client_error());
        assert_eq!(local.calls(), 0);
    }

    #[tokio::test]
    async fn test_reject_all_runs_nothing() {
        let local = FakeProvider::new(ProviderKind::Ollama)
            .reply("CLEAN")
            .reply(JUNK)
            .arc();
        let (state, account, mail, _) = testing::state(local, vec![]);
        let created = classify_and_propose(&state, account, &inbox()[..1])
            .await
            .unwrap();

        let outcome = review_batch(&state, created.batch_id, &ApprovalRequest::reject_all())
            .await
            .unwrap();
        assert_eq!(outcome.status, ReviewStatus::Rejected);
        assert!(outcome.execution.is_none());
        assert!(mail.calls().is_empty());
    }

    #[tokio::test]
    async fn test_second_review_is_refused() {
        let local = FakeProvider::new(ProviderKind::Ollama)
            .reply("CLEAN")
            .reply(PERSONAL_ARCHIVE)
            .arc();
        let (state, account, mail, _) = testing::state(local, vec![]);
        let created = classify_and_propose(&state, account, &inbox()[2..])
            .await
            .unwrap();
        let state = Arc::new(state);

        let request = ApprovalRequest::approve_all();
        let (first, second) = tokio::join!(
            review_batch(&state, created.batch_id, &request),
            review_batch(&state, created.batch_id, &request),
        );
        let results = [first, second];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results.iter().any(|r| matches!(
            r,
            Err(CommandError::Ledger(LedgerError::BatchNotPending { .. }))
        )));
        assert_eq!(mail.calls(), vec!["archive:m3", "mark_read:m3"]);
    }

    #[tokio::test]
    async fn test_execute_batch_resumes_unexecuted_actions() {
        let local = FakeProvider::new(ProviderKind::Ollama)
            .reply("CLEAN")
            .reply(PERSONAL_ARCHIVE)
            .arc();
        let (state, account, mail, _) = testing::state(local, vec![]);
        let created = classify_and_propose(&state, account, &inbox()[2..])
            .await
            .unwrap();

        let err = execute_batch(&state, created.batch_id).await.unwrap_err();
        assert!(matches!(err, CommandError::Validation(_)));

        // Reviewed without an execution pass, as after an interrupted review.
        state
            .ledger()
            .unwrap()
            .review_batch(created.batch_id, &ApprovalRequest::approve_all())
            .unwrap();
        assert!(mail.calls().is_empty());

        let summary = execute_batch(&state, created.batch_id).await.unwrap();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(mail.calls(), vec!["archive:m3", "mark_read:m3"]);

        let again = execute_batch(&state, created.batch_id).await.unwrap();
        assert_eq!(again.total, 0);
        assert_eq!(mail.calls().len(), 2);

        let err = execute_batch(&state, 42).await.unwrap_err();
        assert!(matches!(
            err,
            CommandError::Ledger(LedgerError::BatchNotFound { batch_id: 42 })
        ));
    }

    #[tokio::test]
    async fn test_review_unknown_batch() {
        let local = FakeProvider::new(ProviderKind::Ollama).arc();
        let (state, _, _, _) = testing::state(local, vec![]);
        let err = review_batch(&state, 42, &ApprovalRequest::approve_all())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CommandError::Ledger(LedgerError::BatchNotFound { batch_id: 42 })
        ));
    }
}
