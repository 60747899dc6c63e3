//! Inbound command handlers.
//!
//! Transport-agnostic: every handler takes the shared [`AppState`] and plain
//! request values, so an HTTP server, a CLI or a desktop shell can sit in
//! front of them unchanged.

pub mod bookmarks;
pub mod models;
pub mod triage;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;
use tokio::sync::OwnedMutexGuard;

use crate::capabilities::{CapabilityError, MailCapability, UnsubscribeClient};
use crate::config::Settings;
use crate::executor::ExecutorError;
use crate::inference::ProviderKind;
use crate::ledger::{LedgerDatabase, LedgerError};
use crate::privacy::{PrivacyRouter, RouterError};

pub use bookmarks::{
    digest_bookmark, ingest_bookmarks, select_bookmarks, BookmarkQuery, DEFAULT_BOOKMARK_LIMIT,
};
pub use models::{analyze, complete, health, AnalyzeRequest, AnalyzeResponse, HealthReport};
pub use triage::{classify_and_propose, execute_batch, review_batch, ApprovalOutcome, BatchCreated};

// ─── Errors ─────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum CommandError {
    /// The request itself is malformed.
    #[error("invalid request: {0}")]
    Validation(String),

    #[error(transparent)]
    Router(#[from] RouterError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Executor(#[from] ExecutorError),

    #[error(transparent)]
    Capability(#[from] CapabilityError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CommandError {
    /// Whether the caller is at fault (a 4xx in HTTP terms).
    pub fn is_client_error(&self) -> bool {
        match self {
            CommandError::Validation(_) => true,
            CommandError::Router(RouterError::ProviderNotAvailable { .. }) => true,
            CommandError::Ledger(e) | CommandError::Executor(ExecutorError::Ledger(e)) => matches!(
                e,
                LedgerError::BatchNotFound { .. }
                    | LedgerError::BatchNotPending { .. }
                    | LedgerError::AccountNotFound { .. }
                    | LedgerError::ActionNotFound { .. }
            ),
            _ => false,
        }
    }
}

/// Parse an optional provider name from a request.
pub(crate) fn parse_provider(name: Option<&str>) -> Result<Option<ProviderKind>, CommandError> {
    match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => name
            .parse()
            .map(Some)
            .map_err(|e: crate::inference::ProviderError| CommandError::Validation(e.to_string())),
        None => Ok(None),
    }
}

// ─── Batch Locks ────────────────────────────────────────────────────────────

/// Keyed async locks serializing approval and execution per batch id.
#[derive(Default)]
pub struct BatchLocks {
    slots: tokio::sync::Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>,
}

impl BatchLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `batch_id`.
    ///
    /// Slots nobody holds or waits on are dropped on the way in.
    pub async fn lock(&self, batch_id: i64) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = self.slots.lock().await;
            slots.retain(|id, slot| *id == batch_id || Arc::strong_count(slot) > 1);
            slots.entry(batch_id).or_default().clone()
        };
        slot.lock_owned().await
    }

    #[cfg(test)]
    async fn tracked(&self) -> usize {
        self.slots.lock().await.len()
    }
}

// ─── State ──────────────────────────────────────────────────────────────────

/// Everything the handlers share.
pub struct AppState {
    pub settings: Settings,
    pub router: Arc<PrivacyRouter>,
    pub ledger: Mutex<LedgerDatabase>,
    pub mail: Arc<dyn MailCapability>,
    pub unsubscriber: Arc<dyn UnsubscribeClient>,
    pub locks: BatchLocks,
}

impl AppState {
    pub fn new(
        settings: Settings,
        router: Arc<PrivacyRouter>,
        ledger: LedgerDatabase,
        mail: Arc<dyn MailCapability>,
        unsubscriber: Arc<dyn UnsubscribeClient>,
    ) -> Self {
        Self {
            settings,
            router,
            ledger: Mutex::new(ledger),
            mail,
            unsubscriber,
            locks: BatchLocks::new(),
        }
    }

    /// Lock the ledger. Never hold the guard across an `.await`.
    pub fn ledger(&self) -> Result<MutexGuard<'_, LedgerDatabase>, CommandError> {
        self.ledger
            .lock()
            .map_err(|e| CommandError::Internal(format!("ledger lock poisoned: {e}")))
    }
}
