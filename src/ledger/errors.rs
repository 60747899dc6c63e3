//! Review ledger error types.

use thiserror::Error;

use super::types::ReviewStatus;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// Database operation failed.
    #[error("database error: {reason}")]
    DatabaseError { reason: String },

    /// Serialization of a JSON column failed.
    #[error("serialization error: {reason}")]
    SerializationError { reason: String },

    #[error("review batch {batch_id} not found")]
    BatchNotFound { batch_id: i64 },

    /// The batch has already been reviewed; its status is terminal.
    #[error("review batch {batch_id} is {status}, not pending")]
    BatchNotPending { batch_id: i64, status: ReviewStatus },

    #[error("account {account_id} not found")]
    AccountNotFound { account_id: i64 },

    #[error("proposed action {action_id} not found")]
    ActionNotFound { action_id: i64 },
}

impl From<rusqlite::Error> for LedgerError {
    fn from(e: rusqlite::Error) -> Self {
        LedgerError::DatabaseError {
            reason: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(e: serde_json::Error) -> Self {
        LedgerError::SerializationError {
            reason: e.to_string(),
        }
    }
}
