//! Review ledger: durable record of everything proposed, approved and done.
//!
//! This module handles:
//! - Accounts and their mail credentials
//! - Content items (email, bookmarks) with the model's verdict
//! - Review batches and the PENDING → APPROVED/REJECTED/PARTIAL machine
//! - Proposed actions, their approval flags and execution outcomes

pub mod database;
pub mod errors;
pub mod review;
pub mod types;

pub use database::{ActionOutcome, LedgerDatabase};
pub use errors::LedgerError;
pub use review::{batch_summary, compute_status, ReviewOutcome, DEFAULT_LABEL};
pub use types::{
    Account, ActionDetail, ActionKind, ApprovalRequest, BatchDetails, ContentItem, ContentSource,
    NewContentItem, ProposedAction, ReviewBatch, ReviewStatus,
};
