//! Classifier: domain prompts and tolerant parsing of model answers.
//!
//! Two pipelines share the privacy router:
//! - Email triage: category, reason, suggested actions, priority
//! - Bookmark distillation: summary, takeaways, category, tags, read time

pub mod distill;
pub mod email;
pub mod parse;
pub mod prompts;

pub use distill::{distill, BookmarkDigest, DistillCategory};
pub use email::{
    batch_classify, classify_email, find_unsubscribe_url, parse_classification,
    ClassificationResult, EmailCategory, SuggestedAction,
};
