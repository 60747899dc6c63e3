//! Privacy router: decides which provider may see a piece of content.
//!
//! The local model screens everything first. Only content it calls clean
//! can reach a cloud provider, and a failed screening pass sends nothing
//! anywhere.

pub mod errors;
pub mod router;
pub mod screening;

pub use errors::RouterError;
pub use router::{PrivacyRouter, RouteReason, RoutingDecision, ScreenedAnalysis};
