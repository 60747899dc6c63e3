//! Hitting list-unsubscribe links.

use std::time::Duration;

use async_trait::async_trait;

use super::CapabilityError;

/// Timeout for a single unsubscribe request (redirects included).
pub const UNSUBSCRIBE_TIMEOUT: Duration = Duration::from_secs(15);

#[async_trait]
pub trait UnsubscribeClient: Send + Sync {
    /// GET the unsubscribe URL. Returns the final HTTP status.
    ///
    /// A non-2xx status is not an error: many list servers answer the
    /// one-click GET with a redirect to a confirmation page that 4xx's.
    async fn unsubscribe(&self, url: &str) -> Result<u16, CapabilityError>;
}

/// `reqwest`-backed unsubscriber.
pub struct HttpUnsubscriber {
    http: reqwest::Client,
}

impl HttpUnsubscriber {
    pub fn new() -> Result<Self, CapabilityError> {
        Self::with_timeout(UNSUBSCRIBE_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, CapabilityError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl UnsubscribeClient for HttpUnsubscriber {
    async fn unsubscribe(&self, url: &str) -> Result<u16, CapabilityError> {
        let response = self.http.get(url).send().await?;
        let status = response.status().as_u16();
        tracing::info!(url, status, "unsubscribe request sent");
        Ok(status)
    }
}
