//! Upstream Integration
//!
//! Transport abstraction for the quote provider plus the fetcher that turns a
//! raw response into a cacheable outcome.

mod fetcher;
mod http;
mod mock;

pub use fetcher::{CachedOutcome, QuoteFetcher, QUOTES_LATEST_PATH};
pub use http::HttpTransport;
pub use mock::MockTransport;

use async_trait::async_trait;

use crate::error::Result;

/// Status and body of one provider response, read in full
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub body: String,
}

impl UpstreamResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Transport trait (Strategy pattern)
///
/// The real implementation talks HTTP; tests plug in [`MockTransport`].
#[async_trait]
pub trait QuoteTransport: Send + Sync {
    /// GET `path_and_query` relative to the provider base URL.
    ///
    /// Only transport-level failures are errors; any HTTP status is a response.
    async fn get(&self, path_and_query: &str) -> Result<UpstreamResponse>;

    /// Transport name, for logs
    fn name(&self) -> &str;
}
