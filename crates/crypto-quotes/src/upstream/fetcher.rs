//! Upstream Fetcher
//!
//! One provider call per invocation. Classifies the response and picks the
//! TTL the cache should keep it for.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::{QuoteTransport, UpstreamResponse};
use crate::cache::Expiring;
use crate::error::{QuoteError, Result, UnexpectedResponse};
use crate::model::{ExchangeRateSet, FetchOutcome, ProviderError};
use crate::policy::{provider_error_ttl, SUCCESS_TTL, UNCLASSIFIED_TTL};

pub const QUOTES_LATEST_PATH: &str = "/v2/cryptocurrency/quotes/latest";

/// What the cache remembers for a key: a business outcome, or an
/// unclassified failure that every caller must see as fatal
pub type CachedOutcome = std::result::Result<FetchOutcome, UnexpectedResponse>;

pub struct QuoteFetcher {
    transport: Arc<dyn QuoteTransport>,
}

impl QuoteFetcher {
    pub fn new(transport: Arc<dyn QuoteTransport>) -> Self {
        Self { transport }
    }

    /// Fetch latest quotes for already-escaped symbol parameters.
    ///
    /// Cancellation drops the in-flight request and yields
    /// [`QuoteError::Cancelled`]; nothing is produced for the cache.
    pub async fn fetch(
        &self,
        crypto_param: &str,
        fiat_param: &str,
        include_tokens: bool,
        cancel: &CancellationToken,
    ) -> Result<Expiring<CachedOutcome>> {
        let path = format!("{QUOTES_LATEST_PATH}?symbol={crypto_param}&convert={fiat_param}");
        tracing::debug!(transport = self.transport.name(), %path, "fetching latest quotes");

        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(QuoteError::Cancelled),
            response = self.transport.get(&path) => response?,
        };

        let classified = classify(&response, include_tokens)?;
        match &classified.value {
            Ok(FetchOutcome::ProviderError(err)) => {
                tracing::warn!(status = response.status, %err, ttl = ?classified.ttl, "provider rejected quotes request");
            }
            Err(unexpected) => {
                tracing::error!(
                    status = unexpected.status,
                    body = %unexpected.body,
                    "Unexpected error when getting latest crypto quotes"
                );
            }
            Ok(FetchOutcome::Success(_)) => {}
        }

        Ok(classified)
    }
}

/// Turn a raw response into a cacheable outcome and its TTL.
///
/// Only an unparseable *success* body is an error here; unparseable failure
/// bodies become [`UnexpectedResponse`] so they can be cached briefly.
pub fn classify(response: &UpstreamResponse, include_tokens: bool) -> Result<Expiring<CachedOutcome>> {
    if response.is_success() {
        let set: ExchangeRateSet = serde_json::from_str(&response.body)?;
        let set = if include_tokens { set } else { set.without_tokens() };
        return Ok(Expiring::new(Ok(FetchOutcome::Success(set)), SUCCESS_TTL));
    }

    match serde_json::from_str::<ProviderError>(&response.body) {
        Ok(err) if err.is_classified() => Ok(Expiring::new(
            Ok(FetchOutcome::ProviderError(err)),
            provider_error_ttl(response.status),
        )),
        _ => Ok(Expiring::new(
            Err(UnexpectedResponse {
                status: response.status,
                body: response.body.clone(),
            }),
            UNCLASSIFIED_TTL,
        )),
    }
}
