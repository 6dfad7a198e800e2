//! Quote Orchestrator
//!
//! Public entry point for "current exchange rates". Decides between one
//! multi-currency call (paid tier) and one call per fiat currency (free tier),
//! resolves every call through the shared cache and stitches partial results
//! together with the merge engine.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::cache::TtlCache;
use crate::config::{CoinMarketCapConfig, ProviderTier};
use crate::error::{QuoteError, Result};
use crate::merge::{merge_into, QuoteAccumulator};
use crate::model::{ApiResult, ExchangeRateSet, FetchOutcome};
use crate::policy::{cache_key, escape_data, join_escaped};
use crate::upstream::{CachedOutcome, HttpTransport, QuoteFetcher, QuoteTransport};

/// Exchange-rate source as seen by the HTTP layer
#[async_trait]
pub trait ExchangeRateProvider: Send + Sync {
    /// Latest quotes for `crypto_symbols` in every currency of `fiat_symbols`.
    ///
    /// Provider-side errors come back as `Ok(Err(_))`; `Err(_)` is reserved for
    /// fatal conditions and cancellation.
    async fn get_quotes(
        &self,
        crypto_symbols: &[String],
        fiat_symbols: &[String],
        include_tokens: bool,
        cancel: &CancellationToken,
    ) -> Result<ApiResult<ExchangeRateSet>>;

    fn tier(&self) -> ProviderTier;
}

/// CoinMarketCap quote client with a process-wide cache
pub struct QuoteClient {
    fetcher: QuoteFetcher,
    cache: Arc<TtlCache<CachedOutcome>>,
    tier: ProviderTier,
}

impl QuoteClient {
    pub fn new(
        transport: Arc<dyn QuoteTransport>,
        cache: Arc<TtlCache<CachedOutcome>>,
        tier: ProviderTier,
    ) -> Self {
        Self {
            fetcher: QuoteFetcher::new(transport),
            cache,
            tier,
        }
    }

    /// HTTP transport and a fresh cache from configuration
    pub fn from_config(config: &CoinMarketCapConfig) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(config)?);
        Ok(Self::new(transport, Arc::new(TtlCache::new()), config.tier))
    }

    /// One cache-backed upstream query
    async fn resolve(
        &self,
        crypto_param: &str,
        fiat_param: &str,
        include_tokens: bool,
        cancel: &CancellationToken,
    ) -> Result<FetchOutcome> {
        let key = cache_key(crypto_param, fiat_param, include_tokens);

        let cached = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(QuoteError::Cancelled),
            cached = self.cache.get_or_populate(&key, || {
                self.fetcher.fetch(crypto_param, fiat_param, include_tokens, cancel)
            }) => cached?,
        };

        Ok(cached?)
    }
}

#[async_trait]
impl ExchangeRateProvider for QuoteClient {
    async fn get_quotes(
        &self,
        crypto_symbols: &[String],
        fiat_symbols: &[String],
        include_tokens: bool,
        cancel: &CancellationToken,
    ) -> Result<ApiResult<ExchangeRateSet>> {
        if crypto_symbols.is_empty() || fiat_symbols.is_empty() {
            return Err(QuoteError::InvalidRequest(
                "at least one crypto and one fiat symbol is expected".into(),
            ));
        }

        let crypto_param = join_escaped(crypto_symbols);

        if self.tier.supports_multi_convert() {
            let fiat_param = join_escaped(fiat_symbols);
            let outcome = self
                .resolve(&crypto_param, &fiat_param, include_tokens, cancel)
                .await?;
            return Ok(outcome.into_result());
        }

        // The free plan rejects several `convert` values, so ask once per fiat.
        let mut acc = QuoteAccumulator::new();

        for fiat in fiat_symbols {
            let fiat_param = escape_data(fiat);

            match self
                .resolve(&crypto_param, &fiat_param, include_tokens, cancel)
                .await?
            {
                FetchOutcome::ProviderError(err) => {
                    tracing::debug!(fiat = %fiat, %err, "aborting quote merge on provider error");
                    return Ok(Err(err));
                }
                FetchOutcome::Success(set) if set.is_empty() => {}
                FetchOutcome::Success(set) => merge_into(&mut acc, &set),
            }
        }

        Ok(Ok(ExchangeRateSet::new(acc)))
    }

    fn tier(&self) -> ProviderTier {
        self.tier
    }
}
