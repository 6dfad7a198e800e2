//! # crypto-quotes
//!
//! Quote acquisition for a rate-limited, pay-walled cryptocurrency price
//! provider (CoinMarketCap).
//!
//! ## Flow
//!
//! ```text
//! ┌──────────────┐   key per call   ┌────────────┐  miss   ┌──────────────┐
//! │ QuoteClient  │─────────────────▶│  TtlCache  │────────▶│ QuoteFetcher │──▶ provider
//! │ (tier aware) │◀─────────────────│ single-    │◀────────│ classify+TTL │
//! └──────┬───────┘  cached outcome  │ flight     │         └──────────────┘
//!        │                          └────────────┘
//!        ▼
//!   merge_into ──▶ ExchangeRateSet
//! ```
//!
//! The free plan accepts one `convert` currency per request, so on that tier
//! the client asks once per fiat currency and merges the partial answers.
//! Every call goes through the cache, where concurrent callers for the same
//! key share a single upstream request.
//!
//! ## Expiration
//!
//! | Outcome                               | TTL    |
//! |---------------------------------------|--------|
//! | success                               | 61 s   |
//! | provider error, HTTP 429              | 61 s   |
//! | provider error, other 4xx             | 60 min |
//! | provider error, 5xx                   | 30 s   |
//! | unrecognized failure body (fatal)     | 15 s   |

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod merge;
pub mod model;
pub mod policy;
pub mod upstream;

pub use cache::{Expiring, TtlCache};
pub use client::{ExchangeRateProvider, QuoteClient};
pub use config::{CoinMarketCapConfig, CurrencyConfig, ProviderTier};
pub use error::{QuoteError, Result};
pub use model::{ApiResult, AssetQuote, CurrencyRate, ErrorStatus, ExchangeRateSet, FetchOutcome, Platform, ProviderError};

/// Re-exported so callers can build the cancel signal without a direct dependency
pub use tokio_util::sync::CancellationToken;
