//! Domain Models
//!
//! Wire-compatible types for the CoinMarketCap `quotes/latest` endpoint.
//! Uses `rust_decimal` for all prices - never use f64 for money!

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

/// Outcome of a quote query as seen by API callers: either the payload or the
/// structured error the provider answered with.
pub type ApiResult<T> = std::result::Result<T, ProviderError>;

/// Price of an asset in one fiat currency
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyRate {
    /// Read from the number's text, so no digits go through f64. Written as a string.
    #[serde(deserialize_with = "rust_decimal::serde::arbitrary_precision::deserialize")]
    pub price: Decimal,
}

impl CurrencyRate {
    pub const fn new(price: Decimal) -> Self {
        Self { price }
    }
}

/// Chain a token lives on. Present only for token-on-chain variants.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    pub name: String,
    pub symbol: String,
    pub token_address: String,
}

/// One asset as returned by the provider
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetQuote {
    /// Provider-side identity; two quotes with the same id are the same asset
    #[serde(rename = "id")]
    pub external_id: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,

    /// Fiat code -> price
    #[serde(rename = "quote", default, deserialize_with = "null_as_default")]
    pub rates: BTreeMap<String, CurrencyRate>,

    #[serde(default)]
    pub platform: Option<Platform>,
}

impl AssetQuote {
    pub fn new(external_id: i64) -> Self {
        Self {
            external_id,
            name: None,
            symbol: None,
            slug: None,
            rates: BTreeMap::new(),
            platform: None,
        }
    }

    pub fn with_rate(mut self, fiat: impl Into<String>, price: Decimal) -> Self {
        self.rates.insert(fiat.into(), CurrencyRate::new(price));
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Whether this quote describes a token deployed on some chain
    pub const fn is_token(&self) -> bool {
        self.platform.is_some()
    }

    pub fn price(&self, fiat: &str) -> Option<Decimal> {
        self.rates.get(fiat).map(|r| r.price)
    }
}

/// Quotes keyed by asset symbol. Several assets may share a symbol.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRateSet {
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: BTreeMap<String, Vec<AssetQuote>>,
}

impl ExchangeRateSet {
    pub const fn new(data: BTreeMap<String, Vec<AssetQuote>>) -> Self {
        Self { data }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, symbol: &str) -> Option<&[AssetQuote]> {
        self.data.get(symbol).map(Vec::as_slice)
    }

    /// Drop every token-on-chain variant, keeping symbols with no quotes left
    #[must_use]
    pub fn without_tokens(mut self) -> Self {
        for quotes in self.data.values_mut() {
            quotes.retain(|q| !q.is_token());
        }
        self
    }
}

/// `status` object of a provider error body
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorStatus {
    #[serde(default)]
    pub error_code: Option<i32>,

    #[serde(default)]
    pub error_message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credit_count: Option<u32>,
}

/// Structured error body returned by the provider on non-success statuses
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderError {
    #[serde(default)]
    pub status: Option<ErrorStatus>,
}

impl ProviderError {
    /// Provider codes that mean "slow down"
    pub const RATE_LIMIT_CODES: [i32; 2] = [429, 1008];

    pub fn new(error_code: Option<i32>, error_message: Option<&str>) -> Self {
        Self {
            status: Some(ErrorStatus {
                error_code,
                error_message: error_message.map(str::to_owned),
                ..ErrorStatus::default()
            }),
        }
    }

    pub fn error_code(&self) -> Option<i32> {
        self.status.as_ref().and_then(|s| s.error_code)
    }

    pub fn error_message(&self) -> Option<&str> {
        self.status.as_ref().and_then(|s| s.error_message.as_deref())
    }

    /// A body counts as a provider error only if its status carries a code or a message
    pub fn is_classified(&self) -> bool {
        self.status
            .as_ref()
            .is_some_and(|s| s.error_code.is_some() || s.error_message.is_some())
    }

    pub fn is_rate_limited(&self) -> bool {
        self.error_code()
            .is_some_and(|code| Self::RATE_LIMIT_CODES.contains(&code))
    }
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.error_code(), self.error_message()) {
            (Some(code), Some(msg)) => write!(f, "provider error {code}: {msg}"),
            (Some(code), None) => write!(f, "provider error {code}"),
            (None, Some(msg)) => write!(f, "provider error: {msg}"),
            (None, None) => write!(f, "provider error"),
        }
    }
}

/// Result of one upstream call that is worth remembering
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    Success(ExchangeRateSet),
    ProviderError(ProviderError),
}

impl FetchOutcome {
    pub fn into_result(self) -> ApiResult<ExchangeRateSet> {
        match self {
            Self::Success(set) => Ok(set),
            Self::ProviderError(err) => Err(err),
        }
    }
}

/// `null` and missing both mean "nothing"
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
