//! Provider configuration
//!
//! Read once at startup; the quote client never inspects the environment.

use serde::{Deserialize, Serialize};

use crate::error::{QuoteError, Result};

pub const DEFAULT_BASE_URL: &str = "https://pro-api.coinmarketcap.com";
pub const DEFAULT_FIAT_SYMBOLS: [&str; 5] = ["USD", "EUR", "BRL", "GBP", "AUD"];

/// CoinMarketCap plan. The free plan accepts one `convert` currency per call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderTier {
    #[default]
    Free,
    Paid,
}

impl ProviderTier {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Paid => "paid",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "free" | "basic" => Ok(Self::Free),
            "paid" | "pro" | "unrestricted" => Ok(Self::Paid),
            other => Err(QuoteError::Config(format!("unknown provider tier '{other}'"))),
        }
    }

    /// Whether several fiat currencies can be requested in one call
    pub const fn supports_multi_convert(self) -> bool {
        matches!(self, Self::Paid)
    }
}

/// CoinMarketCap client configuration
#[derive(Clone, Debug)]
pub struct CoinMarketCapConfig {
    pub base_url: String,
    pub api_key: String,
    pub tier: ProviderTier,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl CoinMarketCapConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            tier: ProviderTier::default(),
            timeout_secs: 30,
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source; `from_env` passes the process environment
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = require(&lookup, "COINMARKETCAP_API_KEY")?;

        let base_url = non_blank(lookup("COINMARKETCAP_BASE_URL"))
            .unwrap_or_else(|| DEFAULT_BASE_URL.into());

        let tier = non_blank(lookup("COINMARKETCAP_TIER"))
            .map(|t| ProviderTier::parse(&t))
            .transpose()?
            .unwrap_or_default();

        let timeout_secs = match non_blank(lookup("COINMARKETCAP_TIMEOUT_SECS")) {
            Some(raw) => raw.trim().parse().map_err(|_| {
                QuoteError::Config(format!("COINMARKETCAP_TIMEOUT_SECS is not a number: '{raw}'"))
            })?,
            None => 30,
        };

        Ok(Self {
            base_url,
            api_key,
            tier,
            timeout_secs,
        })
    }
}

/// Fiat currencies used when a caller names none
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CurrencyConfig {
    pub default_fiat_symbols: Vec<String>,
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        Self {
            default_fiat_symbols: DEFAULT_FIAT_SYMBOLS.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

impl CurrencyConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// `DEFAULT_FIAT_SYMBOLS` is a comma-separated list; blank or missing keeps the defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let symbols: Vec<String> = lookup("DEFAULT_FIAT_SYMBOLS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_uppercase)
            .collect();

        if symbols.is_empty() {
            Self::default()
        } else {
            Self {
                default_fiat_symbols: symbols,
            }
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn require(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    non_blank(lookup(key))
        .ok_or_else(|| QuoteError::Config(format!("Missing configuration value for key '{key}'")))
}
