//! reqwest-backed transport for the CoinMarketCap Pro API

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderMap, HeaderName, HeaderValue};

use super::{QuoteTransport, UpstreamResponse};
use crate::config::CoinMarketCapConfig;
use crate::error::{QuoteError, Result};

/// `X-CMC_PRO_API_KEY`; header names are case-insensitive
pub const API_KEY_HEADER: HeaderName = HeaderName::from_static("x-cmc_pro_api_key");

pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(config: &CoinMarketCapConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut api_key = HeaderValue::from_str(&config.api_key)
            .map_err(|_| QuoteError::Config("API key is not a valid header value".into()))?;
        api_key.set_sensitive(true);
        headers.insert(API_KEY_HEADER, api_key);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl QuoteTransport for HttpTransport {
    async fn get(&self, path_and_query: &str) -> Result<UpstreamResponse> {
        let url = format!("{}{}", self.base_url, path_and_query);
        let response = self.client.get(&url).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(UpstreamResponse { status, body })
    }

    fn name(&self) -> &str {
        "coinmarketcap"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderTier;

    fn config(base_url: &str) -> CoinMarketCapConfig {
        CoinMarketCapConfig {
            base_url: base_url.into(),
            api_key: "test-key".into(),
            tier: ProviderTier::Free,
            timeout_secs: 5,
        }
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let transport = HttpTransport::new(&config("https://pro-api.coinmarketcap.com/")).unwrap();
        assert_eq!(transport.base_url, "https://pro-api.coinmarketcap.com");
    }

    #[test]
    fn test_rejects_unprintable_api_key() {
        let mut cfg = config("https://pro-api.coinmarketcap.com");
        cfg.api_key = "bad\nkey".into();
        assert!(matches!(HttpTransport::new(&cfg), Err(QuoteError::Config(_))));
    }
}
