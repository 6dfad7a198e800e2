//! Application State

use std::sync::Arc;

use crypto_quotes::{CurrencyConfig, ExchangeRateProvider};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Quote source (cached CoinMarketCap client in production)
    pub quotes: Arc<dyn ExchangeRateProvider>,

    /// Fiat currencies used when the caller names none
    pub currencies: Arc<CurrencyConfig>,
}
