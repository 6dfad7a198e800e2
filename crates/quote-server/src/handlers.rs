//! HTTP Handlers

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use crypto_quotes::{ApiResult, CancellationToken, ExchangeRateSet, ProviderError, QuoteError};

use crate::state::AppState;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub tier: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_error: Option<ProviderError>,
}

/// Parsed query string of the exchange-rate endpoint.
///
/// Symbol parameters may repeat (`?s=BTC&s=ETH`) or carry a comma-separated
/// list (`?s=BTC,ETH`); blank entries are dropped. Names match case-insensitively.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ExchangeRateQuery {
    pub crypto_symbols: Vec<String>,
    pub fiat_symbols: Vec<String>,
    pub include_tokens: bool,
}

impl ExchangeRateQuery {
    pub fn from_pairs(pairs: &[(String, String)]) -> Result<Self, String> {
        let mut query = Self::default();

        for (name, value) in pairs {
            if name.eq_ignore_ascii_case("cryptoCurrencySymbols") {
                query.crypto_symbols.extend(split_symbols(value));
            } else if name.eq_ignore_ascii_case("fiatCurrencySymbols") {
                query.fiat_symbols.extend(split_symbols(value));
            } else if name.eq_ignore_ascii_case("includeTokens") {
                query.include_tokens = parse_flag(value)
                    .ok_or_else(|| format!("includeTokens must be true or false, got '{value}'"))?;
            }
        }

        Ok(query)
    }
}

fn split_symbols(value: &str) -> impl Iterator<Item = String> + '_ {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

fn error_response(
    status: StatusCode,
    message: impl Into<String>,
    client_error: Option<ProviderError>,
) -> Response {
    let body = ErrorResponse {
        message: message.into(),
        client_error,
    };
    (status, Json(body)).into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        tier: state.quotes.tier().as_str(),
    })
}

/// `GET /api/1.0/crypto/exchange-rates`
pub async fn exchange_rates(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let query = match ExchangeRateQuery::from_pairs(&params) {
        Ok(q) => q,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, msg, None),
    };

    if query.crypto_symbols.is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "at least one cryptoCurrencySymbols is expected",
            None,
        );
    }

    let fiat_symbols = if query.fiat_symbols.is_empty() {
        state.currencies.default_fiat_symbols.clone()
    } else {
        query.fiat_symbols
    };

    // Dropping the handler (client gone, server timeout) cancels the token.
    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();

    let span = tracing::info_span!("exchange_rates", request_id = %Uuid::new_v4());
    let result = state
        .quotes
        .get_quotes(&query.crypto_symbols, &fiat_symbols, query.include_tokens, &cancel)
        .instrument(span.clone())
        .await;

    span.in_scope(|| quotes_response(result))
}

/// Map a quote lookup onto an HTTP response
pub fn quotes_response(result: crypto_quotes::Result<ApiResult<ExchangeRateSet>>) -> Response {
    match result {
        Ok(Ok(set)) => (StatusCode::OK, Json(set)).into_response(),
        Ok(Err(err)) if err.error_code().is_none() => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Unexpected error: coin-market-cap did not provide the reason",
            None,
        ),
        Ok(Err(err)) if err.is_rate_limited() => error_response(
            StatusCode::TOO_MANY_REQUESTS,
            "too many requests: slow down",
            Some(err),
        ),
        Ok(Err(err)) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "coin-market-cap could not process the request, see client_error for details",
            Some(err),
        ),
        Err(e) if e.is_cancelled() => {
            tracing::info!("client went away before quotes resolved");
            error_response(StatusCode::REQUEST_TIMEOUT, e.user_message(), None)
        }
        Err(e @ QuoteError::InvalidRequest(_)) => {
            error_response(StatusCode::BAD_REQUEST, e.user_message(), None)
        }
        Err(e) => {
            tracing::warn!(error = %e, "unhandled error while resolving quotes");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.user_message(), None)
        }
    }
}
