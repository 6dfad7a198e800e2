//! Error Types for Quote Acquisition
//!
//! Provider-side business errors are *not* here: they travel as data in
//! [`crate::model::ApiResult`]. Everything below is fatal for the request.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, QuoteError>;

#[derive(Error, Debug)]
pub enum QuoteError {
    /// Non-success upstream status whose body carried no recognizable status object
    #[error("Unexpected upstream response ({status}): {body}")]
    UnexpectedResponse { status: u16, body: String },

    /// The caller disconnected or its deadline passed
    #[error("Request cancelled")]
    Cancelled,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl QuoteError {
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Convert to a message safe to hand back to API clients
    pub fn user_message(&self) -> String {
        match self {
            Self::UnexpectedResponse { .. } => {
                "Unexpected error: coin-market-cap returned an unrecognized response".into()
            }
            Self::Cancelled => "The request was cancelled.".into(),
            Self::InvalidRequest(msg) => msg.clone(),
            Self::Network(_) => "coin-market-cap is currently unreachable.".into(),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

/// Unclassified upstream failure as it is remembered by the cache.
///
/// Kept separate from [`QuoteError`] because cached values must be `Clone`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnexpectedResponse {
    pub status: u16,
    pub body: String,
}

impl From<UnexpectedResponse> for QuoteError {
    fn from(r: UnexpectedResponse) -> Self {
        Self::UnexpectedResponse {
            status: r.status,
            body: r.body,
        }
    }
}
