//! Mock Transport
//!
//! Answers every request with a caller-supplied closure and records what was
//! asked, so tests can count upstream calls.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use super::{QuoteTransport, UpstreamResponse};
use crate::error::Result;

type Handler = Box<dyn Fn(&str) -> UpstreamResponse + Send + Sync>;

pub struct MockTransport {
    handler: Handler,
    requests: Mutex<Vec<String>>,
    latency: Duration,
}

impl MockTransport {
    pub fn new(handler: impl Fn(&str) -> UpstreamResponse + Send + Sync + 'static) -> Self {
        Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
            latency: Duration::ZERO,
        }
    }

    /// Always answer with the same status and body
    pub fn fixed(status: u16, body: impl Into<String>) -> Self {
        let response = UpstreamResponse::new(status, body);
        Self::new(move |_| response.clone())
    }

    /// Simulate network latency before answering
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Paths requested so far, oldest first
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl QuoteTransport for MockTransport {
    async fn get(&self, path_and_query: &str) -> Result<UpstreamResponse> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(path_and_query.to_string());

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        Ok((self.handler)(path_and_query))
    }

    fn name(&self) -> &str {
        "mock"
    }
}
