//! Shared HTTP session
//!
//! Fetchers talk to upstream through [`HttpTransport`] so tests can script
//! responses. The production transport wraps one `reqwest::Client` with a
//! fixed timeout and a governor quota shared by every request.

use crate::config::DataConfig;
use crate::error::Result;
use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use std::num::NonZeroU32;
use std::sync::Arc;

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

const USER_AGENT: &str = concat!("eurodata/", env!("CARGO_PKG_VERSION"));

/// Raw upstream answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body as text
    pub body: String,
}

impl HttpResponse {
    /// True for 2xx statuses
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Minimal GET transport
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Issue a GET with query pairs; non-2xx statuses are not errors here
    async fn get(&self, url: &str, query: &[(String, String)]) -> Result<HttpResponse>;
}

/// reqwest-backed transport with a request quota
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
    rate_limiter: SharedRateLimiter,
}

impl ReqwestTransport {
    /// Build a transport from configuration
    pub fn new(config: &DataConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(USER_AGENT)
            .build()?;

        let per_minute = NonZeroU32::new(config.requests_per_minute).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_minute(per_minute)));

        Ok(Self {
            client,
            rate_limiter,
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str, query: &[(String, String)]) -> Result<HttpResponse> {
        self.rate_limiter.until_ready().await;

        tracing::debug!(url, ?query, "GET");
        let response = self.client.get(url).query(query).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(HttpResponse { status, body })
    }
}
