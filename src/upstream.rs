//! DNS-over-HTTPS upstream.
//!
//! [`DohClient`] performs single exchanges against a pool of DoH JSON-API
//! providers. [`UpstreamResolver`] wraps any [`Exchange`] with the retry,
//! deadline and type-filtering policy the resolver relies on.

use reqwest::Client;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::time::{Instant, timeout_at};
use tracing::{debug, warn};

use crate::error::UpstreamError;
use crate::record::RecordType;

const DNS_JSON: &str = "application/dns-json";
const SERVFAIL: u32 = 2;

/// A DoH JSON response body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DohResponse {
    #[serde(rename = "Status")]
    pub status: u32,
    #[serde(rename = "Answer", default)]
    pub answers: Vec<DohAnswer>,
}

/// One answer record of a DoH JSON response.
#[derive(Debug, Clone, Deserialize)]
pub struct DohAnswer {
    #[serde(rename = "type")]
    pub rtype: u16,
    pub data: String,
}

impl DohResponse {
    /// Answer data for `rtype` only, in the order returned.
    pub fn values_for(&self, rtype: RecordType) -> Vec<String> {
        self.answers
            .iter()
            .filter(|answer| answer.rtype == rtype.code())
            .map(|answer| answer.data.clone())
            .collect()
    }
}

/// One attempt at resolving a domain upstream.
#[async_trait::async_trait]
pub trait Exchange: Send + Sync {
    async fn exchange(
        &self,
        domain: &str,
        rtype: RecordType,
    ) -> Result<DohResponse, UpstreamError>;
}

/// Source of upstream answers for cache misses.
#[async_trait::async_trait]
pub trait Upstream: Send + Sync {
    /// Resolve `domain` for `rtype` before `deadline`.
    ///
    /// An empty result means "no answer" and must not be cached.
    async fn query(&self, domain: &str, rtype: RecordType, deadline: Instant) -> Vec<String>;
}

/// DoH JSON-API client over a provider pool, rotating providers per request.
pub struct DohClient {
    client: Client,
    providers: Vec<String>,
    next: AtomicUsize,
}

impl DohClient {
    pub fn new(client: Client, providers: Vec<String>) -> Self {
        Self {
            client,
            providers,
            next: AtomicUsize::new(0),
        }
    }

    fn next_provider(&self) -> Option<&str> {
        if self.providers.is_empty() {
            return None;
        }
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.providers.len();
        Some(&self.providers[idx])
    }
}

#[async_trait::async_trait]
impl Exchange for DohClient {
    async fn exchange(
        &self,
        domain: &str,
        rtype: RecordType,
    ) -> Result<DohResponse, UpstreamError> {
        let provider = self.next_provider().ok_or(UpstreamError::NoProviders)?;

        let response = self
            .client
            .get(provider)
            .query(&[("name", domain), ("type", rtype.as_str())])
            .header(ACCEPT, DNS_JSON)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status {
                provider: provider.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        let parsed: DohResponse = serde_json::from_slice(&body)?;
        if parsed.status == SERVFAIL {
            return Err(UpstreamError::ServerFailure {
                provider: provider.to_string(),
            });
        }
        Ok(parsed)
    }
}

/// Retry-once upstream bounded by the caller's deadline.
pub struct UpstreamResolver {
    exchange: Arc<dyn Exchange>,
}

impl UpstreamResolver {
    pub fn new(exchange: Arc<dyn Exchange>) -> Self {
        Self { exchange }
    }

    async fn attempt(&self, domain: &str, rtype: RecordType) -> Result<Vec<String>, UpstreamError> {
        let response = self.exchange.exchange(domain, rtype).await?;
        Ok(response.values_for(rtype))
    }

    async fn with_retry(&self, domain: &str, rtype: RecordType) -> Vec<String> {
        match self.attempt(domain, rtype).await {
            Ok(values) => values,
            Err(e) => {
                debug!("{} {} lookup failed, retrying: {}", domain, rtype, e);
                match self.attempt(domain, rtype).await {
                    Ok(values) => values,
                    Err(e) => {
                        warn!("{} {} lookup failed: {}", domain, rtype, e);
                        Vec::new()
                    }
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl Upstream for UpstreamResolver {
    async fn query(&self, domain: &str, rtype: RecordType, deadline: Instant) -> Vec<String> {
        match timeout_at(deadline, self.with_retry(domain, rtype)).await {
            Ok(values) => values,
            Err(_) => {
                warn!("{} {} lookup exceeded the query deadline", domain, rtype);
                Vec::new()
            }
        }
    }
}
