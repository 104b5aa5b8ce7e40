//! Provider lookups used by deep-check rules.
//!
//! Deep-check rules verify that identifiers referenced in configuration
//! (AMIs, key pairs, subnet groups) exist in the target account. The lookup
//! goes through the [`ProviderApi`] trait; [`ProviderClient`] implements it
//! against an HTTP lookup service:
//!
//! `GET {endpoint}/{kind}/{id}` → 200 exists, 404 not found.

mod cache;

pub use cache::LookupCache;

use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Runtime;

use crate::config::ProviderConfig;

/// Errors that can occur during provider lookups.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("request timed out")]
    Timeout,
    #[error("rate limited by provider")]
    RateLimited,
    #[error("provider client unavailable: {0}")]
    Unavailable(String),
}

/// Result of checking whether an identifier exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupStatus {
    Exists,
    NotFound,
    /// Could not determine (unexpected status, etc.)
    Unknown(String),
}

/// The kind of object being looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupKind {
    Image,
    KeyPair,
    InstanceProfile,
    DbSubnetGroup,
    CacheSubnetGroup,
}

impl LookupKind {
    /// Path segment in the lookup URL.
    pub fn as_str(&self) -> &'static str {
        match self {
            LookupKind::Image => "images",
            LookupKind::KeyPair => "key-pairs",
            LookupKind::InstanceProfile => "instance-profiles",
            LookupKind::DbSubnetGroup => "db-subnet-groups",
            LookupKind::CacheSubnetGroup => "cache-subnet-groups",
        }
    }

    /// Human-readable noun used in issue messages.
    pub fn label(&self) -> &'static str {
        match self {
            LookupKind::Image => "image ID",
            LookupKind::KeyPair => "key name",
            LookupKind::InstanceProfile => "IAM profile name",
            LookupKind::DbSubnetGroup => "DB subnet group name",
            LookupKind::CacheSubnetGroup => "subnet group name",
        }
    }
}

impl std::fmt::Display for LookupKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lookup surface used by deep-check rules. Implementations must be safe to
/// call from several rule threads at once.
pub trait ProviderApi: Send + Sync {
    fn lookup(&self, kind: LookupKind, id: &str) -> Result<LookupStatus, ProviderError>;
}

/// HTTP client for the provider lookup service.
pub struct ProviderClient {
    http: reqwest::Client,
    runtime: Runtime,
    endpoint: reqwest::Url,
    timeout: Duration,
    cache: LookupCache,
}

impl ProviderClient {
    /// Create a client for `config.endpoint`.
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let endpoint = config
            .endpoint
            .as_deref()
            .ok_or_else(|| ProviderError::Unavailable("no endpoint configured".to_string()))?;
        let endpoint = reqwest::Url::parse(endpoint).map_err(|e| {
            ProviderError::Unavailable(format!("invalid endpoint {:?}: {}", endpoint, e))
        })?;
        if endpoint.cannot_be_a_base() {
            return Err(ProviderError::Unavailable(format!(
                "invalid endpoint {:?}",
                endpoint.as_str()
            )));
        }
        let http = reqwest::Client::builder()
            .user_agent(concat!("tfcheck/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        Ok(Self {
            http,
            runtime,
            endpoint,
            timeout: Duration::from_millis(config.timeout_ms),
            cache: LookupCache::new(),
        })
    }

    /// `{endpoint}/{kind}/{id}`, with `id` percent-encoded as one segment.
    fn url(&self, kind: LookupKind, id: &str) -> reqwest::Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(kind.as_str()).push(id);
        }
        url
    }

    async fn fetch(&self, kind: LookupKind, id: &str) -> Result<LookupStatus, ProviderError> {
        let response = self
            .http
            .get(self.url(kind, id))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout
                } else {
                    ProviderError::Network(e)
                }
            })?;

        match response.status().as_u16() {
            200 => Ok(LookupStatus::Exists),
            404 => Ok(LookupStatus::NotFound),
            429 => Err(ProviderError::RateLimited),
            status => Ok(LookupStatus::Unknown(format!("HTTP {}", status))),
        }
    }
}

impl ProviderApi for ProviderClient {
    fn lookup(&self, kind: LookupKind, id: &str) -> Result<LookupStatus, ProviderError> {
        if let Some(cached) = self.cache.get(kind, id) {
            return Ok(cached);
        }
        let status = self.runtime.block_on(self.fetch(kind, id))?;
        self.cache.set(kind, id, &status);
        Ok(status)
    }
}

impl Drop for ProviderClient {
    fn drop(&mut self) {
        let (hits, misses) = self.cache.stats();
        tracing::debug!(hits, misses, "provider lookup cache");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_requires_endpoint() {
        let err = ProviderClient::new(&ProviderConfig::default()).err().unwrap();
        assert!(matches!(err, ProviderError::Unavailable(_)));
    }

    #[test]
    fn test_lookup_url() {
        let config = ProviderConfig {
            endpoint: Some("http://localhost:9000/".to_string()),
            timeout_ms: 100,
        };
        let client = ProviderClient::new(&config).unwrap();
        assert_eq!(
            client.url(LookupKind::KeyPair, "deploy").as_str(),
            "http://localhost:9000/key-pairs/deploy"
        );
        assert_eq!(
            client.url(LookupKind::KeyPair, "my key/pair").as_str(),
            "http://localhost:9000/key-pairs/my%20key%2Fpair"
        );
    }

    #[test]
    fn test_lookup_url_keeps_endpoint_path() {
        let config = ProviderConfig {
            endpoint: Some("https://lookup.example.com/v1".to_string()),
            timeout_ms: 100,
        };
        let client = ProviderClient::new(&config).unwrap();
        assert_eq!(
            client.url(LookupKind::Image, "ami-0123abcd").as_str(),
            "https://lookup.example.com/v1/images/ami-0123abcd"
        );
    }
}
