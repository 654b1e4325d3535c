use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use axum::http::HeaderValue;
use tracing::{info, instrument, warn};

use crate::config::{CdnConfig, Config};
use crate::error::{IntegrationError, IntegrationResult};

/// Fastly API root.
pub const FASTLY_API_URL: &str = "https://api.fastly.com";

const FASTLY_KEY_HEADER: &str = "fastly-key";
const SURROGATE_KEY_HEADER: &str = "surrogate-key";

/// Purge-by-keys against a CDN.
#[async_trait]
pub trait CachePurger: Send + Sync {
    async fn purge_keys(&self, keys: &[String]) -> IntegrationResult<()>;
}

/// Fastly surrogate-key purge.
///
/// Issues `POST {api}/service/{service_id}/purge` with the keys in a single
/// space-separated `Surrogate-Key` header.
#[derive(Clone)]
pub struct FastlyPurger {
    http: reqwest::Client,
    api_url: String,
    service_id: String,
    api_key: HeaderValue,
}

impl fmt::Debug for FastlyPurger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FastlyPurger")
            .field("api_url", &self.api_url)
            .field("service_id", &self.service_id)
            .finish_non_exhaustive()
    }
}

impl FastlyPurger {
    /// # Errors
    ///
    /// Returns `IntegrationError::Config` if the HTTP client cannot be built
    /// or the API key is not a valid header value.
    pub fn new(cdn: &CdnConfig, config: &Config) -> IntegrationResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.upstream_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| IntegrationError::Config(format!("Failed to build HTTP client: {e}")))?;

        Self::with_http_client(http, FASTLY_API_URL, cdn)
    }

    pub fn with_http_client(
        http: reqwest::Client,
        api_url: impl Into<String>,
        cdn: &CdnConfig,
    ) -> IntegrationResult<Self> {
        let mut api_key = HeaderValue::from_str(&cdn.api_key).map_err(|_| {
            IntegrationError::Config("\"fastlyAPIKey\" is not a valid header value".to_string())
        })?;
        api_key.set_sensitive(true);

        Ok(Self {
            http,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            service_id: cdn.service_id.clone(),
            api_key,
        })
    }

    fn purge_url(&self) -> String {
        format!("{}/service/{}/purge", self.api_url, self.service_id)
    }
}

#[async_trait]
impl CachePurger for FastlyPurger {
    #[instrument(skip(self), fields(service_id = %self.service_id))]
    async fn purge_keys(&self, keys: &[String]) -> IntegrationResult<()> {
        let response = self
            .http
            .post(self.purge_url())
            .header(FASTLY_KEY_HEADER, self.api_key.clone())
            .header(SURROGATE_KEY_HEADER, keys.join(" "))
            .send()
            .await
            .map_err(|e| IntegrationError::Cdn(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            info!(keys = %keys.join(" "), "Purged cache keys");
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), "Fastly rejected purge");
        Err(IntegrationError::Cdn(format!(
            "purge failed with status {}: {text}",
            status.as_u16()
        )))
    }
}

/// Purger that records every call, for tests and local runs.
#[derive(Debug, Default)]
pub struct MemoryPurger {
    calls: Mutex<Vec<Vec<String>>>,
    fail: AtomicBool,
}

impl MemoryPurger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Key sets passed to each purge, in call order.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl CachePurger for MemoryPurger {
    async fn purge_keys(&self, keys: &[String]) -> IntegrationResult<()> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(keys.to_vec());
        if self.fail.load(Ordering::SeqCst) {
            return Err(IntegrationError::Cdn("service unavailable".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn cdn() -> CdnConfig {
        CdnConfig {
            service_id: "svc-123".to_string(),
            api_key: "fastly-secret".to_string(),
        }
    }

    #[test]
    fn test_purge_url() {
        let purger =
            FastlyPurger::with_http_client(reqwest::Client::new(), "https://cdn.test/", &cdn())
                .unwrap();
        assert_eq!(purger.purge_url(), "https://cdn.test/service/svc-123/purge");
    }

    #[test]
    fn test_debug_hides_api_key() {
        let purger =
            FastlyPurger::with_http_client(reqwest::Client::new(), FASTLY_API_URL, &cdn()).unwrap();
        assert!(!format!("{purger:?}").contains("fastly-secret"));
    }

    #[test]
    fn test_invalid_api_key_rejected() {
        let mut cdn = cdn();
        cdn.api_key = "bad\nkey".to_string();
        let err = FastlyPurger::with_http_client(reqwest::Client::new(), FASTLY_API_URL, &cdn)
            .unwrap_err();
        assert!(matches!(err, IntegrationError::Config(_)));
    }

    #[tokio::test]
    async fn test_memory_purger_records_calls() {
        let purger = MemoryPurger::new();
        purger.purge_keys(&["a".to_string(), "b".to_string()]).await.unwrap();

        purger.fail(true);
        assert!(purger.purge_keys(&["c".to_string()]).await.is_err());

        assert_eq!(
            purger.calls(),
            vec![vec!["a".to_string(), "b".to_string()], vec!["c".to_string()]]
        );
    }
}
