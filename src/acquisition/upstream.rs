//! Upstream Client: HTTP client for the public disposal-site query service
//!
//! The service only answers requests that look like its own map page's AJAX
//! calls: a session cookie from the landing page plus browser-style headers.
//! Its certificate chain does not validate, so certificate checks are off by
//! default (`upstream.accept_invalid_certs`).

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, REFERER, USER_AGENT};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::{decode_records, FetchError, FetchOutcome, RecordSource};
use crate::config::UpstreamConfig;
use crate::types::RawRecord;

const ACCEPT_AJAX: &str = "application/json, text/javascript, */*; q=0.01";

/// HTTP client for the upstream service
#[derive(Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    landing_url: String,
    query_url: String,
    city: String,
    landing_timeout: Duration,
    query_timeout: Duration,
}

impl std::fmt::Debug for UpstreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamClient")
            .field("landing_url", &self.landing_url)
            .field("query_url", &self.query_url)
            .finish_non_exhaustive()
    }
}

fn header_value(value: &str) -> Result<HeaderValue, FetchError> {
    HeaderValue::from_str(value).map_err(|e| FetchError::ClientBuild(format!("invalid header value {value:?}: {e}")))
}

impl UpstreamClient {
    /// Create a new upstream client with a fresh cookie jar.
    pub fn new(config: &UpstreamConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, header_value(ACCEPT_AJAX)?);
        headers.insert(USER_AGENT, header_value(&config.user_agent)?);
        headers.insert(
            HeaderName::from_static("x-requested-with"),
            HeaderValue::from_static("XMLHttpRequest"),
        );
        headers.insert(REFERER, header_value(&config.landing_url)?);

        if config.accept_invalid_certs {
            debug!("Upstream certificate validation disabled");
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .cookie_store(true)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| FetchError::ClientBuild(e.to_string()))?;

        Ok(Self {
            http,
            landing_url: config.landing_url.clone(),
            query_url: config.query_url.clone(),
            city: config.city.clone(),
            landing_timeout: Duration::from_secs(config.landing_timeout_secs),
            query_timeout: Duration::from_secs(config.query_timeout_secs),
        })
    }

    /// Fetch the record set, surfacing every failure.
    ///
    /// 1. GET the landing page so the service issues a session cookie. Its
    ///    status is not checked; only transport errors abort.
    /// 2. POST the query form and decode the JSON array.
    pub async fn try_fetch(&self) -> Result<(Vec<RawRecord>, usize), FetchError> {
        let landing = self
            .http
            .get(&self.landing_url)
            .timeout(self.landing_timeout)
            .send()
            .await?;
        debug!(status = %landing.status(), "Upstream landing page visited");

        let resp = self
            .http
            .post(&self.query_url)
            .form(&[("city", self.city.as_str())])
            .timeout(self.query_timeout)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let body = resp.bytes().await?;
        decode_records(&body)
    }

    pub fn query_url(&self) -> &str {
        &self.query_url
    }
}

#[async_trait]
impl RecordSource for UpstreamClient {
    async fn fetch(&self) -> FetchOutcome {
        let started = Instant::now();
        info!(url = %self.query_url, "Fetching disposal-site records");

        match self.try_fetch().await {
            Ok((records, skipped)) => {
                if skipped > 0 {
                    warn!(skipped, "Upstream returned non-record array elements, skipped");
                }
                info!(
                    count = records.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Fetched disposal-site records"
                );
                FetchOutcome {
                    records,
                    failure: None,
                    skipped,
                }
            }
            Err(e) => {
                warn!(
                    error = %e,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Upstream fetch failed, continuing with no data"
                );
                FetchOutcome::failed(e)
            }
        }
    }

    fn source_name(&self) -> &str {
        "upstream"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builds_with_default_config() {
        let client = UpstreamClient::new(&UpstreamConfig::default()).unwrap();
        assert!(client.query_url().ends_with("dumpsiteGisQueryList"));
        assert_eq!(client.source_name(), "upstream");
    }

    #[test]
    fn test_rejects_header_unsafe_user_agent() {
        let config = UpstreamConfig {
            user_agent: "bad\nagent".to_string(),
            ..UpstreamConfig::default()
        };
        assert!(matches!(UpstreamClient::new(&config), Err(FetchError::ClientBuild(_))));
    }

    #[tokio::test]
    async fn test_unreachable_upstream_degrades_to_empty() {
        // Port 9 on loopback: connection refused without touching the network
        let config = UpstreamConfig {
            landing_url: "http://127.0.0.1:9/landing".to_string(),
            query_url: "http://127.0.0.1:9/query".to_string(),
            landing_timeout_secs: 2,
            query_timeout_secs: 2,
            ..UpstreamConfig::default()
        };
        let client = UpstreamClient::new(&config).unwrap();

        let outcome = client.fetch().await;
        assert!(outcome.records.is_empty());
        assert!(matches!(outcome.failure, Some(FetchError::Http(_))));
    }
}
