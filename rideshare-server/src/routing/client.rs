//! OSRM HTTP client.
//!
//! Talks to the `route/v1/driving` service of an OSRM-compatible server.
//! Transient failures (transport errors, non-200 statuses, error codes other
//! than "NoRoute", unreadable bodies) are retried a bounded number of times
//! with a fixed delay.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::debug;

use crate::domain::Coordinate;

use super::RoutingProvider;
use super::error::RoutingError;
use super::types::{OsrmResponse, OsrmRoute, RouteSummary, TurnByTurn};

/// Default OSRM server.
const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";

/// Default maximum concurrent requests.
const DEFAULT_MAX_CONCURRENT: usize = 8;

const DEFAULT_MAX_RETRIES: u32 = 4;

const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(100);

const SUMMARY_QUERY: &str = "overview=false";

const STEPS_QUERY: &str = "steps=true&geometries=geojson&overview=full";

/// Configuration for the OSRM client.
#[derive(Debug, Clone)]
pub struct OsrmConfig {
    /// Server root, without a trailing slash
    pub base_url: String,
    /// Maximum concurrent requests
    pub max_concurrent: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Extra attempts after the first failure
    pub max_retries: u32,
    /// Pause between attempts
    pub retry_delay: Duration,
}

impl OsrmConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            timeout_secs: 10,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n;
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_retries(mut self, max_retries: u32, delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_delay = delay;
        self
    }
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

/// OSRM routing client.
///
/// Uses a semaphore to limit concurrent requests. The permit is released
/// while waiting between retries.
#[derive(Debug, Clone)]
pub struct OsrmClient {
    http: reqwest::Client,
    base_url: String,
    semaphore: Arc<Semaphore>,
    max_retries: u32,
    retry_delay: Duration,
}

impl OsrmClient {
    pub fn new(config: OsrmConfig) -> Result<Self, RoutingError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            semaphore: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
            max_retries: config.max_retries,
            retry_delay: config.retry_delay,
        })
    }

    fn route_url(&self, from: Coordinate, to: Coordinate, query: &str) -> String {
        format!(
            "{}/route/v1/driving/{},{};{},{}?{}",
            self.base_url, from.longitude, from.latitude, to.longitude, to.latitude, query
        )
    }

    async fn fetch_route(
        &self,
        from: Coordinate,
        to: Coordinate,
        query: &str,
    ) -> Result<OsrmRoute, RoutingError> {
        let url = self.route_url(from, to, query);
        let mut attempts = 0;

        loop {
            attempts += 1;
            match self.fetch_once(&url, from, to).await {
                Ok(route) => return Ok(route),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) if attempts > self.max_retries => {
                    return Err(RoutingError::RetriesExhausted {
                        attempts,
                        last: Box::new(e),
                    });
                }
                Err(e) => {
                    debug!(attempts, error = %e, url = %url, "Routing request failed, retrying");
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }
    }

    async fn fetch_once(
        &self,
        url: &str,
        from: Coordinate,
        to: Coordinate,
    ) -> Result<OsrmRoute, RoutingError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| RoutingError::Api {
                status: 0,
                message: "Semaphore closed".to_string(),
            })?;

        let response = self.http.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        let parsed: OsrmResponse = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(_) if !status.is_success() => {
                return Err(RoutingError::Api {
                    status: status.as_u16(),
                    message: body.chars().take(500).collect(),
                });
            }
            Err(e) => {
                return Err(RoutingError::Json {
                    message: e.to_string(),
                    body: Some(body.chars().take(500).collect()),
                });
            }
        };

        if parsed.code == "NoRoute" {
            return Err(RoutingError::NoRoute { from, to });
        }

        if parsed.code != "Ok" || !status.is_success() {
            return Err(RoutingError::Api {
                status: status.as_u16(),
                message: parsed.message.unwrap_or(parsed.code),
            });
        }

        parsed
            .routes
            .into_iter()
            .next()
            .ok_or(RoutingError::NoRoute { from, to })
    }
}

impl RoutingProvider for OsrmClient {
    async fn distance_duration(
        &self,
        from: Coordinate,
        to: Coordinate,
    ) -> Result<RouteSummary, RoutingError> {
        let route = self.fetch_route(from, to, SUMMARY_QUERY).await?;
        Ok(RouteSummary::from(&route))
    }

    async fn turn_by_turn(
        &self,
        from: Coordinate,
        to: Coordinate,
    ) -> Result<TurnByTurn, RoutingError> {
        let route = self.fetch_route(from, to, STEPS_QUERY).await?;
        TurnByTurn::try_from(&route)
    }
}
