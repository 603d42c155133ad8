//! Resilient Reservoir API client.
//!
//! Every query request flows through the same pipeline: response cache,
//! local rate limiter, per-path circuit breaker, retry with backoff, HTTP.
//! Execute (POST) requests skip the cache and the retry loop since a
//! timed-out order submission may still have reached the orderbook.

pub mod breaker;
pub mod cache;
pub mod rate_limit;
pub mod retry;

use std::time::{Duration, Instant};

use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::{debug, instrument, warn};

use crate::config::Config;
use crate::error::{ApiError, ErrorKind};
use crate::metrics;

pub use breaker::{BreakerConfig, BreakerRegistry, CircuitBreaker, CircuitState};
pub use cache::{cache_key, ResponseCache};
pub use rate_limit::RequestBudget;
pub use retry::RetryPolicy;

/// Header carrying the Reservoir API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Environment variable consulted for the API key on every call.
pub const API_KEY_ENV: &str = "RESERVOIR_API_KEY";

/// Rate-limit bucket shared by read-only query endpoints.
pub const BUCKET_QUERIES: &str = "reservoir:queries";

/// Rate-limit bucket shared by execute endpoints.
pub const BUCKET_EXECUTE: &str = "reservoir:execute";

/// Delay hint applied when a 429 response carries no Retry-After header.
const DEFAULT_RETRY_AFTER_MS: u64 = 1_000;

/// Upper bound on cached responses before oldest entries are evicted.
const CACHE_CAPACITY: usize = 4_096;

/// Client tuning knobs.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the Reservoir API.
    pub base_url: String,
    /// Static API key; the `RESERVOIR_API_KEY` env var takes precedence.
    pub api_key: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Total attempts per retried request.
    pub max_retries: u32,
    /// Base delay for exponential backoff.
    pub base_delay: Duration,
    /// Randomize backoff delays to spread out retry storms.
    pub jitter: bool,
    /// Serve repeated queries from the response cache.
    pub cache_enabled: bool,
    /// Cache TTL for endpoints that do not pick their own.
    pub default_ttl: Duration,
    /// Maximum in-flight requests.
    pub max_concurrent: usize,
    /// Local request budget per minute; 0 disables it.
    pub rate_limit_per_minute: u32,
    /// Circuit breaker tuning applied to every call path.
    pub breaker: BreakerConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.reservoir.tools".to_string(),
            api_key: None,
            timeout: Duration::from_secs(30),
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            jitter: true,
            cache_enabled: true,
            default_ttl: Duration::from_secs(300),
            max_concurrent: 5,
            rate_limit_per_minute: 120,
            breaker: BreakerConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Set the API base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the static API key.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the total attempt count for retried requests.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the backoff base delay.
    #[must_use]
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Enable or disable backoff jitter.
    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Enable or disable the response cache.
    #[must_use]
    pub fn with_cache_enabled(mut self, cache_enabled: bool) -> Self {
        self.cache_enabled = cache_enabled;
        self
    }

    /// Set the fallback cache TTL.
    #[must_use]
    pub fn with_default_ttl(mut self, default_ttl: Duration) -> Self {
        self.default_ttl = default_ttl;
        self
    }

    /// Set the local per-minute request budget (0 disables).
    #[must_use]
    pub fn with_rate_limit_per_minute(mut self, per_minute: u32) -> Self {
        self.rate_limit_per_minute = per_minute;
        self
    }

    /// Set the circuit breaker tuning.
    #[must_use]
    pub fn with_breaker(mut self, breaker: BreakerConfig) -> Self {
        self.breaker = breaker;
        self
    }
}

impl From<&Config> for ClientConfig {
    fn from(config: &Config) -> Self {
        Self {
            base_url: config.reservoir_base_url.clone(),
            api_key: config.reservoir_api_key.clone(),
            timeout: Duration::from_millis(config.request_timeout_ms),
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
            jitter: config.retry_jitter,
            cache_enabled: config.cache_enabled,
            default_ttl: Duration::from_secs(config.cache_ttl_secs),
            max_concurrent: config.max_concurrent,
            rate_limit_per_minute: config.rate_limit_per_minute,
            breaker: BreakerConfig::default()
                .with_max_failures(config.breaker_max_failures)
                .with_reset_timeout(Duration::from_secs(config.breaker_reset_timeout_secs)),
        }
    }
}

/// Reservoir API client with caching, rate limiting, circuit breaking and
/// retries built in.
#[derive(Debug)]
pub struct ReservoirClient {
    /// HTTP client for API requests.
    http: reqwest::Client,
    /// Client tuning.
    config: ClientConfig,
    /// TTL-bounded response cache for query endpoints.
    cache: ResponseCache,
    /// Local request budget, if enabled.
    budget: Option<RequestBudget>,
    /// One circuit breaker per call path.
    breakers: BreakerRegistry,
    /// Retry policy for query endpoints.
    retry: RetryPolicy,
    /// Bounds in-flight requests.
    permits: Semaphore,
}

impl ReservoirClient {
    /// Create a client from tuning knobs.
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            // Fast connection establishment
            .connect_timeout(Duration::from_secs(10))
            // Keep connections alive for reuse
            .tcp_keepalive(Duration::from_secs(30))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| ApiError::unknown(format!("failed to build HTTP client: {e}")))?;

        let retry = RetryPolicy::new(config.max_retries, config.base_delay, config.jitter)
            .with_retryable(&[ErrorKind::RateLimit, ErrorKind::Timeout, ErrorKind::Network]);

        Ok(Self {
            http,
            cache: ResponseCache::new(CACHE_CAPACITY),
            budget: RequestBudget::per_minute(config.rate_limit_per_minute),
            breakers: BreakerRegistry::new(config.breaker.clone()),
            retry,
            permits: Semaphore::new(config.max_concurrent.max(1)),
            config,
        })
    }

    /// Create a client from application config.
    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Self::new(ClientConfig::from(config))
    }

    /// The configured API base URL.
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Current circuit breaker states by call path.
    pub fn breaker_states(&self) -> Vec<(String, CircuitState)> {
        self.breakers.states()
    }

    /// Drop expired cache entries, returning how many were removed.
    pub fn purge_expired_cache(&self) -> usize {
        self.cache.purge_expired()
    }

    /// Resolve the API key for one call. The env var wins over the static
    /// config so keys can be rotated without a restart; no key means the
    /// request goes out unauthenticated.
    fn credential(&self) -> Option<String> {
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| self.config.api_key.clone())
    }

    /// GET a query endpoint through the full pipeline and deserialize the
    /// response. `ttl` overrides the default cache TTL for this endpoint.
    #[instrument(skip(self, params, ttl))]
    pub async fn get_json<T>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
        ttl: Option<Duration>,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ApiError::unknown("request pool closed"))?;

        let key = cache_key(endpoint, params);
        if self.config.cache_enabled {
            if let Some(value) = self.cache.get(&key) {
                metrics::inc_cache_hit(endpoint);
                debug!(endpoint = %endpoint, "Cache hit");
                return Ok(serde_json::from_value(value)?);
            }
            metrics::inc_cache_miss(endpoint);
        }

        // The budget is charged once per call, not per retry attempt, and a
        // local denial is returned as-is rather than retried.
        if let Some(budget) = &self.budget {
            if let Err(err) = budget.consume(BUCKET_QUERIES, 1) {
                metrics::inc_rate_limited(BUCKET_QUERIES);
                warn!(endpoint = %endpoint, "Local request budget exhausted");
                return Err(err);
            }
        }

        let api_key = self.credential();
        let breaker = self.breakers.for_path(endpoint);
        let start = Instant::now();
        let result = breaker
            .call(|| {
                self.retry
                    .run(|| self.send_get(endpoint, params, api_key.as_deref()))
            })
            .await;

        metrics::record_api_request(endpoint, start, result.is_ok());
        let value = match result {
            Ok(value) => value,
            Err(err) => {
                metrics::record_api_failure(endpoint, &err.kind().to_string());
                return Err(err);
            }
        };

        if self.config.cache_enabled {
            self.cache
                .insert(key, value.clone(), ttl.unwrap_or(self.config.default_ttl));
        }

        Ok(serde_json::from_value(value)?)
    }

    /// POST to an execute endpoint and deserialize the response. Never
    /// cached and never retried.
    #[instrument(skip(self, body))]
    pub async fn post_execute<T>(&self, endpoint: &str, body: &Value) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ApiError::unknown("request pool closed"))?;

        if let Some(budget) = &self.budget {
            if let Err(err) = budget.consume(BUCKET_EXECUTE, 1) {
                metrics::inc_rate_limited(BUCKET_EXECUTE);
                warn!(endpoint = %endpoint, "Local request budget exhausted");
                return Err(err);
            }
        }

        let api_key = self.credential();
        let breaker = self.breakers.for_path(endpoint);
        let start = Instant::now();
        let result = breaker
            .call(|| self.send_post(endpoint, body, api_key.as_deref()))
            .await;

        metrics::record_api_request(endpoint, start, result.is_ok());
        match result {
            Ok(value) => Ok(serde_json::from_value(value)?),
            Err(err) => {
                metrics::record_api_failure(endpoint, &err.kind().to_string());
                Err(err)
            }
        }
    }

    async fn send_get(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
        api_key: Option<&str>,
    ) -> Result<Value, ApiError> {
        let url = format!("{}{}", self.config.base_url, endpoint);
        let mut request = self.http.get(&url);
        if !params.is_empty() {
            request = request.query(params);
        }
        if let Some(key) = api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request.send().await?;
        Self::handle_response(response).await
    }

    async fn send_post(
        &self,
        endpoint: &str,
        body: &Value,
        api_key: Option<&str>,
    ) -> Result<Value, ApiError> {
        let url = format!("{}{}", self.config.base_url, endpoint);
        let mut request = self.http.post(&url).json(body);
        if let Some(key) = api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request.send().await?;
        Self::handle_response(response).await
    }

    /// Map an HTTP response to a JSON value or a typed error.
    async fn handle_response(response: reqwest::Response) -> Result<Value, ApiError> {
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            let body = response.text().await.unwrap_or_default();
            let message = if body.trim().is_empty() {
                "invalid or missing api key".to_string()
            } else {
                body
            };
            return Err(ApiError::authentication(message));
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_ms =
                parse_retry_after(response.headers()).unwrap_or(DEFAULT_RETRY_AFTER_MS);
            return Err(ApiError::rate_limited(retry_after_ms));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Http {
                status: status.as_u16(),
                code: extract_error_code(&body),
            });
        }

        let value: Value = response.json().await?;
        if !value.is_object() {
            return Err(ApiError::validation("response", "expected a JSON object"));
        }
        Ok(value)
    }
}

/// Parse a Retry-After header (delta-seconds form) into milliseconds.
fn parse_retry_after(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(|secs| secs.saturating_mul(1_000))
}

/// Pull a short error code out of an API error body. Reservoir error
/// payloads carry the code under "error" with detail under "message".
fn extract_error_code(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    for key in ["error", "message"] {
        if let Some(code) = value.get(key).and_then(|v| v.as_str()) {
            if !code.is_empty() {
                return Some(code.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn app_config() -> Config {
        Config {
            reservoir_api_key: Some("demo-api-key".to_string()),
            reservoir_base_url: "https://api.reservoir.tools".to_string(),
            request_timeout_ms: 30_000,
            max_retries: 3,
            base_delay_ms: 1_000,
            retry_jitter: true,
            breaker_max_failures: 5,
            breaker_reset_timeout_secs: 60,
            cache_enabled: true,
            cache_ttl_secs: 300,
            max_concurrent: 5,
            batch_size: 20,
            rate_limit_per_minute: 120,
            collections: "0x5af0d9827e0c53e4799bb226655a1de152a425a5".to_string(),
            wallet_address: "0x1111111111111111111111111111111111111111".to_string(),
            min_price_gap_percent: dec!(15),
            max_purchase_price: dec!(2),
            target_profit_percent: dec!(10),
            max_slippage_bps: 100,
            min_profit_after_gas: dec!(0.01),
            buy_gas_units: 250_000,
            list_gas_units: 150_000,
            gas_price_gwei: dec!(30),
            max_gas_price_gwei: dec!(100),
            max_positions_per_collection: 2,
            max_total_positions: 10,
            min_volume_24h: dec!(1),
            min_holder_count: 100,
            min_market_cap: dec!(50),
            max_holding_time_secs: 86_400,
            sweep_interval_secs: 60,
            listings_limit: 20,
            dry_run: true,
            api_port: 8080,
            rust_log: "info".to_string(),
        }
    }

    fn test_client(server: &MockServer) -> ReservoirClient {
        test_client_with(server, |config| config)
    }

    fn test_client_with(
        server: &MockServer,
        adjust: impl FnOnce(ClientConfig) -> ClientConfig,
    ) -> ReservoirClient {
        let config = ClientConfig::default()
            .with_base_url(server.uri())
            .with_max_retries(1)
            .with_base_delay(Duration::from_millis(1))
            .with_jitter(false)
            .with_rate_limit_per_minute(0)
            .with_timeout(Duration::from_secs(5));
        ReservoirClient::new(adjust(config)).unwrap()
    }

    fn floor_body() -> Value {
        json!({ "tokens": [{ "token": { "tokenId": "1" } }] })
    }

    #[test]
    fn client_config_from_app_config_maps_fields() {
        let config = app_config();
        let client_config = ClientConfig::from(&config);
        assert_eq!(client_config.timeout, Duration::from_millis(30_000));
        assert_eq!(client_config.max_retries, 3);
        assert_eq!(client_config.api_key.as_deref(), Some("demo-api-key"));
        assert!(client_config.cache_enabled);
        assert_eq!(client_config.default_ttl, Duration::from_secs(300));
        assert_eq!(client_config.breaker.max_failures, 5);
    }

    #[tokio::test]
    async fn get_sends_api_key_and_query_params() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tokens/v7"))
            .and(query_param("collection", "0xabc"))
            .and(header(API_KEY_HEADER, "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(floor_body()))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client_with(&server, |c| c.with_api_key("test-key"));
        let value: Value = client
            .get_json(
                "/tokens/v7",
                &[("collection", "0xabc".to_string())],
                None,
            )
            .await
            .unwrap();

        assert!(value.get("tokens").is_some());
    }

    #[tokio::test]
    async fn repeated_get_is_served_from_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tokens/v7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(floor_body()))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let params = [("collection", "0xabc".to_string())];
        let first: Value = client.get_json("/tokens/v7", &params, None).await.unwrap();
        let second: Value = client.get_json("/tokens/v7", &params, None).await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn unauthorized_maps_to_authentication_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tokens/v7"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client_with(&server, |c| c.with_max_retries(3));
        let result: Result<Value, _> = client.get_json("/tokens/v7", &[], None).await;

        assert!(matches!(result, Err(ApiError::Authentication { .. })));
    }

    #[tokio::test]
    async fn throttled_get_retries_and_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tokens/v7"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/tokens/v7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(floor_body()))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client_with(&server, |c| c.with_max_retries(3));
        let value: Value = client.get_json("/tokens/v7", &[], None).await.unwrap();

        assert!(value.get("tokens").is_some());
    }

    #[tokio::test]
    async fn server_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tokens/v7"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "error": "Internal Server Error"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client_with(&server, |c| c.with_max_retries(3));
        let result: Result<Value, _> = client.get_json("/tokens/v7", &[], None).await;

        match result {
            Err(ApiError::Http { status, code }) => {
                assert_eq!(status, 500);
                assert_eq!(code.as_deref(), Some("Internal Server Error"));
            }
            other => panic!("expected http error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn timeout_is_retried_up_to_max_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tokens/v7"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(floor_body())
                    .set_delay(Duration::from_millis(200)),
            )
            .expect(2)
            .mount(&server)
            .await;

        let client = test_client_with(&server, |c| {
            c.with_max_retries(2).with_timeout(Duration::from_millis(50))
        });
        let result: Result<Value, _> = client.get_json("/tokens/v7", &[], None).await;

        assert!(matches!(result, Err(ApiError::Timeout { .. })));
    }

    #[tokio::test]
    async fn breaker_opens_and_fast_fails_after_repeated_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tokens/v7"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;

        let client = test_client_with(&server, |c| {
            c.with_cache_enabled(false)
                .with_breaker(BreakerConfig::default().with_max_failures(2))
        });

        for _ in 0..2 {
            let result: Result<Value, _> = client.get_json("/tokens/v7", &[], None).await;
            assert!(matches!(result, Err(ApiError::Http { .. })));
        }

        // Third call fails fast without reaching the server.
        let result: Result<Value, _> = client.get_json("/tokens/v7", &[], None).await;
        assert!(matches!(result, Err(ApiError::CircuitOpen { .. })));
    }

    #[tokio::test]
    async fn execute_post_is_never_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/execute/buy/v7"))
            .and(body_partial_json(json!({ "taker": "0xabc" })))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client_with(&server, |c| c.with_max_retries(3));
        let body = json!({ "taker": "0xabc", "items": [] });
        let result: Result<Value, _> = client.post_execute("/execute/buy/v7", &body).await;

        match result {
            Err(ApiError::RateLimited { retry_after_ms }) => {
                assert_eq!(retry_after_ms, 1_000);
            }
            other => panic!("expected rate limited, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_object_response_is_a_validation_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tokens/v7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([1, 2, 3])))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let result: Result<Value, _> = client.get_json("/tokens/v7", &[], None).await;

        assert!(matches!(result, Err(ApiError::Validation { .. })));
    }

    #[test]
    fn retry_after_header_parses_to_millis() {
        let mut headers = HeaderMap::new();
        headers.insert(reqwest::header::RETRY_AFTER, "2".parse().unwrap());
        assert_eq!(parse_retry_after(&headers), Some(2_000));

        headers.insert(reqwest::header::RETRY_AFTER, "soon".parse().unwrap());
        assert_eq!(parse_retry_after(&headers), None);

        assert_eq!(parse_retry_after(&HeaderMap::new()), None);
    }

    #[test]
    fn error_code_extraction_prefers_error_over_message() {
        assert_eq!(
            extract_error_code(r#"{"error": "Bad Request", "message": "detail"}"#).as_deref(),
            Some("Bad Request")
        );
        assert_eq!(
            extract_error_code(r#"{"message": "detail"}"#).as_deref(),
            Some("detail")
        );
        assert_eq!(extract_error_code("not json"), None);
    }
}
