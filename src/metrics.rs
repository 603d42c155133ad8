//! Prometheus metrics for latency tracking and monitoring.
//!
//! This module provides metrics for:
//! - Resilient request layer (latency, cache, rate limiting, circuit breaker)
//! - Execute-call submission
//! - Sweep pipeline outcomes

use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use tracing::debug;

// === Metric Name Constants ===

/// API request latency metric name.
pub const METRIC_API_REQUEST_LATENCY: &str = "api_request_latency_ms";
/// API requests counter metric name.
pub const METRIC_API_REQUESTS: &str = "api_requests_total";
/// API request failures counter metric name.
pub const METRIC_API_REQUEST_FAILURES: &str = "api_request_failures_total";
/// Cache hits counter metric name.
pub const METRIC_CACHE_HITS: &str = "cache_hits_total";
/// Cache misses counter metric name.
pub const METRIC_CACHE_MISSES: &str = "cache_misses_total";
/// Rate-limit denials counter metric name.
pub const METRIC_RATE_LIMITED: &str = "rate_limited_total";
/// Circuit-breaker fast-fails counter metric name.
pub const METRIC_CIRCUIT_FAST_FAILS: &str = "circuit_fast_fails_total";
/// Circuit-breaker open transitions counter metric name.
pub const METRIC_CIRCUIT_OPENED: &str = "circuit_opened_total";
/// Execute-call latency metric name.
pub const METRIC_EXECUTE_LATENCY: &str = "execute_latency_ms";
/// Execute calls counter metric name.
pub const METRIC_EXECUTE_CALLS: &str = "execute_calls_total";
/// Sweep latency metric name.
pub const METRIC_SWEEP_LATENCY: &str = "sweep_latency_ms";
/// Sweeps attempted counter metric name.
pub const METRIC_SWEEPS_ATTEMPTED: &str = "sweeps_attempted_total";
/// Sweep rejections counter metric name.
pub const METRIC_SWEEP_REJECTIONS: &str = "sweep_rejections_total";
/// Purchases counter metric name.
pub const METRIC_PURCHASES: &str = "purchases_total";
/// Listings counter metric name.
pub const METRIC_LISTINGS: &str = "listings_total";
/// Stale-position evictions counter metric name.
pub const METRIC_POSITIONS_EVICTED: &str = "positions_evicted_total";

/// Initialize all metric descriptions.
/// Call this once at startup to register metrics with descriptions.
pub fn init_metrics() {
    // Latency histograms
    describe_histogram!(
        METRIC_API_REQUEST_LATENCY,
        "Reservoir API request latency in milliseconds"
    );
    describe_histogram!(
        METRIC_EXECUTE_LATENCY,
        "Execute-call latency in milliseconds"
    );
    describe_histogram!(METRIC_SWEEP_LATENCY, "Full sweep latency in milliseconds");

    // Counters
    describe_counter!(METRIC_API_REQUESTS, "Total API requests attempted");
    describe_counter!(
        METRIC_API_REQUEST_FAILURES,
        "Total API requests that failed after classification"
    );
    describe_counter!(METRIC_CACHE_HITS, "Total response-cache hits");
    describe_counter!(METRIC_CACHE_MISSES, "Total response-cache misses");
    describe_counter!(METRIC_RATE_LIMITED, "Total local rate-limit denials");
    describe_counter!(
        METRIC_CIRCUIT_FAST_FAILS,
        "Total calls rejected by an open circuit"
    );
    describe_counter!(
        METRIC_CIRCUIT_OPENED,
        "Total closed-to-open circuit transitions"
    );
    describe_counter!(METRIC_EXECUTE_CALLS, "Total execute calls submitted");
    describe_counter!(METRIC_SWEEPS_ATTEMPTED, "Total sweep invocations");
    describe_counter!(
        METRIC_SWEEP_REJECTIONS,
        "Total sweeps rejected by a validation gate"
    );
    describe_counter!(METRIC_PURCHASES, "Total successful floor purchases");
    describe_counter!(METRIC_LISTINGS, "Total successful relistings");
    describe_counter!(
        METRIC_POSITIONS_EVICTED,
        "Total positions evicted as stale"
    );

    debug!("Metrics initialized");
}

/// Record an API request outcome with its latency.
pub fn record_api_request(endpoint: &str, start: Instant, success: bool) {
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    histogram!(METRIC_API_REQUEST_LATENCY, "endpoint" => endpoint.to_string()).record(latency_ms);
    counter!(
        METRIC_API_REQUESTS,
        "endpoint" => endpoint.to_string(),
        "outcome" => if success { "ok" } else { "error" }
    )
    .increment(1);
}

/// Record a classified request failure.
pub fn record_api_failure(endpoint: &str, kind: &str) {
    counter!(
        METRIC_API_REQUEST_FAILURES,
        "endpoint" => endpoint.to_string(),
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Increment the cache hit counter.
pub fn inc_cache_hit(endpoint: &str) {
    counter!(METRIC_CACHE_HITS, "endpoint" => endpoint.to_string()).increment(1);
}

/// Increment the cache miss counter.
pub fn inc_cache_miss(endpoint: &str) {
    counter!(METRIC_CACHE_MISSES, "endpoint" => endpoint.to_string()).increment(1);
}

/// Increment the rate-limit denial counter.
pub fn inc_rate_limited(bucket: &str) {
    counter!(METRIC_RATE_LIMITED, "bucket" => bucket.to_string()).increment(1);
}

/// Increment the circuit fast-fail counter.
pub fn inc_circuit_fast_fail(path: &str) {
    counter!(METRIC_CIRCUIT_FAST_FAILS, "path" => path.to_string()).increment(1);
}

/// Increment the circuit opened counter.
pub fn inc_circuit_opened(path: &str) {
    counter!(METRIC_CIRCUIT_OPENED, "path" => path.to_string()).increment(1);
}

/// Record an execute call with its latency.
pub fn record_execute_call(verb: &str, start: Instant, success: bool) {
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    histogram!(METRIC_EXECUTE_LATENCY, "verb" => verb.to_string()).record(latency_ms);
    counter!(
        METRIC_EXECUTE_CALLS,
        "verb" => verb.to_string(),
        "outcome" => if success { "ok" } else { "error" }
    )
    .increment(1);
}

/// Record a completed sweep invocation with its latency.
pub fn record_sweep(collection: &str, start: Instant) {
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    histogram!(METRIC_SWEEP_LATENCY, "collection" => collection.to_string()).record(latency_ms);
    counter!(METRIC_SWEEPS_ATTEMPTED, "collection" => collection.to_string()).increment(1);
}

/// Increment the sweep rejection counter for a gate reason.
pub fn inc_sweep_rejection(collection: &str, reason: &str) {
    counter!(
        METRIC_SWEEP_REJECTIONS,
        "collection" => collection.to_string(),
        "reason" => reason.to_string()
    )
    .increment(1);
}

/// Increment the purchase counter.
pub fn inc_purchases(collection: &str) {
    counter!(METRIC_PURCHASES, "collection" => collection.to_string()).increment(1);
}

/// Increment the listing counter.
pub fn inc_listings(collection: &str) {
    counter!(METRIC_LISTINGS, "collection" => collection.to_string()).increment(1);
}

/// Increment the stale-eviction counter.
pub fn inc_positions_evicted(collection: &str, count: u64) {
    counter!(METRIC_POSITIONS_EVICTED, "collection" => collection.to_string()).increment(count);
}

/// RAII guard for timing operations.
/// Automatically records latency when dropped.
pub struct LatencyTimer {
    start: Instant,
    metric_name: &'static str,
}

impl LatencyTimer {
    /// Create a new latency timer for the given metric.
    pub fn new(metric_name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            metric_name,
        }
    }

    /// Get elapsed time in milliseconds (without recording).
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        let latency_ms = self.start.elapsed().as_secs_f64() * 1000.0;
        histogram!(self.metric_name).record(latency_ms);
    }
}

/// Create a latency timer for a sweep invocation.
pub fn timer_sweep() -> LatencyTimer {
    LatencyTimer::new(METRIC_SWEEP_LATENCY)
}

/// Create a latency timer for an execute call.
pub fn timer_execute() -> LatencyTimer {
    LatencyTimer::new(METRIC_EXECUTE_LATENCY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn latency_timer_measures_time() {
        let timer = LatencyTimer::new("test_metric");
        sleep(Duration::from_millis(10));
        let elapsed = timer.elapsed_ms();
        assert!(elapsed >= 9.0); // Allow some tolerance
        // Timer will record on drop
    }
}
