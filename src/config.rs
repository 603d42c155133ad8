//! Application configuration loaded from environment variables.

use rust_decimal::Decimal;
use serde::Deserialize;

/// Application configuration loaded from environment variables.
///
/// Client knobs are defaulted; the sweep policy fields are deliberately
/// required so the bot never trades on a half-specified policy.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Reservoir API ===
    /// API key for api.reservoir.tools. Optional: unauthenticated calls
    /// surface as authentication errors from the remote side.
    #[serde(default)]
    pub reservoir_api_key: Option<String>,

    /// Base URL of the Reservoir API.
    #[serde(default = "default_base_url")]
    pub reservoir_base_url: String,

    /// Hard timeout for each outbound HTTP request.
    #[serde(default = "default_timeout_ms")]
    pub request_timeout_ms: u64,

    // === Retry & Resilience ===
    /// Maximum invocations of a retryable operation.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base backoff delay in milliseconds (doubles per attempt).
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Multiply backoff by a random factor in [1, 2).
    #[serde(default = "default_true")]
    pub retry_jitter: bool,

    /// Consecutive failures per call path before the circuit opens.
    #[serde(default = "default_breaker_max_failures")]
    pub breaker_max_failures: u32,

    /// Cooldown before an open circuit admits a half-open probe.
    #[serde(default = "default_breaker_reset_secs")]
    pub breaker_reset_timeout_secs: u64,

    // === Caching & Throughput ===
    /// Enable the TTL response cache.
    #[serde(default = "default_true")]
    pub cache_enabled: bool,

    /// Default cache TTL in seconds for endpoints without a specific one.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Maximum in-flight requests to the API.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Page size for list queries (floor tokens, bids).
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Requests admitted per minute; 0 disables the local limiter.
    #[serde(default = "default_rate_limit_per_minute")]
    pub rate_limit_per_minute: u32,

    // === Sweep Policy (required, no defaults) ===
    /// Collections to sweep, comma-separated contract addresses.
    #[serde(default)]
    pub collections: String,

    /// Wallet address used as taker/maker on execute calls.
    pub wallet_address: String,

    /// Minimum floor-to-second-listing gap, in percent.
    pub min_price_gap_percent: Decimal,

    /// Maximum price paid for a single floor purchase, in ETH.
    pub max_purchase_price: Decimal,

    /// Relist markup over the purchased floor, in percent.
    pub target_profit_percent: Decimal,

    /// Maximum tolerated buy slippage, in basis points.
    pub max_slippage_bps: u32,

    /// Minimum estimated profit after gas, in ETH.
    pub min_profit_after_gas: Decimal,

    /// Gas units consumed by a buy fill.
    pub buy_gas_units: u64,

    /// Gas units consumed by creating a listing.
    pub list_gas_units: u64,

    /// Assumed gas price in gwei for profitability estimates.
    pub gas_price_gwei: Decimal,

    /// Ceiling on the assumed gas price; sweeps reject above it.
    pub max_gas_price_gwei: Decimal,

    /// Open-position cap per collection.
    pub max_positions_per_collection: usize,

    /// Open-position cap across all collections.
    pub max_total_positions: usize,

    /// Minimum 24h volume (ETH) for a collection to qualify.
    pub min_volume_24h: Decimal,

    /// Minimum holder count for a collection to qualify.
    pub min_holder_count: u64,

    /// Minimum market cap (ETH) for a collection to qualify.
    pub min_market_cap: Decimal,

    /// Positions older than this are evicted as stale.
    pub max_holding_time_secs: u64,

    // === Runtime ===
    /// Seconds between sweep rounds in `run` mode.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Number of asks fetched for the sweep listing snapshot.
    #[serde(default = "default_listings_limit")]
    pub listings_limit: u32,

    /// Simulation mode (no real execute calls).
    #[serde(default = "default_true")]
    pub dry_run: bool,

    /// HTTP server port for health/metrics endpoints.
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub rust_log: String,
}

fn default_base_url() -> String {
    "https://api.reservoir.tools".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_true() -> bool {
    true
}

fn default_breaker_max_failures() -> u32 {
    5
}

fn default_breaker_reset_secs() -> u64 {
    60
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_max_concurrent() -> usize {
    5
}

fn default_batch_size() -> u32 {
    20
}

fn default_rate_limit_per_minute() -> u32 {
    120
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_listings_limit() -> u32 {
    20
}

fn default_api_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<(), String> {
        if url::Url::parse(&self.reservoir_base_url).is_err() {
            return Err("RESERVOIR_BASE_URL is not a valid URL".to_string());
        }

        if self.wallet_address.is_empty() {
            return Err("WALLET_ADDRESS is required".to_string());
        }

        if !self.wallet_address.starts_with("0x") || self.wallet_address.len() != 42 {
            return Err("WALLET_ADDRESS must be a 0x-prefixed 20-byte address".to_string());
        }

        if self.request_timeout_ms == 0 {
            return Err("REQUEST_TIMEOUT_MS must be positive".to_string());
        }

        if self.max_purchase_price <= Decimal::ZERO {
            return Err("MAX_PURCHASE_PRICE must be positive".to_string());
        }

        if self.max_slippage_bps > 10_000 {
            return Err("MAX_SLIPPAGE_BPS must be at most 10000".to_string());
        }

        if self.max_positions_per_collection == 0 {
            return Err("MAX_POSITIONS_PER_COLLECTION must be at least 1".to_string());
        }

        if self.max_total_positions < self.max_positions_per_collection {
            return Err(
                "MAX_TOTAL_POSITIONS must be at least MAX_POSITIONS_PER_COLLECTION".to_string(),
            );
        }

        if self.max_holding_time_secs == 0 {
            return Err("MAX_HOLDING_TIME_SECS must be positive".to_string());
        }

        Ok(())
    }

    /// Collections to sweep, parsed from the comma-separated env value.
    pub fn collection_list(&self) -> Vec<String> {
        self.collections
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// API key with all but the last four characters masked, for logs.
    pub fn redacted_api_key(&self) -> String {
        match &self.reservoir_api_key {
            Some(key) if key.len() > 4 => format!("****{}", &key[key.len() - 4..]),
            Some(_) => "****".to_string(),
            None => "<unset>".to_string(),
        }
    }
}
