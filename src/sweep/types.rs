//! Sweep policy, results and running statistics.

use rust_decimal::Decimal;
use serde::Serialize;
use std::time::Duration;
use time::OffsetDateTime;

use crate::config::Config;
use crate::error::ApiError;
use crate::market::{CollectionHealth, MarketTrend};

/// Rejection reason: floor-to-second gap below the configured minimum.
pub const REASON_GAP_TOO_SMALL: &str = "Price gap too small";

/// Rejection reason: trend/health gate failed.
pub const REASON_UNFAVORABLE_MARKET: &str = "Market conditions unfavorable";

/// Rejection reason: per-collection or total position cap reached.
pub const REASON_POSITION_LIMITS: &str = "Position limits exceeded";

/// Rejection reason: estimated profit below the configured minimum.
pub const REASON_INSUFFICIENT_PROFIT: &str = "Insufficient profit after gas costs";

/// Rejection reason: floor ask costs more than the purchase budget.
pub const REASON_FLOOR_OVER_BUDGET: &str = "Floor price exceeds maximum purchase price";

/// Rejection reason: configured gas price above the allowed ceiling.
pub const REASON_GAS_TOO_HIGH: &str = "Gas price exceeds configured ceiling";

/// Rejection reason: fewer than two priced listings in the snapshot.
pub const REASON_TOO_FEW_LISTINGS: &str = "Not enough priced listings to evaluate the floor";

/// Sweep policy. Every field is required: the engine never trades on a
/// half-specified policy.
#[derive(Debug, Clone)]
pub struct SweepConfig {
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
    pub max_holding_time: Duration,
    /// Number of asks fetched for the listing snapshot.
    pub listings_limit: u32,
}

impl From<&Config> for SweepConfig {
    fn from(config: &Config) -> Self {
        Self {
            min_price_gap_percent: config.min_price_gap_percent,
            max_purchase_price: config.max_purchase_price,
            target_profit_percent: config.target_profit_percent,
            max_slippage_bps: config.max_slippage_bps,
            min_profit_after_gas: config.min_profit_after_gas,
            buy_gas_units: config.buy_gas_units,
            list_gas_units: config.list_gas_units,
            gas_price_gwei: config.gas_price_gwei,
            max_gas_price_gwei: config.max_gas_price_gwei,
            max_positions_per_collection: config.max_positions_per_collection,
            max_total_positions: config.max_total_positions,
            min_volume_24h: config.min_volume_24h,
            min_holder_count: config.min_holder_count,
            min_market_cap: config.min_market_cap,
            max_holding_time: Duration::from_secs(config.max_holding_time_secs),
            listings_limit: config.listings_limit,
        }
    }
}

/// Outcome of one sweep invocation. Rejections and failures carry the
/// reason in `error` with zeroed financial fields.
#[derive(Debug, Clone, Serialize)]
pub struct SweepResult {
    /// Collection that was swept.
    pub collection: String,
    /// Whether a floor token was bought.
    pub purchased: bool,
    /// Whether the bought token was relisted.
    pub listed: bool,
    /// Token that was bought, when any.
    pub token_id: Option<String>,
    /// Lowest listing price at sweep time.
    pub floor_price: Decimal,
    /// Second-lowest listing price at sweep time.
    pub second_price: Decimal,
    /// Actual purchase price.
    pub purchase_price: Decimal,
    /// Relist price.
    pub list_price: Decimal,
    /// Estimated gas cost for buy plus list, in ETH.
    pub gas_cost: Decimal,
    /// Estimated profit after gas, in ETH.
    pub estimated_profit: Decimal,
    /// Buy slippage relative to the observed floor, in percent.
    pub actual_slippage_pct: Decimal,
    /// Trend snapshot taken during the sweep, when the gate was reached.
    pub trend: Option<MarketTrend>,
    /// Health snapshot taken during the sweep, when the gate was reached.
    pub health: Option<CollectionHealth>,
    /// Rejection reason or failure text.
    pub error: Option<String>,
    /// When the sweep finished.
    #[serde(with = "time::serde::timestamp")]
    pub completed_at: OffsetDateTime,
}

impl SweepResult {
    /// A sweep stopped by a policy gate.
    pub fn rejected(collection: &str, reason: impl Into<String>) -> Self {
        Self {
            collection: collection.to_string(),
            purchased: false,
            listed: false,
            token_id: None,
            floor_price: Decimal::ZERO,
            second_price: Decimal::ZERO,
            purchase_price: Decimal::ZERO,
            list_price: Decimal::ZERO,
            gas_cost: Decimal::ZERO,
            estimated_profit: Decimal::ZERO,
            actual_slippage_pct: Decimal::ZERO,
            trend: None,
            health: None,
            error: Some(reason.into()),
            completed_at: OffsetDateTime::now_utc(),
        }
    }

    /// A sweep stopped by an API failure.
    pub fn failure(collection: &str, error: &ApiError) -> Self {
        Self::rejected(collection, error.to_string())
    }
}

/// Counters accumulated across sweeps.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepStats {
    /// Sweep invocations.
    pub sweeps_attempted: u64,
    /// Successful floor purchases.
    pub purchases: u64,
    /// Listings created after a purchase.
    pub listings_created: u64,
    /// Sweeps stopped by a gate or failure.
    pub rejections: u64,
    /// Stale positions evicted from the ledger.
    pub positions_evicted: u64,
    /// Total ETH spent on purchases.
    pub total_spent: Decimal,
    /// Sum of estimated profits on completed sweeps.
    pub total_estimated_profit: Decimal,
}

impl SweepStats {
    /// Fold a finished sweep into the counters.
    pub fn record(&mut self, result: &SweepResult) {
        self.sweeps_attempted += 1;
        if result.purchased {
            self.purchases += 1;
            self.total_spent += result.purchase_price;
            self.total_estimated_profit += result.estimated_profit;
        } else if result.error.is_some() {
            self.rejections += 1;
        }
        if result.listed {
            self.listings_created += 1;
        }
    }

    /// Fold an eviction round into the counters.
    pub fn record_evictions(&mut self, count: u64) {
        self.positions_evicted += count;
    }
}
