//! Floor-sweep engine.
//!
//! This module handles:
//! - Gate-ordered evaluation of a collection's floor
//! - Buy-then-relist execution with slippage tracking
//! - Position recording and stale eviction
//!
//! Gates run cheapest-first: local caps before market reads, market reads
//! before the listing snapshot, and every pricing check before any execute
//! call. A sweep that stops at a gate produces a rejected [`SweepResult`]
//! with the reason, never an error.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use time::OffsetDateTime;
use tracing::{debug, error, info, instrument, warn};

use crate::error::ApiError;
use crate::execution::ExecutionService;
use crate::market::{CollectionHealth, MarketDataService, MarketTrend};
use crate::metrics::{
    inc_listings, inc_positions_evicted, inc_purchases, inc_sweep_rejection, record_sweep,
};

use super::gates;
use super::position::{Position, PositionBook};
use super::types::{
    SweepConfig, SweepResult, SweepStats, REASON_FLOOR_OVER_BUDGET, REASON_GAP_TOO_SMALL,
    REASON_GAS_TOO_HIGH, REASON_INSUFFICIENT_PROFIT, REASON_POSITION_LIMITS,
    REASON_TOO_FEW_LISTINGS, REASON_UNFAVORABLE_MARKET,
};

/// Evaluates collections and executes floor sweeps.
///
/// Sweeps on the same collection are serialized through a per-collection
/// guard so two concurrent invocations can never double-buy one floor.
pub struct FloorSweeper {
    market: MarketDataService,
    execution: ExecutionService,
    config: SweepConfig,
    positions: PositionBook,
    stats: RwLock<SweepStats>,
    guards: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
}

impl FloorSweeper {
    pub fn new(market: MarketDataService, execution: ExecutionService, config: SweepConfig) -> Self {
        Self {
            market,
            execution,
            config,
            positions: PositionBook::new(),
            stats: RwLock::new(SweepStats::default()),
            guards: DashMap::new(),
        }
    }

    /// Evaluate one collection and sweep its floor if every gate passes.
    ///
    /// API failures are folded into the result rather than surfaced, so a
    /// caller looping over collections never stops on a bad one.
    #[instrument(skip(self))]
    pub async fn sweep_floor(&self, collection: &str) -> SweepResult {
        let guard = self.guard_for(collection);
        let _held = guard.lock().await;
        let start = Instant::now();

        let result = match self.try_sweep(collection).await {
            Ok(result) => result,
            Err(err) => {
                error!(
                    collection = %collection,
                    error = %err,
                    severity = %err.severity(),
                    "Sweep failed"
                );
                SweepResult::failure(collection, &err)
            }
        };

        record_sweep(collection, start);
        if !result.purchased {
            if let Some(reason) = result.error.as_deref() {
                inc_sweep_rejection(collection, reason);
            }
        }
        self.stats.write().record(&result);
        result
    }

    /// Sweep every collection in order, one result per collection.
    #[instrument(skip(self, collections), fields(count = collections.len()))]
    pub async fn sweep_all(&self, collections: &[String]) -> Vec<SweepResult> {
        let mut results = Vec::with_capacity(collections.len());
        for collection in collections {
            results.push(self.sweep_floor(collection).await);
        }
        results
    }

    /// Snapshot of the accumulated sweep counters.
    pub fn stats(&self) -> SweepStats {
        self.stats.read().clone()
    }

    /// Snapshot of every open position.
    pub fn open_positions(&self) -> Vec<Position> {
        self.positions.snapshot()
    }

    /// Open positions across all collections.
    pub fn position_count(&self) -> usize {
        self.positions.total()
    }

    async fn try_sweep(&self, collection: &str) -> Result<SweepResult, ApiError> {
        // Stale positions come off the book first so the caps below see
        // current holdings.
        self.evict_stale_positions();

        if !self.positions.within_limits(
            collection,
            self.config.max_positions_per_collection,
            self.config.max_total_positions,
        ) {
            debug!(collection = %collection, "Position caps reached");
            return Ok(SweepResult::rejected(collection, REASON_POSITION_LIMITS));
        }

        let (trend, health) = tokio::try_join!(
            self.market.market_trend(collection),
            self.market.collection_health(collection)
        )?;

        let favorable = trend.uptrend()
            && health.healthy()
            && trend.volume_24h >= self.config.min_volume_24h
            && health.owner_count >= self.config.min_holder_count
            && health.market_cap >= self.config.min_market_cap;
        if !favorable {
            debug!(
                collection = %collection,
                volume_24h = %trend.volume_24h,
                owner_count = health.owner_count,
                market_cap = %health.market_cap,
                "Market gate failed"
            );
            return Ok(gated(
                collection,
                REASON_UNFAVORABLE_MARKET,
                trend,
                health,
                Decimal::ZERO,
                Decimal::ZERO,
            ));
        }

        let listings = self
            .market
            .floor_listings(collection, self.config.listings_limit)
            .await?;
        if listings.len() < 2 {
            debug!(collection = %collection, listed = listings.len(), "Order book too thin");
            let floor = listings.first().map_or(Decimal::ZERO, |l| l.price);
            return Ok(gated(
                collection,
                REASON_TOO_FEW_LISTINGS,
                trend,
                health,
                floor,
                Decimal::ZERO,
            ));
        }
        let lowest = listings[0].clone();
        let second = listings[1].clone();

        let gap = gates::gap_percent(lowest.price, second.price);
        if gap < self.config.min_price_gap_percent {
            debug!(collection = %collection, gap = %gap, "Gap below minimum");
            return Ok(gated(
                collection,
                REASON_GAP_TOO_SMALL,
                trend,
                health,
                lowest.price,
                second.price,
            ));
        }
        if lowest.price > self.config.max_purchase_price {
            debug!(collection = %collection, floor = %lowest.price, "Floor over budget");
            return Ok(gated(
                collection,
                REASON_FLOOR_OVER_BUDGET,
                trend,
                health,
                lowest.price,
                second.price,
            ));
        }

        if self.config.gas_price_gwei > self.config.max_gas_price_gwei {
            warn!(
                gas_price_gwei = %self.config.gas_price_gwei,
                ceiling = %self.config.max_gas_price_gwei,
                "Gas price over ceiling"
            );
            return Ok(gated(
                collection,
                REASON_GAS_TOO_HIGH,
                trend,
                health,
                lowest.price,
                second.price,
            ));
        }
        let gas_cost = gates::gas_cost_eth(
            self.config.buy_gas_units,
            self.config.list_gas_units,
            self.config.gas_price_gwei,
        );
        let target = gates::target_list_price(lowest.price, self.config.target_profit_percent);
        let projected = gates::estimated_profit(target, lowest.price, gas_cost);
        if projected < self.config.min_profit_after_gas {
            debug!(
                collection = %collection,
                projected = %projected,
                minimum = %self.config.min_profit_after_gas,
                "Profit below minimum"
            );
            return Ok(gated(
                collection,
                REASON_INSUFFICIENT_PROFIT,
                trend,
                health,
                lowest.price,
                second.price,
            ));
        }

        info!(
            collection = %collection,
            token_id = %lowest.token_id,
            floor = %lowest.price,
            second = %second.price,
            gap = %gap,
            projected_profit = %projected,
            "Floor sweep opportunity"
        );

        let purchase = self
            .execution
            .buy_token(collection, &lowest.token_id, lowest.price)
            .await?;
        let bound = gates::max_buy_price(lowest.price, self.config.max_slippage_bps);
        if purchase.price > bound {
            // The fill already happened; the bound is visibility, not a veto.
            warn!(
                collection = %collection,
                fill = %purchase.price,
                bound = %bound,
                "Fill exceeded the slippage bound"
            );
        }
        let slippage = gates::slippage_percent(purchase.price, lowest.price);
        let estimated = gates::estimated_profit(target, purchase.price, gas_cost);

        let mut listed = false;
        let mut listing_error = None;
        match self
            .execution
            .list_token(collection, &purchase.token_id, target)
            .await
        {
            Ok(_) => {
                listed = true;
                inc_listings(collection);
            }
            Err(err) => {
                // The token is held either way; the position below keeps it
                // visible for a manual relist.
                warn!(
                    collection = %collection,
                    token_id = %purchase.token_id,
                    error = %err,
                    "Listing failed after purchase"
                );
                listing_error = Some(format!("listing failed: {err}"));
            }
        }

        self.positions.record(Position {
            token_id: purchase.token_id.clone(),
            collection: collection.to_string(),
            purchase_price: purchase.price,
            list_price: target,
            purchase_time: OffsetDateTime::now_utc(),
            gas_used: gas_cost,
        });
        inc_purchases(collection);

        if listed {
            info!("========================================");
            info!("FLOOR SWEEP EXECUTED");
            info!("Collection: {}", collection);
            info!("Token: {}", purchase.token_id);
            info!("Bought at: {} ETH", purchase.price);
            info!("Relisted at: {} ETH", target);
            info!("Estimated profit: {} ETH (gas {} ETH)", estimated, gas_cost);
            if purchase.simulated {
                info!("Mode: DRY RUN (simulated)");
            }
            info!("========================================");
        }

        Ok(SweepResult {
            collection: collection.to_string(),
            purchased: true,
            listed,
            token_id: Some(purchase.token_id),
            floor_price: lowest.price,
            second_price: second.price,
            purchase_price: purchase.price,
            list_price: target,
            gas_cost,
            estimated_profit: estimated,
            actual_slippage_pct: slippage,
            trend: Some(trend),
            health: Some(health),
            error: listing_error,
            completed_at: OffsetDateTime::now_utc(),
        })
    }

    fn evict_stale_positions(&self) {
        let evicted = self.positions.evict_stale(self.config.max_holding_time);
        if evicted.is_empty() {
            return;
        }

        let mut by_collection: HashMap<&str, u64> = HashMap::new();
        for position in &evicted {
            *by_collection.entry(position.collection.as_str()).or_insert(0) += 1;
        }
        for (collection, count) in by_collection {
            inc_positions_evicted(collection, count);
            info!(collection = %collection, count, "Evicted stale positions");
        }
        self.stats.write().record_evictions(evicted.len() as u64);
    }

    fn guard_for(&self, collection: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.guards
            .entry(collection.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

/// A gate rejection that keeps the market snapshots and observed prices.
fn gated(
    collection: &str,
    reason: &str,
    trend: MarketTrend,
    health: CollectionHealth,
    floor_price: Decimal,
    second_price: Decimal,
) -> SweepResult {
    let mut result = SweepResult::rejected(collection, reason);
    result.trend = Some(trend);
    result.health = Some(health);
    result.floor_price = floor_price;
    result.second_price = second_price;
    result
}
