//! HTTP API handlers.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::sweep::{FloorSweeper, Position, SweepStats};

/// Application state shared with handlers.
#[derive(Clone)]
pub struct AppState {
    /// Whether the bot finished startup and is sweeping.
    pub ready: Arc<AtomicBool>,
    /// Collections being swept.
    pub collections: Arc<Vec<String>>,
    /// Simulation mode flag.
    pub dry_run: bool,
    /// The sweep engine, source of stats and positions.
    pub sweeper: Arc<FloorSweeper>,
    /// Prometheus render handle.
    pub prometheus: PrometheusHandle,
}

impl AppState {
    /// Create new app state around a sweep engine.
    pub fn new(
        sweeper: Arc<FloorSweeper>,
        collections: Vec<String>,
        dry_run: bool,
        prometheus: PrometheusHandle,
    ) -> Self {
        Self {
            ready: Arc::new(AtomicBool::new(false)),
            collections: Arc::new(collections),
            dry_run,
            sweeper,
            prometheus,
        }
    }

    /// Set ready state.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Check if ready.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Status: "ok".
    pub status: &'static str,
}

/// Readiness check response.
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    /// Whether service is ready.
    pub ready: bool,
    /// Collections being swept.
    pub collections: Vec<String>,
}

/// Status response.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Service status.
    pub status: &'static str,
    /// Simulation mode flag.
    pub dry_run: bool,
    /// Collections being swept.
    pub collections: Vec<String>,
    /// Sweep statistics.
    pub stats: SweepStats,
    /// Open positions held by the sweeper.
    pub positions: Vec<Position>,
}

/// Health check handler - always returns 200.
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

/// Readiness check handler - returns 200 if ready, 503 otherwise.
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let is_ready = state.is_ready();

    let response = ReadyResponse {
        ready: is_ready,
        collections: state.collections.as_ref().clone(),
    };

    if is_ready {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

/// Status handler - returns sweep statistics and open positions.
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let status = if state.is_ready() { "running" } else { "starting" };

    Json(StatusResponse {
        status,
        dry_run: state.dry_run,
        collections: state.collections.as_ref().clone(),
        stats: state.sweeper.stats(),
        positions: state.sweeper.open_positions(),
    })
}

/// Prometheus metrics handler - renders the current registry.
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    state.prometheus.render()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ClientConfig, ReservoirClient};
    use crate::execution::ExecutionService;
    use crate::market::MarketDataService;
    use crate::sweep::SweepConfig;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn test_state() -> AppState {
        let client = Arc::new(ReservoirClient::new(ClientConfig::default()).unwrap());
        let sweeper = Arc::new(FloorSweeper::new(
            MarketDataService::new(client.clone()),
            ExecutionService::new(client, "0xwallet", true),
            SweepConfig {
                min_price_gap_percent: dec!(15),
                max_purchase_price: dec!(2.0),
                target_profit_percent: dec!(20),
                max_slippage_bps: 200,
                min_profit_after_gas: dec!(0.05),
                buy_gas_units: 250_000,
                list_gas_units: 150_000,
                gas_price_gwei: dec!(50),
                max_gas_price_gwei: dec!(100),
                max_positions_per_collection: 2,
                max_total_positions: 4,
                min_volume_24h: dec!(5),
                min_holder_count: 100,
                min_market_cap: dec!(100),
                max_holding_time: Duration::from_secs(24 * 3600),
                listings_limit: 20,
            },
        ));
        let prometheus = PrometheusBuilder::new().build_recorder().handle();
        AppState::new(sweeper, vec!["0xc0ffee".to_string()], true, prometheus)
    }

    #[test]
    fn app_state_ready_toggle() {
        let state = test_state();
        assert!(!state.is_ready());

        state.set_ready(true);
        assert!(state.is_ready());

        state.set_ready(false);
        assert!(!state.is_ready());
    }
}
