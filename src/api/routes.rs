//! HTTP API route definitions.

use axum::{routing::get, Router};

use super::handlers::{health, metrics, ready, status, AppState};

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(health))
        .route("/ready", get(ready))
        // Status endpoint
        .route("/api/v1/status", get(status))
        // Prometheus scrape endpoint
        .route("/metrics", get(metrics))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ClientConfig, ReservoirClient};
    use crate::execution::ExecutionService;
    use crate::market::MarketDataService;
    use crate::sweep::{FloorSweeper, SweepConfig};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

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

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let app = create_router(test_state());

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn ready_endpoint_returns_503_when_not_ready() {
        let app = create_router(test_state());

        let response = app
            .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn ready_endpoint_returns_200_when_ready() {
        let state = test_state();
        state.set_ready(true);
        let app = create_router(state);

        let response = app
            .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn status_endpoint_reports_stats_and_mode() {
        let app = create_router(test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(body["status"], "starting");
        assert_eq!(body["dry_run"], true);
        assert_eq!(body["collections"][0], "0xc0ffee");
        assert_eq!(body["stats"]["sweeps_attempted"], 0);
        assert!(body["positions"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn metrics_endpoint_renders() {
        let app = create_router(test_state());

        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
