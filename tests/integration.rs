//! Integration tests for the Reservoir floor-sweep bot.
//!
//! The live tests require a valid RESERVOIR_API_KEY environment variable.
//! Run with: cargo test --test integration -- --ignored
//!
//! Note: the ignored tests interact with the real Reservoir API.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal_macros::dec;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use reservoir_sweep::client::{ClientConfig, ReservoirClient};
use reservoir_sweep::config::Config;
use reservoir_sweep::execution::ExecutionService;
use reservoir_sweep::market::MarketDataService;
use reservoir_sweep::sweep::{FloorSweeper, SweepConfig};

/// Bored Ape Yacht Club, a collection that is not going anywhere.
const LIVE_COLLECTION: &str = "0xbc4ca0eda7647a8ab7c2061c2e118a18a936f13d";

/// Get a test config from environment.
fn test_config() -> Option<Config> {
    // Try to load from environment
    dotenvy::dotenv().ok();

    let api_key = std::env::var("RESERVOIR_API_KEY").ok()?;

    // Skip if using placeholder key
    if api_key.len() < 8 || api_key.starts_with("demo") {
        return None;
    }

    Some(Config {
        reservoir_api_key: Some(api_key),
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
        rate_limit_per_minute: 60,
        collections: LIVE_COLLECTION.to_string(),
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
    })
}

/// Test that collection stats resolve for a live collection.
#[tokio::test]
#[ignore = "requires RESERVOIR_API_KEY"]
async fn live_collection_stats() {
    let config = match test_config() {
        Some(c) => c,
        None => {
            println!("Skipping: RESERVOIR_API_KEY not set or placeholder");
            return;
        }
    };

    let client = Arc::new(ReservoirClient::from_config(&config).unwrap());
    let market = MarketDataService::new(client);

    let result = market.collection_stats(LIVE_COLLECTION).await;
    assert!(result.is_ok(), "Failed to fetch stats: {:?}", result.err());

    let stats = result.unwrap();
    assert!(stats.token_count > 0, "Collection should have tokens");

    println!("Collection: {}", stats.name.as_deref().unwrap_or("?"));
    println!("  Tokens: {} ({} on sale)", stats.token_count, stats.on_sale_count);
    println!("  Owners: {}", stats.owner_count);
    if let Some(floor) = stats.floor_price {
        println!("  Floor: {} ETH", floor);
    }
}

/// Test that the ask snapshot comes back sorted by price.
#[tokio::test]
#[ignore = "requires RESERVOIR_API_KEY"]
async fn live_floor_listings_sorted() {
    let config = match test_config() {
        Some(c) => c,
        None => {
            println!("Skipping: RESERVOIR_API_KEY not set or placeholder");
            return;
        }
    };

    let client = Arc::new(ReservoirClient::from_config(&config).unwrap());
    let market = MarketDataService::new(client);

    let result = market.floor_listings(LIVE_COLLECTION, 10).await;
    assert!(result.is_ok(), "Failed to fetch asks: {:?}", result.err());

    let listings = result.unwrap();
    println!("Found {} priced listings", listings.len());
    for listing in listings.iter().take(3) {
        println!("  Token {} at {} ETH", listing.token_id, listing.price);
    }

    assert!(
        listings.windows(2).all(|w| w[0].price <= w[1].price),
        "Listings should be sorted ascending"
    );
}

/// Test trend and health reads against a live collection.
#[tokio::test]
#[ignore = "requires RESERVOIR_API_KEY"]
async fn live_trend_and_health() {
    let config = match test_config() {
        Some(c) => c,
        None => {
            println!("Skipping: RESERVOIR_API_KEY not set or placeholder");
            return;
        }
    };

    let client = Arc::new(ReservoirClient::from_config(&config).unwrap());
    let market = MarketDataService::new(client);

    let trend = market.market_trend(LIVE_COLLECTION).await;
    assert!(trend.is_ok(), "Failed to fetch trend: {:?}", trend.err());

    let health = market.collection_health(LIVE_COLLECTION).await;
    assert!(health.is_ok(), "Failed to fetch health: {:?}", health.err());

    let trend = trend.unwrap();
    let health = health.unwrap();
    println!("Uptrend: {}", trend.uptrend());
    println!("Healthy: {}", health.healthy());
    println!("Active listings: {}", health.active_listings);
}

/// Full sweep pipeline against a mocked Reservoir, exercised through the
/// public API only.
#[tokio::test]
async fn sweep_pipeline_end_to_end() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/collections/v7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "collections": [{
                "id": "0xc0ffee",
                "name": "Coffee Club",
                "tokenCount": "10000",
                "onSaleCount": "300",
                "ownerCount": 5000,
                "floorAsk": { "price": { "amount": { "native": 1.0 } } },
                "volume": { "1day": 12.5, "7day": 80.0 },
                "volumeChange": { "1day": 0.12, "7day": 0.3 }
            }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/orders/asks/v5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "orders": [
                {
                    "id": "order-5",
                    "tokenSetId": "token:0xc0ffee:5",
                    "price": { "amount": { "native": 1.0 } },
                    "criteria": { "data": { "token": { "tokenId": "5" } } }
                },
                {
                    "id": "order-6",
                    "tokenSetId": "token:0xc0ffee:6",
                    "price": { "amount": { "native": 1.5 } },
                    "criteria": { "data": { "token": { "tokenId": "6" } } }
                }
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/execute/buy/v7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "steps": [],
            "path": [{ "orderId": "order-5", "tokenId": "5", "quote": 1.0 }]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/execute/list/v5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "steps": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let client = Arc::new(
        ReservoirClient::new(
            ClientConfig::default()
                .with_base_url(server.uri())
                .with_max_retries(1)
                .with_base_delay(Duration::from_millis(1))
                .with_jitter(false)
                .with_rate_limit_per_minute(0),
        )
        .unwrap(),
    );
    let sweeper = FloorSweeper::new(
        MarketDataService::new(client.clone()),
        ExecutionService::new(client, "0x1111111111111111111111111111111111111111", false),
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
    );

    let result = sweeper.sweep_floor("0xc0ffee").await;

    assert!(result.purchased, "sweep should buy: {:?}", result.error);
    assert!(result.listed);
    assert_eq!(result.token_id.as_deref(), Some("5"));
    assert_eq!(result.purchase_price, dec!(1.0));
    assert_eq!(result.list_price, dec!(1.2));
    assert_eq!(result.estimated_profit, dec!(0.18));

    let stats = sweeper.stats();
    assert_eq!(stats.sweeps_attempted, 1);
    assert_eq!(stats.purchases, 1);
    assert_eq!(stats.listings_created, 1);
    assert_eq!(sweeper.position_count(), 1);
}
