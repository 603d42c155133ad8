//! Reservoir floor-sweep bot entry point.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reservoir_sweep::api::{create_router, AppState};
use reservoir_sweep::client::ReservoirClient;
use reservoir_sweep::config::Config;
use reservoir_sweep::execution::ExecutionService;
use reservoir_sweep::market::MarketDataService;
use reservoir_sweep::metrics;
use reservoir_sweep::sweep::{FloorSweeper, SweepConfig};
use reservoir_sweep::utils::shutdown_signal;

/// Reservoir floor-sweep bot.
#[derive(Parser, Debug)]
#[command(name = "reservoir-sweep")]
#[command(about = "Floor-sweep bot for Reservoir-listed NFT collections")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Command>,

    /// Run in dry-run mode (no real execute calls).
    #[arg(long)]
    dry_run: Option<bool>,

    /// HTTP server port for health/metrics.
    #[arg(short, long)]
    port: Option<u16>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the continuous sweep loop (default).
    Run {
        /// Run in dry-run mode (no real execute calls).
        #[arg(long)]
        dry_run: Option<bool>,

        /// HTTP server port for health/metrics.
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Check configuration validity.
    CheckConfig,

    /// Fetch stats, trend, asks and bids for one collection.
    CheckCollection {
        /// Collection contract address.
        #[arg(long)]
        collection: String,
    },

    /// Run one sweep against a collection and print the result.
    SweepOnce {
        /// Collection contract address.
        #[arg(long)]
        collection: String,

        /// Run in dry-run mode (no real execute calls).
        #[arg(long)]
        dry_run: Option<bool>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Read .env before the log filter so RUST_LOG from the file applies
    dotenvy::dotenv().ok();

    // Initialize logging
    let filter = if args.verbose {
        EnvFilter::new("reservoir_sweep=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    if args.log_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }

    // Handle subcommands
    match args.command {
        Some(Command::CheckConfig) => cmd_check_config().await,
        Some(Command::CheckCollection { collection }) => cmd_check_collection(&collection).await,
        Some(Command::SweepOnce {
            collection,
            dry_run,
        }) => cmd_sweep_once(&collection, dry_run).await,
        Some(Command::Run { dry_run, port }) => cmd_run(dry_run, port).await,
        None => cmd_run(args.dry_run, args.port).await,
    }
}

/// Build the sweep engine from an app config.
fn build_sweeper(config: &Config) -> anyhow::Result<Arc<FloorSweeper>> {
    let client = Arc::new(ReservoirClient::from_config(config)?);
    let market = MarketDataService::new(client.clone());
    let execution = ExecutionService::new(client, config.wallet_address.clone(), config.dry_run);
    Ok(Arc::new(FloorSweeper::new(
        market,
        execution,
        SweepConfig::from(config),
    )))
}

/// Check configuration validity.
async fn cmd_check_config() -> anyhow::Result<()> {
    println!("======================================================================");
    println!("RESERVOIR SWEEP BOT - CONFIGURATION CHECK");
    println!("======================================================================");

    // Load configuration
    print!("Loading configuration... ");
    let config = match Config::load() {
        Ok(c) => {
            println!("OK");
            c
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration load failed"));
        }
    };

    // Validate configuration
    print!("Validating configuration... ");
    match config.validate() {
        Ok(()) => println!("OK"),
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration validation failed"));
        }
    }

    let collections = config.collection_list();

    // Show configuration summary
    println!("----------------------------------------------------------------------");
    println!("Configuration Summary:");
    println!("  Base URL: {}", config.reservoir_base_url);
    println!("  API Key: {}", config.redacted_api_key());
    println!("  Wallet: {}", config.wallet_address);
    println!("  Collections: {}", collections.len());
    for collection in &collections {
        println!("    - {}", collection);
    }
    if collections.is_empty() {
        println!("  WARNING: COLLECTIONS is empty; `run` will have nothing to sweep");
    }
    println!("  Min Price Gap: {}%", config.min_price_gap_percent);
    println!("  Max Purchase Price: {} ETH", config.max_purchase_price);
    println!("  Target Profit: {}%", config.target_profit_percent);
    println!("  Min Profit After Gas: {} ETH", config.min_profit_after_gas);
    println!(
        "  Gas Price: {} gwei (ceiling {} gwei)",
        config.gas_price_gwei, config.max_gas_price_gwei
    );
    println!(
        "  Position Caps: {} per collection, {} total",
        config.max_positions_per_collection, config.max_total_positions
    );
    println!("  Sweep Interval: {}s", config.sweep_interval_secs);
    println!("  Dry Run: {}", config.dry_run);
    println!("======================================================================");
    println!("CONFIGURATION CHECK PASSED");
    println!("======================================================================");

    Ok(())
}

/// Fetch stats, trend, asks and bids for one collection.
async fn cmd_check_collection(collection: &str) -> anyhow::Result<()> {
    println!("======================================================================");
    println!("RESERVOIR SWEEP BOT - COLLECTION CHECK");
    println!("======================================================================");

    let config = Config::load()?;
    config.validate().map_err(|e| anyhow::anyhow!(e))?;

    println!("Base URL: {}", config.reservoir_base_url);
    println!("API Key: {}", config.redacted_api_key());
    println!("Collection: {}", collection);
    println!("======================================================================");

    // Create client
    print!("\n1. Creating client... ");
    let client = Arc::new(ReservoirClient::from_config(&config)?);
    println!("OK");
    let market = MarketDataService::new(client);

    // Collection stats
    print!("\n2. Fetching collection stats... ");
    match market.collection_stats(collection).await {
        Ok(stats) => {
            println!("OK");
            println!("   Name: {}", stats.name.as_deref().unwrap_or(collection));
            println!(
                "   Tokens: {} ({} on sale)",
                stats.token_count, stats.on_sale_count
            );
            println!("   Owners: {}", stats.owner_count);
            match stats.floor_price {
                Some(floor) => println!("   Floor: {} ETH", floor),
                None => println!("   Floor: none"),
            }
            println!(
                "   Volume: {} ETH (24h) / {} ETH (7d)",
                stats.volume_24h, stats.volume_7d
            );
            println!("   Market Cap: {} ETH", stats.market_cap);
        }
        Err(e) => {
            println!("FAILED");
            println!("   Error: {}", e);
            return Err(anyhow::anyhow!("Collection stats fetch failed"));
        }
    }

    // Trend and health
    print!("\n3. Fetching trend and health... ");
    match tokio::try_join!(
        market.market_trend(collection),
        market.collection_health(collection)
    ) {
        Ok((trend, health)) => {
            println!("OK");
            println!("   Uptrend: {}", trend.uptrend());
            println!(
                "   Volume change: {} (24h) / {} (7d)",
                trend.volume_change_24h, trend.volume_change_7d
            );
            println!("   Healthy: {}", health.healthy());
            println!("   Active listings: {}", health.active_listings);
        }
        Err(e) => {
            println!("FAILED");
            println!("   Error: {}", e);
        }
    }

    // Top asks
    print!("\n4. Fetching top asks... ");
    let mut best_ask = None;
    match market.floor_listings(collection, config.listings_limit).await {
        Ok(listings) => {
            println!("OK");
            println!("   Priced listings: {}", listings.len());
            best_ask = listings.first().map(|l| l.price);
            for listing in listings.iter().take(5) {
                let source = listing
                    .source
                    .as_deref()
                    .map(|s| format!(" ({s})"))
                    .unwrap_or_default();
                println!(
                    "   - Token {} at {} ETH{}",
                    listing.token_id, listing.price, source
                );
            }
            if listings.len() > 5 {
                println!("   ... and {} more", listings.len() - 5);
            }
        }
        Err(e) => {
            println!("FAILED");
            println!("   Error: {}", e);
        }
    }

    // Top bids
    print!("\n5. Fetching top bids... ");
    match market.top_bids(collection, config.batch_size).await {
        Ok(bids) => {
            println!("OK");
            println!("   Priced bids: {}", bids.len());
            for bid in bids.iter().take(5) {
                println!("   - Token {} bid at {} ETH", bid.token_id, bid.price);
            }
            if let (Some(ask), Some(bid)) = (best_ask, bids.first().map(|b| b.price)) {
                println!("   Spread: {} ETH (best ask {}, best bid {})", ask - bid, ask, bid);
            }
        }
        Err(e) => {
            println!("FAILED");
            println!("   Error: {}", e);
        }
    }

    println!("\n======================================================================");
    println!("COLLECTION CHECK COMPLETED");
    println!("======================================================================");

    Ok(())
}

/// Run one sweep and print the result as JSON.
async fn cmd_sweep_once(collection: &str, dry_run_override: Option<bool>) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if let Some(dry_run) = dry_run_override {
        config.dry_run = dry_run;
    }
    config.validate().map_err(|e| anyhow::anyhow!(e))?;

    info!(
        "Mode: {}",
        if config.dry_run { "DRY RUN" } else { "LIVE" }
    );

    let sweeper = build_sweeper(&config)?;
    let result = sweeper.sweep_floor(collection).await;

    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(())
}

/// Run the continuous sweep loop with the API server alongside.
async fn cmd_run(dry_run_override: Option<bool>, port_override: Option<u16>) -> anyhow::Result<()> {
    // Load configuration
    info!("Loading configuration...");
    let mut config = Config::load().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    // Override with CLI args if provided
    if let Some(dry_run) = dry_run_override {
        config.dry_run = dry_run;
    }
    if let Some(port) = port_override {
        config.api_port = port;
    }

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Err(anyhow::anyhow!("Configuration validation failed: {}", e));
    }

    let collections = config.collection_list();
    if collections.is_empty() {
        return Err(anyhow::anyhow!("COLLECTIONS is empty; nothing to sweep"));
    }

    info!("Configuration loaded successfully");
    info!(
        "Mode: {}",
        if config.dry_run { "DRY RUN" } else { "LIVE" }
    );

    // The recorder must be installed before any metric is recorded
    let prometheus = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("failed to install metrics recorder: {e}"))?;
    metrics::init_metrics();

    // Create the sweep engine and app state
    let sweeper = build_sweeper(&config)?;
    let app_state = AppState::new(
        sweeper.clone(),
        collections.clone(),
        config.dry_run,
        prometheus,
    );

    // Start HTTP server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.api_port));
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);

    let router = create_router(app_state.clone());

    // Spawn HTTP server
    let _server_handle = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
    });

    info!("========================================");
    info!("RESERVOIR FLOOR SWEEP BOT STARTED");
    info!("========================================");
    for collection in &collections {
        info!("Collection: {}", collection);
    }
    info!(
        "Mode: {}",
        if config.dry_run { "DRY RUN" } else { "LIVE" }
    );
    info!("Gap threshold: {}%", config.min_price_gap_percent);
    info!("Target profit: {}%", config.target_profit_percent);
    info!("Sweep interval: {}s", config.sweep_interval_secs);
    info!("========================================");

    app_state.set_ready(true);

    // Main sweep loop
    let mut interval =
        tokio::time::interval(Duration::from_secs(config.sweep_interval_secs.max(1)));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let mut round = 0u64;
    loop {
        tokio::select! {
            _ = interval.tick() => {
                round += 1;
                let results = sweeper.sweep_all(&collections).await;

                for result in &results {
                    if result.purchased {
                        info!(
                            "[Round #{}] {}: bought token {} at {} ETH, relisted at {} ETH",
                            round,
                            result.collection,
                            result.token_id.as_deref().unwrap_or("?"),
                            result.purchase_price,
                            result.list_price
                        );
                    } else if let Some(reason) = result.error.as_deref() {
                        info!("[Round #{}] {}: {}", round, result.collection, reason);
                    }
                }

                let stats = sweeper.stats();
                info!(
                    "[Round #{}] Totals: {} purchases, {} listings, {} ETH spent, {} ETH estimated profit",
                    round,
                    stats.purchases,
                    stats.listings_created,
                    stats.total_spent,
                    stats.total_estimated_profit
                );
            }
            _ = &mut shutdown => {
                break;
            }
        }
    }

    // Shutdown - print summary
    app_state.set_ready(false);

    let stats = sweeper.stats();
    info!("========================================");
    info!("SHUTDOWN - FINAL SUMMARY");
    info!("========================================");
    info!("Sweeps attempted: {}", stats.sweeps_attempted);
    info!("Purchases: {}", stats.purchases);
    info!("Listings created: {}", stats.listings_created);
    info!("Rejections: {}", stats.rejections);
    info!("Positions evicted: {}", stats.positions_evicted);
    info!("----------------------------------------");
    info!("Total spent: {} ETH", stats.total_spent);
    info!("Estimated profit: {} ETH", stats.total_estimated_profit);
    info!("Open positions: {}", sweeper.position_count());
    info!("========================================");

    Ok(())
}
