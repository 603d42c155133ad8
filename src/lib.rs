//! Floor-sweep bot for Reservoir-listed NFT collections.
//!
//! The bot watches the cheapest listings in a collection and buys the floor
//! when the next listing sits far enough above it to relist at a profit:
//!
//! ```text
//! Floor ask:   1.00 ETH
//! Second ask:  1.50 ETH   (gap 50%)
//! ─────────────────────
//! Buy floor:   1.00 ETH
//! Relist at:   1.20 ETH   (target +20%)
//! Gas:         0.02 ETH
//! Profit:      0.18 ETH estimated
//! ```
//!
//! Purchases only happen when the collection is trending up and healthy and
//! the position caps have room; every remote call runs through a cached,
//! rate-limited, circuit-broken client.
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from environment
//! - [`error`]: Unified error types
//! - [`client`]: Resilient Reservoir API client
//! - [`market`]: Typed market data reads
//! - [`execution`]: Execute-call submission (buy, list, bid, cancel)
//! - [`sweep`]: Floor-sweep gates, engine and position ledger
//! - [`metrics`]: Prometheus metrics
//! - [`api`]: HTTP API for health/metrics
//! - [`utils`]: Utility functions

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod execution;
pub mod market;
pub mod metrics;
pub mod sweep;
pub mod utils;

pub use config::Config;
pub use error::{ApiError, BotError, Result};
