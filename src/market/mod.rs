//! Market data for NFT collections.
//!
//! This module handles:
//! - Typed Reservoir payloads and their clean domain types
//! - Floor, ask and bid snapshots
//! - Collection statistics, trend and health reads

pub mod service;
pub mod types;

pub use service::MarketDataService;
pub use types::{CollectionHealth, CollectionStats, FloorToken, MarketTrend, OrderListing};
