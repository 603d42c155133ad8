//! Open-position ledger.
//!
//! Positions are held in memory only; a restart starts the book empty.

use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use time::OffsetDateTime;

/// A floor token bought by the sweeper and relisted for profit.
#[derive(Debug, Clone, Serialize)]
pub struct Position {
    /// Token that was bought.
    pub token_id: String,
    /// Collection the token belongs to.
    pub collection: String,
    /// Price paid, in ETH.
    pub purchase_price: Decimal,
    /// Price the token was relisted at, in ETH.
    pub list_price: Decimal,
    /// When the purchase completed.
    #[serde(with = "time::serde::timestamp")]
    pub purchase_time: OffsetDateTime,
    /// Estimated gas spent on the round trip, in ETH.
    pub gas_used: Decimal,
}

impl Position {
    /// Time since the purchase completed.
    pub fn age(&self) -> Duration {
        let elapsed = OffsetDateTime::now_utc() - self.purchase_time;
        Duration::try_from(elapsed).unwrap_or(Duration::ZERO)
    }
}

/// Open positions grouped by collection.
#[derive(Debug, Default)]
pub struct PositionBook {
    positions: Mutex<HashMap<String, Vec<Position>>>,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a freshly bought position to the book.
    pub fn record(&self, position: Position) {
        let mut positions = self.positions.lock();
        positions
            .entry(position.collection.clone())
            .or_default()
            .push(position);
    }

    /// Drop positions older than `max_age` and return them.
    pub fn evict_stale(&self, max_age: Duration) -> Vec<Position> {
        let mut positions = self.positions.lock();
        let mut evicted = Vec::new();
        positions.retain(|_, entries| {
            entries.retain(|position| {
                if position.age() >= max_age {
                    evicted.push(position.clone());
                    false
                } else {
                    true
                }
            });
            !entries.is_empty()
        });
        evicted
    }

    /// Open positions in one collection.
    pub fn count_for(&self, collection: &str) -> usize {
        self.positions
            .lock()
            .get(collection)
            .map_or(0, |entries| entries.len())
    }

    /// Open positions across all collections.
    pub fn total(&self) -> usize {
        self.positions.lock().values().map(|entries| entries.len()).sum()
    }

    /// Whether a new position in `collection` would stay inside both caps.
    pub fn within_limits(&self, collection: &str, per_collection: usize, total: usize) -> bool {
        let positions = self.positions.lock();
        let in_collection = positions.get(collection).map_or(0, |entries| entries.len());
        let overall: usize = positions.values().map(|entries| entries.len()).sum();
        in_collection < per_collection && overall < total
    }

    /// Snapshot of every open position.
    pub fn snapshot(&self) -> Vec<Position> {
        self.positions.lock().values().flatten().cloned().collect()
    }
}
