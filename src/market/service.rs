//! Typed market data reads for collections.
//!
//! Thin endpoint wrappers over [`ReservoirClient`]: each read picks its
//! cache TTL, maps the raw payload and drops entries that cannot be used.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument};

use crate::client::ReservoirClient;
use crate::error::ApiError;

use super::types::{
    CollectionHealth, CollectionStats, FloorToken, MarketTrend, OrderListing, RawCollection,
    RawCollectionsResponse, RawOrdersResponse, RawTokensResponse,
};

/// Cache TTL for order-book style reads (floor tokens, asks, bids).
const ORDER_BOOK_TTL: Duration = Duration::from_secs(60);

/// Cache TTL for aggregate collection reads (stats, trend, health).
const STATS_TTL: Duration = Duration::from_secs(300);

/// Read access to Reservoir market data.
#[derive(Debug, Clone)]
pub struct MarketDataService {
    client: Arc<ReservoirClient>,
}

impl MarketDataService {
    /// Create a service over a shared client.
    pub fn new(client: Arc<ReservoirClient>) -> Self {
        Self { client }
    }

    /// Tokens at the collection floor, sorted ascending by ask price.
    #[instrument(skip(self))]
    pub async fn floor_tokens(
        &self,
        collection: &str,
        limit: u32,
    ) -> Result<Vec<FloorToken>, ApiError> {
        let params = [
            ("collection", collection.to_string()),
            ("sortBy", "floorAskPrice".to_string()),
            ("limit", limit.to_string()),
        ];
        let response: RawTokensResponse = self
            .client
            .get_json("/tokens/v7", &params, Some(ORDER_BOOK_TTL))
            .await?;

        let mut tokens: Vec<FloorToken> = response
            .tokens
            .unwrap_or_default()
            .into_iter()
            .filter_map(FloorToken::from_entry)
            .collect();
        tokens.sort_by(|a, b| a.price.cmp(&b.price));

        debug!(collection = %collection, count = tokens.len(), "Fetched floor tokens");
        Ok(tokens)
    }

    /// Active asks for a collection, sorted ascending by price.
    #[instrument(skip(self))]
    pub async fn floor_listings(
        &self,
        collection: &str,
        limit: u32,
    ) -> Result<Vec<OrderListing>, ApiError> {
        let params = [
            ("contracts", collection.to_string()),
            ("sortBy", "price".to_string()),
            ("limit", limit.to_string()),
        ];
        let response: RawOrdersResponse = self
            .client
            .get_json("/orders/asks/v5", &params, Some(ORDER_BOOK_TTL))
            .await?;

        let mut listings: Vec<OrderListing> = response
            .orders
            .unwrap_or_default()
            .into_iter()
            .filter_map(OrderListing::from_order)
            .collect();
        listings.sort_by(|a, b| a.price.cmp(&b.price));

        debug!(collection = %collection, count = listings.len(), "Fetched floor listings");
        Ok(listings)
    }

    /// Active bids for a collection, sorted descending by price.
    #[instrument(skip(self))]
    pub async fn top_bids(
        &self,
        collection: &str,
        limit: u32,
    ) -> Result<Vec<OrderListing>, ApiError> {
        let params = [
            ("collection", collection.to_string()),
            ("sortBy", "price".to_string()),
            ("limit", limit.to_string()),
        ];
        let response: RawOrdersResponse = self
            .client
            .get_json("/orders/bids/v6", &params, Some(ORDER_BOOK_TTL))
            .await?;

        let mut bids: Vec<OrderListing> = response
            .orders
            .unwrap_or_default()
            .into_iter()
            .filter_map(OrderListing::from_order)
            .collect();
        bids.sort_by(|a, b| b.price.cmp(&a.price));

        debug!(collection = %collection, count = bids.len(), "Fetched top bids");
        Ok(bids)
    }

    /// Aggregate statistics for a collection.
    #[instrument(skip(self))]
    pub async fn collection_stats(&self, collection: &str) -> Result<CollectionStats, ApiError> {
        let raw = self.collection_payload(collection).await?;
        Ok(CollectionStats::from_collection(&raw, collection))
    }

    /// Short-term trading trend for a collection.
    #[instrument(skip(self))]
    pub async fn market_trend(&self, collection: &str) -> Result<MarketTrend, ApiError> {
        let raw = self.collection_payload(collection).await?;
        Ok(MarketTrend::from_collection(&raw))
    }

    /// Liquidity health snapshot for a collection.
    #[instrument(skip(self))]
    pub async fn collection_health(&self, collection: &str) -> Result<CollectionHealth, ApiError> {
        let raw = self.collection_payload(collection).await?;
        Ok(CollectionHealth::from_collection(&raw))
    }

    /// Fetch the raw collection payload. Trend and health map the same
    /// response, so repeated reads within the TTL share one cache entry.
    async fn collection_payload(&self, collection: &str) -> Result<RawCollection, ApiError> {
        let params = [("id", collection.to_string())];
        let response: RawCollectionsResponse = self
            .client
            .get_json("/collections/v7", &params, Some(STATS_TTL))
            .await?;

        response
            .collections
            .unwrap_or_default()
            .into_iter()
            .next()
            .ok_or_else(|| {
                ApiError::validation("collection", format!("collection {collection} not found"))
            })
    }
}
