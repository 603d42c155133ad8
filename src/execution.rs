//! Order execution against the Reservoir execute endpoints.
//!
//! Every verb here is a POST through [`ReservoirClient::post_execute`]:
//! uncached, never auto-retried. Dry-run mode short-circuits before the
//! network with a simulated outcome.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use time::OffsetDateTime;
use tracing::{debug, info, instrument};

use crate::client::ReservoirClient;
use crate::error::ApiError;
use crate::metrics;

/// How long a created listing stays valid.
pub const DEFAULT_LISTING_LIFETIME: Duration = Duration::from_secs(30 * 24 * 3600);

/// Order kind submitted for listings and bids.
const ORDER_KIND: &str = "seaport-v1.5";

/// Orderbook listings and bids are posted to.
const ORDERBOOK: &str = "reservoir";

/// Response body shared by the execute endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteResponse {
    /// Transaction/signature steps the taker must perform.
    pub steps: Option<Vec<ExecuteStep>>,
    /// Fill path with per-item quotes (buy/sell only).
    pub path: Option<Vec<PathItem>>,
    /// Error message if any.
    pub error: Option<String>,
    /// Error detail if any.
    pub message: Option<String>,
}

impl ExecuteResponse {
    /// Error text carried in an otherwise-successful response.
    fn error_text(&self) -> Option<&str> {
        self.error.as_deref().or(self.message.as_deref())
    }

    /// Empty response standing in for a call skipped in dry-run mode.
    fn simulated() -> Self {
        Self {
            steps: None,
            path: None,
            error: None,
            message: None,
        }
    }
}

/// Single step of an execute response.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteStep {
    /// Step id (e.g., "sale", "order-signature").
    pub id: Option<String>,
    /// Human-readable action.
    pub action: Option<String>,
    /// Step kind ("transaction" or "signature").
    pub kind: Option<String>,
}

/// Per-item entry of the fill path.
#[derive(Debug, Clone, Deserialize)]
pub struct PathItem {
    /// Order id being filled (various field names).
    #[serde(alias = "orderId", alias = "orderID", alias = "order_id")]
    pub order_id: Option<String>,
    /// Token id being filled.
    #[serde(rename = "tokenId")]
    pub token_id: Option<String>,
    /// Collection contract address.
    pub contract: Option<String>,
    /// Quoted fill price in the native currency.
    pub quote: Option<Decimal>,
    /// Quoted fill price as a smallest-unit integer string.
    #[serde(rename = "rawQuote")]
    pub raw_quote: Option<String>,
}

impl PathItem {
    /// Quoted fill price, falling back to the raw smallest-unit quote.
    pub fn filled_price(&self) -> Option<Decimal> {
        self.quote.or_else(|| {
            let wei: Decimal = self.raw_quote.as_deref()?.trim().parse().ok()?;
            Some(wei / Decimal::from(1_000_000_000_000_000_000_u64))
        })
    }
}

/// Outcome of a floor purchase.
#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseOutcome {
    /// Token that was bought.
    pub token_id: String,
    /// Filled order id, when the API reports one.
    pub order_id: Option<String>,
    /// Actual fill price (expected price when the API omits a quote).
    pub price: Decimal,
    /// Whether this outcome was simulated in dry-run mode.
    pub simulated: bool,
}

/// Outcome of creating a listing.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingOutcome {
    /// Token that was listed.
    pub token_id: String,
    /// Submitted price as a wei integer string.
    pub wei_price: String,
    /// Unix timestamp the listing expires.
    pub expires_at: i64,
    /// Whether this outcome was simulated in dry-run mode.
    pub simulated: bool,
}

/// Write access to the Reservoir execute endpoints.
#[derive(Debug, Clone)]
pub struct ExecutionService {
    /// Shared resilient client.
    client: Arc<ReservoirClient>,
    /// Wallet used as taker/maker.
    wallet: String,
    /// Simulate instead of submitting real orders.
    dry_run: bool,
}

impl ExecutionService {
    /// Create a service submitting as `wallet`.
    pub fn new(client: Arc<ReservoirClient>, wallet: impl Into<String>, dry_run: bool) -> Self {
        Self {
            client,
            wallet: wallet.into(),
            dry_run,
        }
    }

    /// Whether the service is simulating.
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Buy a single token at the floor. Returns the actual fill price read
    /// back from the response path.
    #[instrument(skip(self, expected_price), fields(price = %expected_price))]
    pub async fn buy_token(
        &self,
        collection: &str,
        token_id: &str,
        expected_price: Decimal,
    ) -> Result<PurchaseOutcome, ApiError> {
        if self.dry_run {
            info!(
                collection = %collection,
                token_id = %token_id,
                price = %expected_price,
                "DRY RUN: simulating floor purchase"
            );
            return Ok(PurchaseOutcome {
                token_id: token_id.to_string(),
                order_id: None,
                price: expected_price,
                simulated: true,
            });
        }

        let body = json!({
            "items": [{ "token": format!("{collection}:{token_id}"), "quantity": 1 }],
            "taker": self.wallet,
        });
        let response = self.execute("buy", "/execute/buy/v7", &body).await?;

        let path_item = response
            .path
            .as_ref()
            .and_then(|path| path.iter().find(|item| item.filled_price().is_some()));
        let price = path_item
            .and_then(PathItem::filled_price)
            .unwrap_or(expected_price);
        let order_id = path_item.and_then(|item| item.order_id.clone());

        info!(
            collection = %collection,
            token_id = %token_id,
            expected = %expected_price,
            filled = %price,
            "Floor purchase submitted"
        );

        Ok(PurchaseOutcome {
            token_id: token_id.to_string(),
            order_id,
            price,
            simulated: false,
        })
    }

    /// List a token for sale at `price` (native units).
    #[instrument(skip(self, price), fields(price = %price))]
    pub async fn list_token(
        &self,
        collection: &str,
        token_id: &str,
        price: Decimal,
    ) -> Result<ListingOutcome, ApiError> {
        let wei_price = to_wei_string(price);
        let expires_at =
            OffsetDateTime::now_utc().unix_timestamp() + DEFAULT_LISTING_LIFETIME.as_secs() as i64;

        if self.dry_run {
            info!(
                collection = %collection,
                token_id = %token_id,
                price = %price,
                "DRY RUN: simulating listing"
            );
            return Ok(ListingOutcome {
                token_id: token_id.to_string(),
                wei_price,
                expires_at,
                simulated: true,
            });
        }

        let body = json!({
            "maker": self.wallet,
            "params": [{
                "token": format!("{collection}:{token_id}"),
                "weiPrice": wei_price.clone(),
                "orderKind": ORDER_KIND,
                "orderbook": ORDERBOOK,
                "expirationTime": expires_at.to_string(),
            }],
        });
        self.execute("list", "/execute/list/v5", &body).await?;

        info!(
            collection = %collection,
            token_id = %token_id,
            price = %price,
            expires_at = expires_at,
            "Listing submitted"
        );

        Ok(ListingOutcome {
            token_id: token_id.to_string(),
            wei_price,
            expires_at,
            simulated: false,
        })
    }

    /// Sell a token into the best bid.
    #[instrument(skip(self))]
    pub async fn sell_token(
        &self,
        collection: &str,
        token_id: &str,
    ) -> Result<ExecuteResponse, ApiError> {
        let body = json!({
            "items": [{ "token": format!("{collection}:{token_id}"), "quantity": 1 }],
            "taker": self.wallet,
        });
        self.execute("sell", "/execute/sell/v7", &body).await
    }

    /// Cancel open orders by id.
    #[instrument(skip(self, order_ids), fields(count = order_ids.len()))]
    pub async fn cancel_orders(&self, order_ids: &[String]) -> Result<ExecuteResponse, ApiError> {
        let body = json!({
            "orderIds": order_ids,
            "maker": self.wallet,
        });
        self.execute("cancel", "/execute/cancel/v3", &body).await
    }

    /// Place a collection or token bid at `price` (native units).
    #[instrument(skip(self, price), fields(price = %price))]
    pub async fn place_bid(
        &self,
        collection: &str,
        token_id: Option<&str>,
        price: Decimal,
    ) -> Result<ExecuteResponse, ApiError> {
        let target = match token_id {
            Some(id) => json!({ "token": format!("{collection}:{id}") }),
            None => json!({ "collection": collection }),
        };
        let mut params = target;
        params["weiPrice"] = json!(to_wei_string(price));
        params["orderKind"] = json!(ORDER_KIND);
        params["orderbook"] = json!(ORDERBOOK);

        let body = json!({
            "maker": self.wallet,
            "params": [params],
        });
        self.execute("bid", "/execute/bid/v5", &body).await
    }

    /// Mint from a collection's active mint stages.
    #[instrument(skip(self))]
    pub async fn mint(&self, collection: &str, quantity: u32) -> Result<ExecuteResponse, ApiError> {
        let body = json!({
            "collection": collection,
            "quantity": quantity,
            "taker": self.wallet,
        });
        self.execute("mint", "/execute/mint/v1", &body).await
    }

    /// Submit one execute call and surface response-body errors.
    ///
    /// Every verb funnels through here, so this is the one place dry-run
    /// mode is enforced: simulated calls never reach the network and never
    /// count toward execute metrics.
    async fn execute(
        &self,
        verb: &str,
        endpoint: &str,
        body: &serde_json::Value,
    ) -> Result<ExecuteResponse, ApiError> {
        if self.dry_run {
            info!(verb = %verb, endpoint = %endpoint, "DRY RUN: skipping execute call");
            return Ok(ExecuteResponse::simulated());
        }

        debug!(verb = %verb, endpoint = %endpoint, "Submitting execute call");

        let start = Instant::now();
        let result = self
            .client
            .post_execute::<ExecuteResponse>(endpoint, body)
            .await;
        metrics::record_execute_call(verb, start, result.is_ok());

        let response = result?;
        if let Some(error) = response.error_text() {
            return Err(ApiError::unknown(error));
        }
        Ok(response)
    }
}

/// Convert a native-unit price to a wei integer string, truncating any
/// sub-wei fraction.
pub fn to_wei_string(price: Decimal) -> String {
    (price * Decimal::from(1_000_000_000_000_000_000_u64))
        .trunc()
        .normalize()
        .to_string()
}
