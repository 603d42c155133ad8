//! Reservoir market data types.
//!
//! Raw `Raw*` structs mirror the wire format with optional fields; the
//! clean types are what the rest of the bot consumes. Conversions drop
//! entries that lack a token id or a usable price.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single active listing (ask) for a token.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderListing {
    /// Order id on the marketplace, when reported.
    pub order_id: Option<String>,
    /// Token id within the collection.
    pub token_id: String,
    /// Listing price in the native currency (ETH).
    pub price: Decimal,
    /// USD equivalent, when reported.
    pub price_usd: Option<Decimal>,
    /// Maker wallet address.
    pub maker: Option<String>,
    /// Unix timestamp the listing became valid.
    pub valid_from: Option<i64>,
    /// Unix timestamp the listing expires.
    pub valid_until: Option<i64>,
    /// Marketplace the listing originates from (e.g., "opensea.io").
    pub source: Option<String>,
}

impl OrderListing {
    /// Convert a raw order, requiring a token id and a price.
    pub fn from_order(order: RawOrder) -> Option<Self> {
        let token_id = order.resolved_token_id()?;
        let price = order.price.as_ref().and_then(RawPrice::native)?;
        let price_usd = order.price.as_ref().and_then(RawPrice::usd);

        Some(Self {
            order_id: order.id,
            token_id,
            price,
            price_usd,
            maker: order.maker,
            valid_from: order.valid_from,
            valid_until: order.valid_until,
            source: order.source.and_then(|s| s.label()),
        })
    }
}

/// A token sitting at or near the collection floor.
#[derive(Debug, Clone, PartialEq)]
pub struct FloorToken {
    /// Token id within the collection.
    pub token_id: String,
    /// Collection contract address.
    pub contract: Option<String>,
    /// Token name, when reported.
    pub name: Option<String>,
    /// Current floor ask price in ETH.
    pub price: Decimal,
    /// Marketplace carrying the floor ask.
    pub source: Option<String>,
}

impl FloorToken {
    /// Convert a raw `/tokens` entry, requiring a token id and a floor ask.
    pub fn from_entry(entry: RawTokenEntry) -> Option<Self> {
        let info = entry.token?;
        let token_id = info.token_id?;
        let floor = entry.market.and_then(|m| m.floor_ask)?;
        let price = floor.price.as_ref().and_then(RawPrice::native)?;

        Some(Self {
            token_id,
            contract: info.contract,
            name: info.name,
            price,
            source: floor.source.and_then(|s| s.label()),
        })
    }
}

/// Aggregate collection statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionStats {
    /// Collection contract address.
    pub id: String,
    /// Collection display name.
    pub name: Option<String>,
    /// Total tokens in the collection.
    pub token_count: u64,
    /// Tokens currently listed for sale.
    pub on_sale_count: u64,
    /// Distinct holder count.
    pub owner_count: u64,
    /// Current floor ask in ETH.
    pub floor_price: Option<Decimal>,
    /// Volume over the last 24 hours, in ETH.
    pub volume_24h: Decimal,
    /// Volume over the last 7 days, in ETH.
    pub volume_7d: Decimal,
    /// Market-cap proxy: floor price times token count.
    pub market_cap: Decimal,
}

impl CollectionStats {
    /// Map a raw collection payload; `collection` fills in the id when the
    /// API omits one.
    pub fn from_collection(raw: &RawCollection, collection: &str) -> Self {
        let floor_price = raw.floor_native();
        let token_count = raw.token_count.unwrap_or(0);

        Self {
            id: raw.id.clone().unwrap_or_else(|| collection.to_string()),
            name: raw.name.clone(),
            token_count,
            on_sale_count: raw.on_sale_count.unwrap_or(0),
            owner_count: raw.owner_count.unwrap_or(0),
            floor_price,
            volume_24h: raw.volume_one_day(),
            volume_7d: raw.volume_seven_day(),
            market_cap: market_cap(floor_price, token_count),
        }
    }
}

/// Short-term trading trend for a collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketTrend {
    /// Volume over the last 24 hours, in ETH.
    pub volume_24h: Decimal,
    /// 24-hour volume change (positive means growing).
    pub volume_change_24h: Decimal,
    /// 7-day volume change.
    pub volume_change_7d: Decimal,
    /// Tokens currently listed for sale.
    pub active_listings: u64,
    /// Floor ask price, the payload's only listing price signal.
    pub average_listing_price: Decimal,
}

impl MarketTrend {
    /// Map a raw collection payload.
    pub fn from_collection(raw: &RawCollection) -> Self {
        Self {
            volume_24h: raw.volume_one_day(),
            volume_change_24h: raw
                .volume_change
                .as_ref()
                .and_then(|v| v.one_day)
                .unwrap_or(Decimal::ZERO),
            volume_change_7d: raw
                .volume_change
                .as_ref()
                .and_then(|v| v.seven_day)
                .unwrap_or(Decimal::ZERO),
            active_listings: raw.on_sale_count.unwrap_or(0),
            average_listing_price: raw.floor_native().unwrap_or(Decimal::ZERO),
        }
    }

    /// Volume growing on both windows with at least one live listing.
    pub fn uptrend(&self) -> bool {
        self.volume_change_24h > Decimal::ZERO
            && self.volume_change_7d > Decimal::ZERO
            && self.active_listings >= 1
    }
}

/// Liquidity health snapshot for a collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionHealth {
    /// Current floor ask in ETH.
    pub floor_price: Decimal,
    /// Market-cap proxy: floor price times token count.
    pub market_cap: Decimal,
    /// Distinct holder count.
    pub owner_count: u64,
    /// Tokens currently listed for sale.
    pub active_listings: u64,
}

impl CollectionHealth {
    /// Map a raw collection payload.
    pub fn from_collection(raw: &RawCollection) -> Self {
        let floor_price = raw.floor_native().unwrap_or(Decimal::ZERO);
        let token_count = raw.token_count.unwrap_or(0);

        Self {
            floor_price,
            market_cap: market_cap(Some(floor_price), token_count),
            owner_count: raw.owner_count.unwrap_or(0),
            active_listings: raw.on_sale_count.unwrap_or(0),
        }
    }

    /// A priced floor, a non-zero cap and enough listings to form a spread.
    pub fn healthy(&self) -> bool {
        self.floor_price > Decimal::ZERO
            && self.market_cap > Decimal::ZERO
            && self.active_listings >= 2
    }
}

fn market_cap(floor_price: Option<Decimal>, token_count: u64) -> Decimal {
    floor_price.unwrap_or(Decimal::ZERO) * Decimal::from(token_count)
}

/// Response from `/orders/asks` and `/orders/bids`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawOrdersResponse {
    /// Orders in the requested sort order.
    pub orders: Option<Vec<RawOrder>>,
    /// Continuation token for paging.
    pub continuation: Option<String>,
}

/// Single order from the orders endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct RawOrder {
    /// Order id.
    pub id: Option<String>,
    /// Token set the order covers ("token:{contract}:{id}" for single tokens).
    #[serde(rename = "tokenSetId")]
    pub token_set_id: Option<String>,
    /// Maker wallet address.
    pub maker: Option<String>,
    /// Order price.
    pub price: Option<RawPrice>,
    /// Unix timestamp the order became valid.
    #[serde(rename = "validFrom")]
    pub valid_from: Option<i64>,
    /// Unix timestamp the order expires.
    #[serde(rename = "validUntil")]
    pub valid_until: Option<i64>,
    /// Originating marketplace.
    pub source: Option<RawSource>,
    /// Order criteria (carries the token id for token orders).
    pub criteria: Option<RawCriteria>,
}

impl RawOrder {
    /// Token id from the criteria, falling back to the token set id.
    pub fn resolved_token_id(&self) -> Option<String> {
        if let Some(id) = self
            .criteria
            .as_ref()
            .and_then(|c| c.data.as_ref())
            .and_then(|d| d.token.as_ref())
            .and_then(|t| t.token_id.clone())
        {
            return Some(id);
        }

        self.token_set_id
            .as_deref()
            .and_then(token_id_from_set_id)
            .map(str::to_string)
    }
}

/// Price block attached to orders and floor asks.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPrice {
    /// Listing currency.
    pub currency: Option<RawCurrency>,
    /// Gross amount.
    pub amount: Option<RawAmount>,
    /// Amount net of fees.
    #[serde(rename = "netAmount")]
    pub net_amount: Option<RawAmount>,
}

impl RawPrice {
    /// Price in the native currency, preferring the decimal fields over the
    /// raw smallest-unit string.
    pub fn native(&self) -> Option<Decimal> {
        self.amount.as_ref().and_then(RawAmount::native_value)
    }

    /// USD equivalent, when reported.
    pub fn usd(&self) -> Option<Decimal> {
        self.amount.as_ref().and_then(|a| a.usd)
    }
}

/// Amount in several denominations.
#[derive(Debug, Clone, Deserialize)]
pub struct RawAmount {
    /// Smallest-unit integer string (wei for ETH).
    pub raw: Option<String>,
    /// Amount in the listing currency's decimals.
    pub decimal: Option<Decimal>,
    /// USD equivalent.
    pub usd: Option<Decimal>,
    /// Amount in the chain's native currency.
    pub native: Option<Decimal>,
}

impl RawAmount {
    /// Native amount, falling back across denominations.
    pub fn native_value(&self) -> Option<Decimal> {
        self.native
            .or(self.decimal)
            .or_else(|| self.raw.as_deref().and_then(wei_to_native))
    }
}

/// Currency descriptor.
#[derive(Debug, Clone, Deserialize)]
pub struct RawCurrency {
    /// Currency contract address (zero address for ETH).
    pub contract: Option<String>,
    /// Ticker symbol.
    pub symbol: Option<String>,
    /// Number of decimals.
    pub decimals: Option<u32>,
}

/// Marketplace source descriptor.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSource {
    /// Source domain (e.g., "opensea.io").
    pub domain: Option<String>,
    /// Source display name.
    pub name: Option<String>,
}

impl RawSource {
    fn label(self) -> Option<String> {
        self.domain.or(self.name)
    }
}

/// Order criteria wrapper.
#[derive(Debug, Clone, Deserialize)]
pub struct RawCriteria {
    /// Criteria payload.
    pub data: Option<RawCriteriaData>,
}

/// Criteria payload carrying the token.
#[derive(Debug, Clone, Deserialize)]
pub struct RawCriteriaData {
    /// Token the order targets.
    pub token: Option<RawCriteriaToken>,
}

/// Token reference inside order criteria.
#[derive(Debug, Clone, Deserialize)]
pub struct RawCriteriaToken {
    /// Token id.
    #[serde(rename = "tokenId")]
    pub token_id: Option<String>,
}

/// Response from `/tokens`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTokensResponse {
    /// Tokens in the requested sort order.
    pub tokens: Option<Vec<RawTokenEntry>>,
    /// Continuation token for paging.
    pub continuation: Option<String>,
}

/// Single `/tokens` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTokenEntry {
    /// Token identity.
    pub token: Option<RawTokenInfo>,
    /// Market data for the token.
    pub market: Option<RawTokenMarket>,
}

/// Token identity block.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTokenInfo {
    /// Token id.
    #[serde(rename = "tokenId")]
    pub token_id: Option<String>,
    /// Collection contract address.
    pub contract: Option<String>,
    /// Token name.
    pub name: Option<String>,
}

/// Market block of a `/tokens` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTokenMarket {
    /// Current floor ask for the token.
    #[serde(rename = "floorAsk")]
    pub floor_ask: Option<RawFloorAsk>,
}

/// Floor ask block.
#[derive(Debug, Clone, Deserialize)]
pub struct RawFloorAsk {
    /// Ask id.
    pub id: Option<String>,
    /// Ask price.
    pub price: Option<RawPrice>,
    /// Maker wallet address.
    pub maker: Option<String>,
    /// Originating marketplace.
    pub source: Option<RawSource>,
}

/// Response from `/collections`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawCollectionsResponse {
    /// Matching collections.
    pub collections: Option<Vec<RawCollection>>,
}

/// Single collection payload.
#[derive(Debug, Clone, Deserialize)]
pub struct RawCollection {
    /// Collection contract address.
    pub id: Option<String>,
    /// Collection display name.
    pub name: Option<String>,
    /// Total token count (string or number on the wire).
    #[serde(rename = "tokenCount", default, deserialize_with = "de_count")]
    pub token_count: Option<u64>,
    /// Tokens currently listed (string or number on the wire).
    #[serde(rename = "onSaleCount", default, deserialize_with = "de_count")]
    pub on_sale_count: Option<u64>,
    /// Distinct holder count.
    #[serde(rename = "ownerCount", default, deserialize_with = "de_count")]
    pub owner_count: Option<u64>,
    /// Current collection floor ask.
    #[serde(rename = "floorAsk")]
    pub floor_ask: Option<RawFloorAsk>,
    /// Rolling volumes keyed by window.
    pub volume: Option<RawVolume>,
    /// Rolling volume changes keyed by window.
    #[serde(rename = "volumeChange")]
    pub volume_change: Option<RawVolumeChange>,
}

impl RawCollection {
    fn floor_native(&self) -> Option<Decimal> {
        self.floor_ask
            .as_ref()
            .and_then(|f| f.price.as_ref())
            .and_then(RawPrice::native)
    }

    fn volume_one_day(&self) -> Decimal {
        self.volume
            .as_ref()
            .and_then(|v| v.one_day)
            .unwrap_or(Decimal::ZERO)
    }

    fn volume_seven_day(&self) -> Decimal {
        self.volume
            .as_ref()
            .and_then(|v| v.seven_day)
            .unwrap_or(Decimal::ZERO)
    }
}

/// Rolling volume windows.
#[derive(Debug, Clone, Deserialize)]
pub struct RawVolume {
    /// Last 24 hours.
    #[serde(rename = "1day")]
    pub one_day: Option<Decimal>,
    /// Last 7 days.
    #[serde(rename = "7day")]
    pub seven_day: Option<Decimal>,
    /// Last 30 days.
    #[serde(rename = "30day")]
    pub thirty_day: Option<Decimal>,
    /// All time.
    #[serde(rename = "allTime")]
    pub all_time: Option<Decimal>,
}

/// Rolling volume-change windows.
#[derive(Debug, Clone, Deserialize)]
pub struct RawVolumeChange {
    /// Last 24 hours.
    #[serde(rename = "1day")]
    pub one_day: Option<Decimal>,
    /// Last 7 days.
    #[serde(rename = "7day")]
    pub seven_day: Option<Decimal>,
}

/// Extract the token id from a "token:{contract}:{id}" set id.
fn token_id_from_set_id(set_id: &str) -> Option<&str> {
    let mut parts = set_id.splitn(3, ':');
    match (parts.next()?, parts.next()?, parts.next()?) {
        ("token", _, id) if !id.is_empty() => Some(id),
        _ => None,
    }
}

/// Convert a wei integer string to ETH.
fn wei_to_native(raw: &str) -> Option<Decimal> {
    let wei: Decimal = raw.trim().parse().ok()?;
    Some(wei / Decimal::from(1_000_000_000_000_000_000_u64))
}

fn de_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(count_from_value))
}

fn count_from_value(value: &Value) -> Option<u64> {
    match value {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn ask_json(token_id: &str, price: f64) -> Value {
        json!({
            "id": format!("0xorder{token_id}"),
            "tokenSetId": format!("token:0xcontract:{token_id}"),
            "maker": "0xmaker",
            "price": {
                "currency": { "contract": "0x0000000000000000000000000000000000000000", "symbol": "ETH", "decimals": 18 },
                "amount": { "decimal": price, "usd": price * 1800.0, "native": price }
            },
            "validFrom": 1_700_000_000,
            "validUntil": 1_700_100_000,
            "source": { "domain": "opensea.io", "name": "OpenSea" },
            "criteria": { "data": { "token": { "tokenId": token_id } } }
        })
    }

    #[test]
    fn listing_conversion_reads_all_fields() {
        let raw: RawOrder = serde_json::from_value(ask_json("5", 1.25)).unwrap();
        let listing = OrderListing::from_order(raw).unwrap();

        assert_eq!(listing.token_id, "5");
        assert_eq!(listing.price, dec!(1.25));
        assert_eq!(listing.maker.as_deref(), Some("0xmaker"));
        assert_eq!(listing.source.as_deref(), Some("opensea.io"));
        assert_eq!(listing.valid_until, Some(1_700_100_000));
    }

    #[test]
    fn token_id_prefers_criteria_over_set_id() {
        let raw: RawOrder = serde_json::from_value(json!({
            "tokenSetId": "token:0xcontract:99",
            "criteria": { "data": { "token": { "tokenId": "5" } } },
            "price": { "amount": { "native": 1.0 } }
        }))
        .unwrap();

        assert_eq!(raw.resolved_token_id().as_deref(), Some("5"));
    }

    #[test]
    fn token_id_falls_back_to_set_id() {
        let raw: RawOrder = serde_json::from_value(json!({
            "tokenSetId": "token:0xcontract:42",
            "price": { "amount": { "native": 1.0 } }
        }))
        .unwrap();

        assert_eq!(raw.resolved_token_id().as_deref(), Some("42"));
    }

    #[test]
    fn set_id_parsing_rejects_other_shapes() {
        assert_eq!(token_id_from_set_id("token:0xabc:5"), Some("5"));
        assert_eq!(token_id_from_set_id("contract:0xabc"), None);
        assert_eq!(token_id_from_set_id("token:0xabc:"), None);
        assert_eq!(token_id_from_set_id("range:0xabc:1:10"), None);
    }

    #[test]
    fn listing_without_token_or_price_is_dropped() {
        let no_token: RawOrder = serde_json::from_value(json!({
            "price": { "amount": { "native": 1.0 } }
        }))
        .unwrap();
        assert!(OrderListing::from_order(no_token).is_none());

        let no_price: RawOrder = serde_json::from_value(json!({
            "tokenSetId": "token:0xcontract:5"
        }))
        .unwrap();
        assert!(OrderListing::from_order(no_price).is_none());
    }

    #[test]
    fn price_falls_back_to_raw_wei() {
        let raw: RawOrder = serde_json::from_value(json!({
            "tokenSetId": "token:0xcontract:5",
            "price": { "amount": { "raw": "1050000000000000000" } }
        }))
        .unwrap();

        let listing = OrderListing::from_order(raw).unwrap();
        assert_eq!(listing.price, dec!(1.05));
    }

    #[test]
    fn floor_token_conversion_works() {
        let raw: RawTokenEntry = serde_json::from_value(json!({
            "token": { "tokenId": "7", "contract": "0xcontract", "name": "Token #7" },
            "market": {
                "floorAsk": {
                    "id": "0xask",
                    "price": { "amount": { "native": 0.8 } },
                    "source": { "name": "Blur" }
                }
            }
        }))
        .unwrap();

        let floor = FloorToken::from_entry(raw).unwrap();
        assert_eq!(floor.token_id, "7");
        assert_eq!(floor.price, dec!(0.8));
        assert_eq!(floor.source.as_deref(), Some("Blur"));
    }

    fn collection_json() -> Value {
        json!({
            "id": "0xcollection",
            "name": "Test Apes",
            "tokenCount": "10000",
            "onSaleCount": "450",
            "ownerCount": 5000,
            "floorAsk": { "price": { "amount": { "native": 1.05 } } },
            "volume": { "1day": 12.5, "7day": 80.0 },
            "volumeChange": { "1day": 0.2, "7day": 0.1 }
        })
    }

    #[test]
    fn collection_stats_parse_string_counts() {
        let raw: RawCollection = serde_json::from_value(collection_json()).unwrap();
        let stats = CollectionStats::from_collection(&raw, "0xfallback");

        assert_eq!(stats.id, "0xcollection");
        assert_eq!(stats.token_count, 10_000);
        assert_eq!(stats.on_sale_count, 450);
        assert_eq!(stats.owner_count, 5_000);
        assert_eq!(stats.floor_price, Some(dec!(1.05)));
        assert_eq!(stats.market_cap, dec!(10500));
    }

    #[test]
    fn collection_stats_fall_back_to_requested_id() {
        let raw: RawCollection = serde_json::from_value(json!({})).unwrap();
        let stats = CollectionStats::from_collection(&raw, "0xfallback");

        assert_eq!(stats.id, "0xfallback");
        assert_eq!(stats.token_count, 0);
        assert_eq!(stats.market_cap, Decimal::ZERO);
    }

    #[test]
    fn numeric_counts_also_parse() {
        let raw: RawCollection = serde_json::from_value(json!({
            "tokenCount": 5000,
            "onSaleCount": 12
        }))
        .unwrap();

        assert_eq!(raw.token_count, Some(5_000));
        assert_eq!(raw.on_sale_count, Some(12));
    }

    #[test]
    fn uptrend_needs_growth_on_both_windows() {
        let raw: RawCollection = serde_json::from_value(collection_json()).unwrap();
        let trend = MarketTrend::from_collection(&raw);
        assert!(trend.uptrend());

        let mut flat = trend.clone();
        flat.volume_change_24h = Decimal::ZERO;
        assert!(!flat.uptrend());

        let mut falling_week = trend.clone();
        falling_week.volume_change_7d = dec!(-0.3);
        assert!(!falling_week.uptrend());

        let mut no_listings = trend;
        no_listings.active_listings = 0;
        assert!(!no_listings.uptrend());
    }

    #[test]
    fn health_requires_two_listings_and_priced_floor() {
        let raw: RawCollection = serde_json::from_value(collection_json()).unwrap();
        let health = CollectionHealth::from_collection(&raw);
        assert!(health.healthy());
        assert_eq!(health.market_cap, dec!(10500));

        let mut thin = health.clone();
        thin.active_listings = 1;
        assert!(!thin.healthy());

        let mut unpriced = health;
        unpriced.floor_price = Decimal::ZERO;
        unpriced.market_cap = Decimal::ZERO;
        assert!(!unpriced.healthy());
    }
}
