//! Pure sweep math.
//!
//! This module handles:
//! - Floor gap measurement
//! - Gas cost and profit estimates
//! - Slippage bounds for fills

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const GWEI_IN_ETH: u32 = 9;
const PERCENT: Decimal = dec!(100);
const BPS: Decimal = dec!(10000);

/// Gap between the two lowest listings, as a percentage of the floor.
///
/// Returns zero when the floor is unpriced so callers reject instead of
/// dividing by zero.
pub fn gap_percent(lowest: Decimal, second: Decimal) -> Decimal {
    if lowest <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    (second - lowest) / lowest * PERCENT
}

/// Total gas for a buy-then-list round trip, in ETH.
pub fn gas_cost_eth(buy_units: u64, list_units: u64, gas_price_gwei: Decimal) -> Decimal {
    let units = Decimal::from(buy_units.saturating_add(list_units));
    units * gas_price_gwei * Decimal::new(1, GWEI_IN_ETH)
}

/// Relist price for a purchase at the configured markup.
pub fn target_list_price(purchase_price: Decimal, target_profit_percent: Decimal) -> Decimal {
    purchase_price * (Decimal::ONE + target_profit_percent / PERCENT)
}

/// Profit left after buying, relisting and paying gas.
pub fn estimated_profit(list_price: Decimal, purchase_price: Decimal, gas_cost: Decimal) -> Decimal {
    list_price - purchase_price - gas_cost
}

/// Highest acceptable fill price for an expected floor price.
pub fn max_buy_price(expected: Decimal, max_slippage_bps: u32) -> Decimal {
    expected * (Decimal::ONE + Decimal::from(max_slippage_bps) / BPS)
}

/// Fill slippage relative to the expected price, in percent.
///
/// Negative values mean the fill came in below the observed floor.
pub fn slippage_percent(actual: Decimal, expected: Decimal) -> Decimal {
    if expected <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    (actual - expected) / expected * PERCENT
}
