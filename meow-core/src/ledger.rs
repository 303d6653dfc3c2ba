//! Coins, inventory and FIFO cost-basis lots.
//!
//! Manual trades and trader fills both settle through [`settle_buy`] and
//! [`settle_sell`], so pressure, heat and the last-trade record are applied
//! the same way regardless of who traded.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tsify_next::Tsify;

use crate::config::SimConfig;
use crate::heat;
use crate::market;
use crate::state::SimState;
use crate::types::{
    Coins, GoodKey, JobKey, Price, Quantity, SchemeId, TradeKind, clamp0, round2,
};

/// A batch of units bought (or produced) at one unit cost.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Tsify)]
#[serde(rename_all = "camelCase")]
pub struct Lot {
    pub qty: Quantity,
    pub unit_cost: Price,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct LastTrade {
    pub kind: TradeKind,
    pub good: GoodKey,
    pub qty: Quantity,
    pub unit_price: Price,
    pub total: Coins,
    /// Realised profit against FIFO cost basis; sells only.
    pub pnl: Option<Coins>,
    /// Set when an automated trader executed the fill.
    pub trader: Option<String>,
    pub at_sec: f64,
}

// ============================================================================
// Prices seen by the player
// ============================================================================

/// Unit price the player pays, after job and scheme edges.
pub fn buy_price(state: &SimState, config: &SimConfig, good: GoodKey) -> Price {
    let t = &config.tuning;
    let mut p = state.price(good);
    if state.has_job(JobKey::Negotiating) {
        p = round2(p * t.negotiate_buy_mult);
    }
    if state.scheme_active(SchemeId::PricePounce) {
        p = round2(p * t.pounce_buy_mult);
    }
    p
}

/// Unit price the player receives, after job and scheme edges.
pub fn sell_price(state: &SimState, config: &SimConfig, good: GoodKey) -> Price {
    let t = &config.tuning;
    let mut p = state.price(good);
    if state.has_job(JobKey::Negotiating) {
        p = round2(p * t.negotiate_sell_mult);
    }
    if state.scheme_active(SchemeId::PricePounce) {
        p = round2(p * t.pounce_sell_mult);
    }
    p
}

/// Coerce an untrusted quantity: non-finite → 0, fractional parts floored.
pub fn coerce_qty(qty: f64) -> i64 {
    if qty.is_finite() { qty.floor() as i64 } else { 0 }
}

fn positive_qty(qty: i64) -> Option<Quantity> {
    Quantity::try_from(qty).ok().filter(|q| *q > 0)
}

// ============================================================================
// Manual trades
// ============================================================================

pub fn can_buy(state: &SimState, config: &SimConfig, good: GoodKey, qty: i64) -> bool {
    let Some(q) = positive_qty(qty) else {
        return false;
    };
    if !state.is_unlocked(good.feature()) {
        return false;
    }
    if state.held(good).checked_add(q).is_none() {
        return false;
    }
    let cost = buy_price(state, config, good) * q as f64;
    cost.is_finite() && state.coins >= cost
}

pub fn can_sell(state: &SimState, good: GoodKey, qty: i64) -> bool {
    let Some(q) = positive_qty(qty) else {
        return false;
    };
    state.is_unlocked(good.feature()) && state.held(good) >= q
}

/// Buy `qty` units at the current buy price. Returns false and mutates
/// nothing when the good is locked, qty is not positive or coins fall short.
pub fn buy(state: &mut SimState, config: &SimConfig, good: GoodKey, qty: i64) -> bool {
    if !can_buy(state, config, good, qty) {
        return false;
    }
    let Some(q) = positive_qty(qty) else {
        return false;
    };
    let unit = buy_price(state, config, good);
    settle_buy(state, config, good, q, unit, None);
    true
}

/// Sell `qty` units at the current sell price, consuming lots oldest-first.
pub fn sell(state: &mut SimState, config: &SimConfig, good: GoodKey, qty: i64) -> bool {
    if !can_sell(state, good, qty) {
        return false;
    }
    let Some(q) = positive_qty(qty) else {
        return false;
    };
    let unit = sell_price(state, config, good);
    settle_sell(state, config, good, q, unit, None);
    true
}

// ============================================================================
// Settlement - shared by manual trades and traders
// ============================================================================

/// Apply a validated buy. Caller guarantees affordability.
pub(crate) fn settle_buy(
    state: &mut SimState,
    config: &SimConfig,
    good: GoodKey,
    qty: Quantity,
    unit: Price,
    trader: Option<&str>,
) {
    let total = round2(unit * qty as f64);
    state.coins = clamp0(round2(state.coins - total));
    add_units(state, good, qty, unit);
    market::apply_pressure(state, config, good, qty as f64);
    heat::add_trade_heat(state, config, good, qty);
    market::recompute_good(state, config, good);

    #[cfg(feature = "instrument")]
    tracing::info!(
        target: "trade",
        t = state.sim_time,
        kind = TradeKind::Buy.as_str(),
        good = good.as_str(),
        qty = qty,
        unit_price = unit,
        total = total,
        coins = state.coins,
        by_trader = trader.is_some(),
    );

    state.last_trade = Some(LastTrade {
        kind: TradeKind::Buy,
        good,
        qty,
        unit_price: unit,
        total,
        pnl: None,
        trader: trader.map(str::to_string),
        at_sec: state.sim_time,
    });
}

/// Apply a validated sell. Caller guarantees `qty` units are held.
pub(crate) fn settle_sell(
    state: &mut SimState,
    config: &SimConfig,
    good: GoodKey,
    qty: Quantity,
    unit: Price,
    trader: Option<&str>,
) {
    let total = round2(unit * qty as f64);
    let (removed, basis) = remove_units(state, good, qty);
    let pnl = round2(total - basis);
    state.coins = round2(state.coins + total);
    market::apply_pressure(state, config, good, -(removed as f64));
    heat::add_trade_heat(state, config, good, removed);
    market::recompute_good(state, config, good);

    #[cfg(feature = "instrument")]
    tracing::info!(
        target: "trade",
        t = state.sim_time,
        kind = TradeKind::Sell.as_str(),
        good = good.as_str(),
        qty = qty,
        unit_price = unit,
        total = total,
        coins = state.coins,
        by_trader = trader.is_some(),
    );

    state.last_trade = Some(LastTrade {
        kind: TradeKind::Sell,
        good,
        qty,
        unit_price: unit,
        total,
        pnl: Some(pnl),
        trader: trader.map(str::to_string),
        at_sec: state.sim_time,
    });
}

// ============================================================================
// Inventory and lots
// ============================================================================

/// Add units with a known unit cost (zero for produced goods). Inventory
/// saturates at `Quantity::MAX`; units beyond that are dropped so lots keep
/// summing to the held count.
pub fn add_units(state: &mut SimState, good: GoodKey, qty: Quantity, unit_cost: Price) {
    let held = state.inventory.entry(good).or_insert(0);
    let qty = qty.min(Quantity::MAX - *held);
    if qty == 0 {
        return;
    }
    *held += qty;
    state.lots.entry(good).or_default().push_back(Lot {
        qty,
        unit_cost: clamp0(unit_cost),
    });
}

/// Remove up to `qty` units oldest-lot-first. Returns the count actually
/// removed and their total cost basis.
pub fn remove_units(state: &mut SimState, good: GoodKey, qty: Quantity) -> (Quantity, Coins) {
    let held = state.held(good);
    let take = qty.min(held);
    if take == 0 {
        return (0, 0.0);
    }
    state.inventory.insert(good, held - take);
    let basis = consume_fifo(state.lots.entry(good).or_default(), take);
    (take, basis)
}

/// Pop `qty` units off the front of `lots`, splitting the last lot touched.
fn consume_fifo(lots: &mut VecDeque<Lot>, mut qty: Quantity) -> Coins {
    let mut basis = 0.0;
    while qty > 0 {
        let Some(front) = lots.front_mut() else {
            break;
        };
        let used = front.qty.min(qty);
        basis += used as f64 * front.unit_cost;
        front.qty -= used;
        qty -= used;
        if front.qty == 0 {
            lots.pop_front();
        }
    }
    basis
}

/// Force lot quantities to sum to `held`: drop empty lots, trim excess from
/// the newest end, and cover a shortfall with a zero-cost lot.
pub fn reconcile_lots(lots: &mut VecDeque<Lot>, held: Quantity) {
    lots.retain(|l| l.qty > 0);
    for lot in lots.iter_mut() {
        lot.unit_cost = clamp0(lot.unit_cost);
    }
    let mut sum: u64 = lots.iter().map(|l| l.qty as u64).sum();
    while sum > held as u64 {
        let Some(back) = lots.back_mut() else {
            break;
        };
        let excess = (sum - held as u64).min(back.qty as u64) as Quantity;
        back.qty -= excess;
        sum -= excess as u64;
        if back.qty == 0 {
            lots.pop_back();
        }
    }
    if sum < held as u64 {
        lots.push_back(Lot {
            qty: (held as u64 - sum) as Quantity,
            unit_cost: 0.0,
        });
    }
}

// ============================================================================
// Queries
// ============================================================================

/// Weighted average unit cost of held lots; `None` when nothing is held.
pub fn average_cost(state: &SimState, good: GoodKey) -> Option<Price> {
    let lots = state.lots.get(&good)?;
    let qty: u64 = lots.iter().map(|l| l.qty as u64).sum();
    if qty == 0 {
        return None;
    }
    let basis: f64 = lots.iter().map(|l| l.qty as f64 * l.unit_cost).sum();
    Some(round2(basis / qty as f64))
}

/// Mark-to-market gain of held units at the displayed price.
pub fn unrealized_pnl(state: &SimState, good: GoodKey) -> Coins {
    let Some(lots) = state.lots.get(&good) else {
        return 0.0;
    };
    let price = state.price(good);
    round2(
        lots.iter()
            .map(|l| l.qty as f64 * (price - l.unit_cost))
            .sum(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FeatureKey;

    fn setup() -> (SimState, SimConfig) {
        let config = SimConfig::default();
        let state = SimState::new_save(&config, Some(77));
        (state, config)
    }

    #[test]
    fn test_buy_rejects_bad_qty_and_locked_goods() {
        let (mut state, config) = setup();
        let before = state.clone();
        assert!(!buy(&mut state, &config, GoodKey::Kibble, 0));
        assert!(!buy(&mut state, &config, GoodKey::Kibble, -3));
        assert!(!buy(&mut state, &config, GoodKey::Catnip, 1));
        assert!(!buy(&mut state, &config, GoodKey::Kibble, 1_000_000));
        assert_eq!(state, before);
    }

    #[test]
    fn test_buy_adds_lot_pressure_and_record() {
        let (mut state, config) = setup();
        let unit = buy_price(&state, &config, GoodKey::Kibble);
        assert!(buy(&mut state, &config, GoodKey::Kibble, 2));
        assert_eq!(state.held(GoodKey::Kibble), 2);
        assert_eq!(state.coins, round2(50.0 - unit * 2.0));
        assert_eq!(state.pressure(GoodKey::Kibble), 2.0);
        let lots = &state.lots[&GoodKey::Kibble];
        assert_eq!(lots.len(), 1);
        assert_eq!(lots[0], Lot { qty: 2, unit_cost: unit });
        let trade = state.last_trade.as_ref().unwrap();
        assert_eq!(trade.kind, TradeKind::Buy);
        assert_eq!(trade.pnl, None);
        // No heat before the feature unlocks.
        assert_eq!(state.heat, 0.0);
    }

    #[test]
    fn test_sell_consumes_oldest_lots_first() {
        let (mut state, config) = setup();
        add_units(&mut state, GoodKey::Kibble, 2, 5.0);
        add_units(&mut state, GoodKey::Kibble, 3, 8.0);
        let unit = sell_price(&state, &config, GoodKey::Kibble);
        assert!(sell(&mut state, &config, GoodKey::Kibble, 3));

        let lots = &state.lots[&GoodKey::Kibble];
        assert_eq!(lots.len(), 1);
        assert_eq!(lots[0], Lot { qty: 2, unit_cost: 8.0 });
        let pnl = state.last_trade.as_ref().unwrap().pnl.unwrap();
        assert_eq!(pnl, round2(unit * 3.0 - (2.0 * 5.0 + 8.0)));
        assert!(!sell(&mut state, &config, GoodKey::Kibble, 3));
    }

    #[test]
    fn test_negotiating_edge_rounds_to_cents() {
        let (mut state, config) = setup();
        state.market.get_mut(&GoodKey::Kibble).unwrap().price = 10.37;
        state
            .job_assignments
            .insert("miso".into(), JobKey::Negotiating);
        assert_eq!(buy_price(&state, &config, GoodKey::Kibble), 10.16);
        assert_eq!(sell_price(&state, &config, GoodKey::Kibble), 10.58);
    }

    fn pouncing(state: &mut SimState) {
        state.schemes.entry(SchemeId::PricePounce).or_default().active_left = 8.0;
    }

    #[test]
    fn test_price_pounce_edges() {
        let (mut state, config) = setup();
        state.market.get_mut(&GoodKey::Kibble).unwrap().price = 10.37;
        assert_eq!(buy_price(&state, &config, GoodKey::Kibble), 10.37);
        pouncing(&mut state);
        // 10.37 * 0.97 and 10.37 * 1.03
        assert_eq!(buy_price(&state, &config, GoodKey::Kibble), 10.06);
        assert_eq!(sell_price(&state, &config, GoodKey::Kibble), 10.68);
        // Stacks after the negotiating edge: 10.16 * 0.97
        state
            .job_assignments
            .insert("miso".into(), JobKey::Negotiating);
        assert_eq!(buy_price(&state, &config, GoodKey::Kibble), 9.86);
    }

    #[test]
    fn test_price_pounce_applies_to_checks_and_fills() {
        let (mut state, config) = setup();
        state.market.get_mut(&GoodKey::Kibble).unwrap().price = 10.37;
        state.coins = 10.06;
        assert!(!can_buy(&state, &config, GoodKey::Kibble, 1));

        pouncing(&mut state);
        assert!(can_buy(&state, &config, GoodKey::Kibble, 1));
        assert!(buy(&mut state, &config, GoodKey::Kibble, 1));
        assert_eq!(state.coins, 0.0);
        assert_eq!(state.last_trade.as_ref().unwrap().unit_price, 10.06);
        assert_eq!(state.lots[&GoodKey::Kibble][0].unit_cost, 10.06);

        state.market.get_mut(&GoodKey::Kibble).unwrap().price = 10.37;
        assert!(sell(&mut state, &config, GoodKey::Kibble, 1));
        assert_eq!(state.coins, 10.68);
        assert_eq!(state.last_trade.as_ref().unwrap().unit_price, 10.68);
    }

    #[test]
    fn test_trade_heat_only_after_unlock() {
        let (mut state, config) = setup();
        state.unlock(FeatureKey::Heat);
        assert!(buy(&mut state, &config, GoodKey::Kibble, 2));
        assert!((state.heat - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_reconcile_trims_newest_and_fills_gap() {
        let mut lots = VecDeque::from([
            Lot { qty: 2, unit_cost: 1.0 },
            Lot { qty: 0, unit_cost: 9.0 },
            Lot { qty: 4, unit_cost: 3.0 },
        ]);
        reconcile_lots(&mut lots, 3);
        assert_eq!(
            lots,
            VecDeque::from([Lot { qty: 2, unit_cost: 1.0 }, Lot { qty: 1, unit_cost: 3.0 }])
        );
        reconcile_lots(&mut lots, 5);
        assert_eq!(lots.back(), Some(&Lot { qty: 2, unit_cost: 0.0 }));
    }

    #[test]
    fn test_average_cost_and_unrealized_pnl() {
        let (mut state, _config) = setup();
        assert_eq!(average_cost(&state, GoodKey::Kibble), None);
        add_units(&mut state, GoodKey::Kibble, 1, 6.0);
        add_units(&mut state, GoodKey::Kibble, 3, 10.0);
        assert_eq!(average_cost(&state, GoodKey::Kibble), Some(9.0));
        state.market.get_mut(&GoodKey::Kibble).unwrap().price = 12.0;
        assert_eq!(unrealized_pnl(&state, GoodKey::Kibble), 12.0);
    }

    #[test]
    fn test_inventory_saturates_instead_of_overflowing() {
        let (mut state, config) = setup();
        add_units(&mut state, GoodKey::Kibble, Quantity::MAX - 1, 1.0);
        state.coins = 1e6;
        let before = state.clone();
        assert!(!can_buy(&state, &config, GoodKey::Kibble, 5));
        assert!(!buy(&mut state, &config, GoodKey::Kibble, 5));
        assert_eq!(state, before);
        assert!(buy(&mut state, &config, GoodKey::Kibble, 1));
        assert_eq!(state.held(GoodKey::Kibble), Quantity::MAX);

        add_units(&mut state, GoodKey::Kibble, 10, 0.0);
        assert_eq!(state.held(GoodKey::Kibble), Quantity::MAX);
        assert_eq!(state.total_lot_qty(GoodKey::Kibble), Quantity::MAX as u64);
    }

    #[test]
    fn test_coerce_qty() {
        assert_eq!(coerce_qty(f64::NAN), 0);
        assert_eq!(coerce_qty(2.9), 2);
        assert_eq!(coerce_qty(-1.5), -2);
    }
}
