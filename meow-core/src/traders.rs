//! Automated traders: rule lists executed against a rate-limited budget.

use serde::{Deserialize, Serialize};
use tsify_next::Tsify;

use crate::config::SimConfig;
use crate::error::RuleError;
use crate::ledger;
use crate::state::SimState;
use crate::types::{FeatureKey, GoodKey, Price, Quantity, clamp0, round2};

const BPS: f64 = 10_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Tsify)]
#[serde(rename_all = "camelCase")]
pub enum RuleKind {
    /// Buy when the displayed price is strictly below the threshold.
    BuyBelow,
    /// Sell when the displayed price is strictly above the threshold.
    SellAbove,
}

/// A validated trigger. Construct with [`TraderRule::new`]; deserialisation
/// runs the same checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRule", rename_all = "camelCase")]
pub struct TraderRule {
    kind: RuleKind,
    good: GoodKey,
    price: Price,
    qty: Quantity,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRule {
    kind: RuleKind,
    good: GoodKey,
    price: Price,
    qty: Quantity,
}

impl TryFrom<RawRule> for TraderRule {
    type Error = RuleError;

    fn try_from(raw: RawRule) -> Result<Self, Self::Error> {
        TraderRule::new(raw.kind, raw.good, raw.price, raw.qty)
    }
}

impl TraderRule {
    pub fn new(kind: RuleKind, good: GoodKey, price: Price, qty: Quantity) -> Result<Self, RuleError> {
        if !(price.is_finite() && price > 0.0) {
            return Err(RuleError::NonPositivePrice(price));
        }
        if qty == 0 {
            return Err(RuleError::ZeroQuantity);
        }
        Ok(Self {
            kind,
            good,
            price,
            qty,
        })
    }

    pub fn kind(&self) -> RuleKind {
        self.kind
    }

    pub fn good(&self) -> GoodKey {
        self.good
    }

    pub fn price(&self) -> Price {
        self.price
    }

    pub fn qty(&self) -> Quantity {
        self.qty
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trader {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    /// Fee on every fill, in basis points of the displayed price.
    pub fee_bps: f64,
    pub actions_per_min: f64,
    /// Evaluated in order; the first rule that fires uses the action.
    pub rules: Vec<TraderRule>,
}

impl Trader {
    pub fn validate(&self) -> Result<(), RuleError> {
        if !(self.fee_bps.is_finite() && self.fee_bps >= 0.0) {
            return Err(RuleError::NegativeFee(self.fee_bps));
        }
        if !(self.actions_per_min.is_finite() && self.actions_per_min > 0.0) {
            return Err(RuleError::NonPositiveRate(self.actions_per_min));
        }
        Ok(())
    }

    fn fee(&self) -> f64 {
        clamp0(self.fee_bps) / BPS
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TraderRuntime {
    /// Accrued, unspent actions.
    pub budget: f64,
}

pub fn set_trader_enabled(state: &mut SimState, id: &str, enabled: bool) -> bool {
    match state.traders.iter_mut().find(|t| t.id == id) {
        Some(trader) => {
            trader.enabled = enabled;
            true
        }
        None => false,
    }
}

pub fn set_trader_rules(state: &mut SimState, id: &str, rules: Vec<TraderRule>) -> bool {
    match state.traders.iter_mut().find(|t| t.id == id) {
        Some(trader) => {
            trader.rules = rules;
            true
        }
        None => false,
    }
}

/// Accrue budgets and execute up to the per-tick action cap for each
/// enabled trader. Returns the number of fills.
pub fn run_traders(state: &mut SimState, config: &SimConfig, dt: f64) -> u32 {
    if !state.is_unlocked(FeatureKey::Traders) {
        return 0;
    }
    let dt = clamp0(dt);
    let max_actions = config.tuning.trader_max_actions_per_tick;
    let mut fills = 0;

    for i in 0..state.traders.len() {
        let trader = state.traders[i].clone();
        if !trader.enabled || trader.validate().is_err() {
            continue;
        }
        let mut budget = state
            .trader_runtime
            .get(&trader.id)
            .map_or(0.0, |r| clamp0(r.budget));
        budget += trader.actions_per_min * dt / 60.0;

        let mut actions = 0;
        while budget >= 1.0 && actions < max_actions {
            budget -= 1.0;
            actions += 1;
            if let Some(rule) = trader.rules.iter().find(|r| try_rule(state, config, &trader, r)) {
                fills += 1;

                #[cfg(feature = "instrument")]
                tracing::info!(
                    target: "trader_fill",
                    t = state.sim_time,
                    trader = trader.id.as_str(),
                    good = rule.good.as_str(),
                    buy = rule.kind == RuleKind::BuyBelow,
                    qty = rule.qty,
                    coins = state.coins,
                );
                #[cfg(not(feature = "instrument"))]
                let _ = rule;
            }
        }

        state.trader_runtime.entry(trader.id.clone()).or_default().budget = budget;
    }
    fills
}

/// Execute `rule` if its trigger holds. Fills go through the same settlement
/// path as manual trades, at the displayed price adjusted by the trader fee.
fn try_rule(state: &mut SimState, config: &SimConfig, trader: &Trader, rule: &TraderRule) -> bool {
    if !state.is_unlocked(rule.good.feature()) {
        return false;
    }
    let price = state.price(rule.good);
    match rule.kind {
        RuleKind::BuyBelow => {
            let unit = round2(price * (1.0 + trader.fee()));
            if price >= rule.price
                || state.coins < unit * rule.qty as f64
                || state.held(rule.good).checked_add(rule.qty).is_none()
            {
                return false;
            }
            ledger::settle_buy(state, config, rule.good, rule.qty, unit, Some(&trader.id));
        }
        RuleKind::SellAbove => {
            if price <= rule.price || state.held(rule.good) < rule.qty {
                return false;
            }
            let unit = round2(price * (1.0 - trader.fee()));
            ledger::settle_sell(state, config, rule.good, rule.qty, unit, Some(&trader.id));
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (SimState, SimConfig) {
        let config = SimConfig::default();
        let mut state = SimState::new_save(&config, Some(8));
        state.unlock(FeatureKey::Traders);
        (state, config)
    }

    /// Pin the base price so recomputes after each fill stay anchored.
    fn set_price(state: &mut SimState, config: &SimConfig, good: GoodKey, price: f64) {
        state.market_latent.get_mut(&good).unwrap().last_base_price = price;
        crate::market::recompute(state, config);
    }

    #[test]
    fn test_rule_validation() {
        assert_eq!(
            TraderRule::new(RuleKind::BuyBelow, GoodKey::Kibble, 0.0, 1),
            Err(RuleError::NonPositivePrice(0.0))
        );
        assert_eq!(
            TraderRule::new(RuleKind::SellAbove, GoodKey::Kibble, 5.0, 0),
            Err(RuleError::ZeroQuantity)
        );
        let bad = r#"{"kind":"buyBelow","good":"kibble","price":-1,"qty":1}"#;
        assert!(serde_json::from_str::<TraderRule>(bad).is_err());
        let good = r#"{"kind":"sellAbove","good":"catnip","price":20,"qty":2}"#;
        let rule: TraderRule = serde_json::from_str(good).unwrap();
        assert_eq!(rule.qty(), 2);
    }

    #[test]
    fn test_disabled_or_locked_traders_do_nothing() {
        let (mut state, config) = setup();
        set_price(&mut state, &config, GoodKey::Kibble, 9.0);
        assert_eq!(run_traders(&mut state, &config, 60.0), 0);
        assert_eq!(state.trader_runtime["tuna"].budget, 0.0);

        state.unlocked.insert(FeatureKey::Traders, false);
        assert!(set_trader_enabled(&mut state, "tuna", true));
        assert_eq!(run_traders(&mut state, &config, 60.0), 0);
        assert!(!set_trader_enabled(&mut state, "nobody", true));
    }

    #[test]
    fn test_buy_below_fills_with_fee_and_cap() {
        let (mut state, config) = setup();
        assert!(set_trader_enabled(&mut state, "tuna", true));
        set_price(&mut state, &config, GoodKey::Kibble, 9.0);

        // 60 s at 10/min = 10 actions, capped at 3 per tick. Pressure from
        // each fill lifts the price but it stays under the 9.5 threshold.
        let fills = run_traders(&mut state, &config, 60.0);
        assert_eq!(fills, 3);
        assert_eq!(state.held(GoodKey::Kibble), 3);
        assert!((state.trader_runtime["tuna"].budget - 7.0).abs() < 1e-9);
        let lot = state.lots[&GoodKey::Kibble][0];
        assert!(lot.unit_cost > 9.0, "fee folded into cost basis");
        assert_eq!(
            state.last_trade.as_ref().and_then(|t| t.trader.as_deref()),
            Some("tuna")
        );
    }

    #[test]
    fn test_sell_above_needs_stock() {
        let (mut state, config) = setup();
        assert!(set_trader_enabled(&mut state, "tuna", true));
        set_price(&mut state, &config, GoodKey::Kibble, 12.0);
        assert_eq!(run_traders(&mut state, &config, 6.0), 0);
        ledger::add_units(&mut state, GoodKey::Kibble, 1, 9.0);
        set_price(&mut state, &config, GoodKey::Kibble, 12.0);
        assert_eq!(run_traders(&mut state, &config, 6.0), 1);
        assert_eq!(state.held(GoodKey::Kibble), 0);
        // 12 * (1 - 0.005)
        assert_eq!(state.last_trade.as_ref().unwrap().unit_price, 11.94);
    }

    #[test]
    fn test_budget_accrues_fractionally() {
        let (mut state, config) = setup();
        assert!(set_trader_enabled(&mut state, "tuna", true));
        set_price(&mut state, &config, GoodKey::Kibble, 10.0);
        for _ in 0..20 {
            run_traders(&mut state, &config, 0.25);
        }
        // 5 s at 10/min
        let budget = state.trader_runtime["tuna"].budget;
        assert!((budget - 5.0 / 6.0).abs() < 1e-9, "budget {budget}");
    }

    #[test]
    fn test_buy_below_skips_when_inventory_is_full() {
        let (mut state, config) = setup();
        assert!(set_trader_enabled(&mut state, "tuna", true));
        ledger::add_units(&mut state, GoodKey::Kibble, Quantity::MAX, 0.0);
        state.coins = 1e6;
        set_price(&mut state, &config, GoodKey::Kibble, 9.0);
        assert_eq!(run_traders(&mut state, &config, 6.0), 0);
        assert_eq!(state.held(GoodKey::Kibble), Quantity::MAX);
        assert_eq!(state.coins, 1e6);
    }

    #[test]
    fn test_budget_ignores_heat() {
        let (mut cold, config) = setup();
        let mut hot = cold.clone();
        hot.unlock(FeatureKey::Heat);
        hot.heat = 95.0;
        for state in [&mut cold, &mut hot] {
            assert!(set_trader_enabled(state, "tuna", true));
            run_traders(state, &config, 3.0);
        }
        assert_eq!(cold.trader_runtime["tuna"].budget, hot.trader_runtime["tuna"].budget);
    }
}
