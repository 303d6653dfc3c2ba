//! The tick orchestrator.
//!
//! One call advances the simulation by `dt` seconds through a fixed
//! pipeline. Order matters: prices move before traders read them, heat
//! decays before the event check, and history samples the end state.
//!
//! 1. normalize
//! 2. sim clock + good unlocks
//! 3. price engine (1 Hz)
//! 4. pressure decay + displayed price recompute
//! 5. production
//! 6. traders
//! 7. scheme timers
//! 8. heat decay, then the once-per-second event check
//! 9. contract expiry
//! 10. history

use serde::{Deserialize, Serialize};
use tsify_next::Tsify;

use crate::config::SimConfig;
use crate::contracts::{self, ContractOutcome};
use crate::heat::{self, EventRecord};
use crate::jobs;
use crate::market;
use crate::progression;
use crate::schemes;
use crate::state::SimState;
use crate::traders;
use crate::types::{GoodKey, Quantity, SeriesKey, clamp_finite};

/// What happened during one tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct TickReport {
    /// The sanitised dt actually applied.
    pub dt: f64,
    pub price_steps: u32,
    pub produced: Quantity,
    pub trader_fills: u32,
    pub event: Option<EventRecord>,
    pub contract_outcome: Option<ContractOutcome>,
}

/// Advance `state` by `dt` seconds. Non-finite dt counts as zero; dt is
/// clamped to `[0, max_dt]`. A zero dt re-applies unlocks and recomputes
/// displayed prices without advancing any timer.
pub fn tick(state: &mut SimState, config: &SimConfig, dt: f64) -> TickReport {
    let dt = clamp_finite(dt, 0.0, config.tuning.max_dt);
    let mut report = TickReport {
        dt,
        ..Default::default()
    };

    state.normalize(config);

    state.sim_time += dt;
    progression::apply_unlocks(state, config);

    report.price_steps = market::advance(state, config, dt);

    market::decay_pressure(state, config, dt);
    market::recompute(state, config);

    if dt > 0.0 {
        report.produced = jobs::run_production(state, config, dt);
        report.trader_fills = traders::run_traders(state, config, dt);
        schemes::tick_schemes(state, dt);
        heat::decay_heat(state, config, dt);
        report.event = heat::maybe_trigger_event(state, config);
    }

    report.contract_outcome = contracts::check_expiry(state, config);

    if dt > 0.0 {
        record_history(state, config);
    }
    report
}

/// Append the current prices, heat and coins to their rolling series.
pub fn record_history(state: &mut SimState, config: &SimConfig) {
    let len = config.tuning.history_len;
    let mut samples: Vec<(SeriesKey, f64)> = GoodKey::ALL
        .into_iter()
        .map(|good| (SeriesKey::Price(good), state.price(good)))
        .collect();
    samples.push((SeriesKey::Heat, state.heat));
    samples.push((SeriesKey::Coins, state.coins));

    for (key, value) in samples {
        let series = state.history.entry(key).or_default();
        series.push_back(value);
        while series.len() > len {
            series.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FeatureKey;

    fn setup() -> (SimState, SimConfig) {
        let config = SimConfig::default();
        let state = SimState::new_save(&config, Some(20));
        (state, config)
    }

    #[test]
    fn test_dt_is_sanitised() {
        let (mut state, config) = setup();
        assert_eq!(tick(&mut state, &config, f64::NAN).dt, 0.0);
        assert_eq!(tick(&mut state, &config, -4.0).dt, 0.0);
        assert_eq!(tick(&mut state, &config, 99.0).dt, 5.0);
        assert_eq!(state.sim_time, 5.0);
    }

    #[test]
    fn test_zero_dt_only_recomputes() {
        let (mut state, config) = setup();
        state.coins = 120.0;
        let report = tick(&mut state, &config, 0.0);
        assert_eq!(report.price_steps, 0);
        assert_eq!(state.sim_time, 0.0);
        assert!(state.is_unlocked(FeatureKey::Catnip));
        assert!(state.history.is_empty());
    }

    #[test]
    fn test_history_is_bounded() {
        let (mut state, config) = setup();
        for _ in 0..50 {
            tick(&mut state, &config, 0.25);
        }
        assert_eq!(state.history.len(), 5);
        for series in state.history.values() {
            assert_eq!(series.len(), 30);
        }
        let kibble = &state.history[&SeriesKey::Price(GoodKey::Kibble)];
        assert_eq!(kibble.back().copied(), Some(state.price(GoodKey::Kibble)));
    }

    #[test]
    fn test_price_steps_follow_whole_seconds() {
        let (mut state, config) = setup();
        let steps: u32 = (0..12)
            .map(|_| tick(&mut state, &config, 0.25).price_steps)
            .sum();
        assert_eq!(steps, 3);
    }
}
