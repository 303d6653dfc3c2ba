//! Heat: a risk meter fed by trading that drives random setbacks.

use serde::{Deserialize, Serialize};
use tsify_next::Tsify;

use crate::config::{SimConfig, Tuning};
use crate::ledger;
use crate::state::{HEAT_MAX, SimState};
use crate::types::{
    Coins, EventKind, FeatureKey, GoodKey, JobKey, Quantity, SchemeId, clamp_finite, clamp0,
    round2,
};

const TAX_MIN_PCT: f64 = 0.04;
const TAX_MAX_PCT: f64 = 0.10;
/// Heat points per extra percent of tax.
const TAX_HEAT_DIVISOR: f64 = 2000.0;
const TAX_HEAT_DELTA: f64 = -6.0;
const RIVAL_UNITS: Quantity = 1;
const RIVAL_HEAT_DELTA: f64 = 3.0;
const CONFISCATION_UNITS: Quantity = 2;
const CONFISCATION_HEAT_DELTA: f64 = -10.0;

/// One heat event as logged in `state.events`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub kind: EventKind,
    pub at_sec: u64,
    /// A Nine Lives charge absorbed the event; nothing was lost.
    pub mitigated: bool,
    pub coins_lost: Coins,
    pub good: Option<GoodKey>,
    pub units_lost: Quantity,
}

fn shift_heat(state: &mut SimState, delta: f64) {
    state.heat = clamp_finite(state.heat + delta, 0.0, HEAT_MAX);
}

/// Heat from trading `qty` units of `good`. No-op until heat unlocks.
pub fn add_trade_heat(state: &mut SimState, config: &SimConfig, good: GoodKey, qty: Quantity) {
    if qty == 0 || !state.is_unlocked(FeatureKey::Heat) {
        return;
    }
    let t = &config.tuning;
    let mut mult = 1.0;
    if state.has_job(JobKey::Guarding) {
        mult *= t.guard_heat_mult;
    }
    if state.scheme_active(SchemeId::PurrSuasion) {
        mult *= t.purr_heat_mult;
    }
    shift_heat(state, mult * config.heat_base(good) * qty as f64);
}

/// Linear cool-down over `dt` seconds; faster while a guard is on duty.
pub fn decay_heat(state: &mut SimState, config: &SimConfig, dt: f64) {
    let t = &config.tuning;
    let rate = if state.has_job(JobKey::Guarding) {
        t.heat_decay_guarded_per_sec
    } else {
        t.heat_decay_per_sec
    };
    shift_heat(state, -rate * clamp0(dt));
}

/// Per-second event probability at `heat`.
pub fn event_chance(heat: f64, guarded: bool, t: &Tuning) -> f64 {
    let h = clamp_finite(heat, 0.0, HEAT_MAX);
    let base = clamp_finite((h - t.event_heat_floor) / t.event_heat_span, 0.0, t.event_max_chance);
    let mult = if guarded { t.guard_event_mult } else { 1.0 };
    clamp_finite(base * mult, 0.0, t.event_max_chance)
}

/// Run the event check at most once per integer second of sim time.
///
/// Draw order: trigger roll, kind roll, then (confiscation only) the target
/// roll. A Nine Lives charge is checked after the kind is known and before
/// any effect, so a shielded event still consumes its draws.
pub fn maybe_trigger_event(state: &mut SimState, config: &SimConfig) -> Option<EventRecord> {
    let sec = state.sim_time.floor() as u64;
    if state.last_event_sec == Some(sec) {
        return None;
    }
    state.last_event_sec = Some(sec);

    if !state.is_unlocked(FeatureKey::Heat) {
        return None;
    }
    let p = event_chance(state.heat, state.has_job(JobKey::Guarding), &config.tuning);
    if p <= 0.0 || !state.rng().chance(&["event"], p) {
        return None;
    }
    let kind = EventKind::from_roll(state.rng().uniform01(&["eventKind"]));

    let shield = state.schemes.entry(SchemeId::NineLives).or_default();
    let record = if shield.charges > 0 {
        shield.charges -= 1;
        EventRecord {
            kind,
            at_sec: sec,
            mitigated: true,
            coins_lost: 0.0,
            good: None,
            units_lost: 0,
        }
    } else {
        apply_event(state, kind, sec)
    };

    #[cfg(feature = "instrument")]
    tracing::info!(
        target: "heat_event",
        t = state.sim_time,
        kind = kind.as_str(),
        mitigated = record.mitigated,
        coins_lost = record.coins_lost,
        units_lost = record.units_lost,
        heat = state.heat,
    );

    state.events.insert(0, record.clone());
    state.events.truncate(config.tuning.event_log_len);
    Some(record)
}

fn apply_event(state: &mut SimState, kind: EventKind, sec: u64) -> EventRecord {
    let mut record = EventRecord {
        kind,
        at_sec: sec,
        mitigated: false,
        coins_lost: 0.0,
        good: None,
        units_lost: 0,
    };
    match kind {
        EventKind::Tax => {
            let pct = clamp_finite(
                TAX_MIN_PCT + state.heat / TAX_HEAT_DIVISOR,
                TAX_MIN_PCT,
                TAX_MAX_PCT,
            );
            let loss = (state.coins * pct).floor();
            state.coins = round2(clamp0(state.coins - loss));
            record.coins_lost = loss;
            shift_heat(state, TAX_HEAT_DELTA);
        }
        EventKind::Rival => {
            // Ties keep the earlier good.
            let target = GoodKey::ALL
                .into_iter()
                .filter(|g| state.held(*g) > 0)
                .fold(None, |best: Option<GoodKey>, g| match best {
                    Some(b) if state.price(b) >= state.price(g) => Some(b),
                    _ => Some(g),
                });
            if let Some(good) = target {
                let (removed, _) = ledger::remove_units(state, good, RIVAL_UNITS);
                record.good = Some(good);
                record.units_lost = removed;
            }
            shift_heat(state, RIVAL_HEAT_DELTA);
        }
        EventKind::Confiscation => {
            let held: Vec<GoodKey> = GoodKey::ALL
                .into_iter()
                .filter(|g| state.held(*g) > 0)
                .collect();
            if !held.is_empty() {
                let good = held[state.rng().index(&["confiscate"], held.len())];
                let (removed, _) = ledger::remove_units(state, good, CONFISCATION_UNITS);
                record.good = Some(good);
                record.units_lost = removed;
            }
            shift_heat(state, CONFISCATION_HEAT_DELTA);
        }
    }
    record
}
