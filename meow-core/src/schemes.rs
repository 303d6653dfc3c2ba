//! Schemes: equippable active abilities with cooldowns.

use serde::{Deserialize, Serialize};
use tsify_next::Tsify;

use crate::config::SimConfig;
use crate::market;
use crate::state::{HEAT_MAX, SimState};
use crate::types::{FeatureKey, SchemeId, clamp_finite, clamp0};

/// Pressure multiplier applied by Market Nap.
const NAP_PRESSURE_FACTOR: f64 = 0.5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, Tsify)]
#[serde(default, rename_all = "camelCase")]
pub struct SchemeRuntime {
    pub cooldown_left: f64,
    pub active_left: f64,
    /// Banked Nine Lives shields.
    pub charges: u32,
}

impl SchemeRuntime {
    pub fn sanitize(&mut self) {
        self.cooldown_left = clamp0(self.cooldown_left);
        self.active_left = clamp0(self.active_left);
    }
}

/// Put `id` into loadout `slot`, or clear the slot with `None`. A scheme
/// already sitting in another slot moves rather than duplicates.
pub fn equip_scheme(state: &mut SimState, slot: usize, id: Option<SchemeId>) -> bool {
    let slots = state.meta.scheme_slots.max(1) as usize;
    if slot >= slots || !state.is_unlocked(FeatureKey::Schemes) {
        return false;
    }
    if state.scheme_loadout.len() < slots {
        state.scheme_loadout.resize(slots, None);
    }
    if let Some(id) = id {
        for s in state.scheme_loadout.iter_mut() {
            if *s == Some(id) {
                *s = None;
            }
        }
    }
    state.scheme_loadout[slot] = id;
    true
}

pub fn is_equipped(state: &SimState, id: SchemeId) -> bool {
    let slots = state.meta.scheme_slots as usize;
    state
        .scheme_loadout
        .iter()
        .take(slots)
        .any(|s| *s == Some(id))
}

/// Fire a scheme. Fails without mutation when schemes are locked, the scheme
/// is not equipped, it is still cooling down or its precondition fails.
pub fn activate_scheme(state: &mut SimState, config: &SimConfig, id: SchemeId) -> bool {
    if !state.is_unlocked(FeatureKey::Schemes) || !is_equipped(state, id) {
        return false;
    }
    let Some(def) = config.scheme(id) else {
        return false;
    };
    let runtime = state.schemes.get(&id).copied().unwrap_or_default();
    if runtime.cooldown_left > 0.0 {
        return false;
    }
    if id == SchemeId::CoolWhiskers && !state.is_unlocked(FeatureKey::Heat) {
        return false;
    }

    match id {
        SchemeId::Hustle | SchemeId::PricePounce | SchemeId::PurrSuasion => {}
        SchemeId::NineLives => {
            state.schemes.entry(id).or_default().charges += 1;
        }
        SchemeId::CoolWhiskers => {
            state.heat = clamp_finite(
                state.heat - config.tuning.cool_whiskers_heat_drop,
                0.0,
                HEAT_MAX,
            );
        }
        SchemeId::MarketNap => {
            market::scale_pressure(state, config, NAP_PRESSURE_FACTOR);
            market::recompute(state, config);
        }
    }

    let runtime = state.schemes.entry(id).or_default();
    runtime.cooldown_left = def.cooldown_sec;
    runtime.active_left = def.duration_sec;

    #[cfg(feature = "instrument")]
    tracing::info!(
        target: "scheme",
        t = state.sim_time,
        scheme = id.as_str(),
        cooldown = def.cooldown_sec,
        duration = def.duration_sec,
    );

    true
}

/// Count every timer down by `dt`, floored at zero.
pub fn tick_schemes(state: &mut SimState, dt: f64) {
    let dt = clamp0(dt);
    for runtime in state.schemes.values_mut() {
        runtime.cooldown_left = clamp0(runtime.cooldown_left - dt);
        runtime.active_left = clamp0(runtime.active_left - dt);
    }
}
