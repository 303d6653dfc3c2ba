//! Seasons: cash out a run for whiskers, or bust it for nothing.

use serde::{Deserialize, Serialize};
use tsify_next::Tsify;

use crate::config::SimConfig;
use crate::market;
use crate::state::SimState;
use crate::types::{Coins, DistrictKey, clamp0};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct SeasonSummary {
    pub whiskers_awarded: f64,
    pub total_whiskers: f64,
    pub seasons: u32,
}

/// `floor(coins / coins_per_whisker)`.
pub fn whiskers_for(coins: Coins, config: &SimConfig) -> f64 {
    (clamp0(coins) / config.tuning.coins_per_whisker).floor()
}

/// Award whiskers, advance the season counter, apply veteran perks, and
/// reset the run.
pub fn end_season(state: &mut SimState, config: &SimConfig) -> SeasonSummary {
    let award = whiskers_for(state.coins, config);
    let meta = &mut state.meta;
    meta.whiskers += award;
    meta.seasons += 1;
    // Veteran perks from the first completed season on.
    meta.scheme_slots = meta.scheme_slots.max(config.tuning.prestige_scheme_slots);
    meta.districts_unlocked.insert(DistrictKey::Uptown);
    let summary = SeasonSummary {
        whiskers_awarded: award,
        total_whiskers: meta.whiskers,
        seasons: meta.seasons,
    };

    #[cfg(feature = "instrument")]
    tracing::info!(
        target: "season",
        t = state.sim_time,
        coins = state.coins,
        whiskers_awarded = award,
        seasons = summary.seasons,
    );

    state.reset_run(config);
    summary
}

/// Abandon the run: same reset as a season end, with no award.
pub fn bust_run(state: &mut SimState, config: &SimConfig) {
    state.reset_run(config);
}

/// Move trading to another unlocked district. Latent prices restart under
/// the district's multipliers; the PRNG stream continues.
pub fn set_district(state: &mut SimState, config: &SimConfig, district: DistrictKey) -> bool {
    if !state.meta.districts_unlocked.contains(&district) {
        return false;
    }
    if state.meta.district != district {
        market::switch_district(state, config, district);
    }
    true
}
