//! Cats and the jobs they work.

use serde::{Deserialize, Serialize};
use tsify_next::Tsify;

use crate::config::SimConfig;
use crate::ledger;
use crate::state::SimState;
use crate::types::{CatId, FeatureKey, GoodKey, JobKey, Quantity, SchemeId, clamp0};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Tsify)]
#[serde(rename_all = "camelCase")]
pub struct Cat {
    pub id: CatId,
    pub name: String,
}

/// Put a cat on `job`, or take it off duty with `None`.
///
/// Re-assigning the current job succeeds without change. Moving frees the
/// old seat first, so a cat can always move out of a full job into a free
/// one. A full target job fails and leaves the cat where it was.
pub fn assign_job(state: &mut SimState, config: &SimConfig, cat: &str, job: Option<JobKey>) -> bool {
    if !state.cats.iter().any(|c| c.id == cat) {
        return false;
    }
    let Some(job) = job else {
        state.job_assignments.remove(cat);
        return true;
    };
    if state.job_of(cat) == Some(job) {
        return true;
    }
    if state.job_count(job) >= config.job_capacity(job) {
        return false;
    }
    state.job_assignments.insert(cat.to_string(), job);
    true
}

/// Kibble produced by cats on the production job over `dt` seconds. Whole
/// units land as zero-cost lots; the fraction carries to the next tick.
pub fn run_production(state: &mut SimState, config: &SimConfig, dt: f64) -> Quantity {
    let workers = state.job_count(JobKey::Production);
    if workers == 0 || !state.is_unlocked(FeatureKey::Kibble) {
        return 0;
    }
    let t = &config.tuning;
    let mut rate = t.production_per_sec * workers as f64;
    if state.scheme_active(SchemeId::Hustle) {
        rate *= t.hustle_mult;
    }
    let carry = clamp0(state.production_carry + rate * clamp0(dt));
    let units = carry.floor();
    state.production_carry = carry - units;
    let units = units as Quantity;
    ledger::add_units(state, GoodKey::Kibble, units, 0.0);
    units
}
