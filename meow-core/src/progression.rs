//! Good unlocks by coin threshold and the goal ladder.

use crate::config::{GoalDef, SimConfig};
use crate::state::SimState;

/// Unlock every good whose coin threshold has been reached. Unlocks are
/// monotonic within a run.
pub fn apply_unlocks(state: &mut SimState, config: &SimConfig) {
    for def in &config.goods {
        let reached = match def.unlock_coins {
            None => true,
            Some(threshold) => state.coins >= threshold,
        };
        if reached {
            state.unlock(def.key.feature());
        }
    }
}

/// The goal the player is currently working toward; `None` past the top.
pub fn current_goal<'a>(state: &SimState, config: &'a SimConfig) -> Option<&'a GoalDef> {
    config.goals.get(state.level as usize)
}

/// Climb one rung once coins reach the current goal, unlocking its features.
/// Coins are not spent.
pub fn level_up(state: &mut SimState, config: &SimConfig) -> bool {
    let Some(goal) = current_goal(state, config) else {
        return false;
    };
    if state.coins < goal.target_coins {
        return false;
    }
    state.level += 1;
    for feature in &goal.unlocks {
        state.unlock(*feature);
    }
    true
}
