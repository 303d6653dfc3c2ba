//! Contracts: one optional timed objective at a time.
//!
//! ```text
//! None --accept--> Active --requirements met--> Complete --redeem--> None (Redeemed)
//!                  Active --deadline passed--> None (Failed, or Busted in strict mode)
//!                  Active --abandon--> None (Abandoned)
//! ```

use serde::{Deserialize, Serialize};
use tsify_next::Tsify;

use crate::config::{ContractDef, Requirement, SimConfig};
use crate::ledger;
use crate::prestige;
use crate::state::SimState;
use crate::types::{Coins, ContractId, FeatureKey, clamp0, round2};

const PRESTIGE_TAG: &str = "prestige";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub enum ContractStatus {
    Active,
    Complete,
    Expired,
}

/// How the most recent contract ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub enum ContractOutcome {
    Redeemed,
    Failed,
    Abandoned,
    /// Expired in strict mode; the run was reset.
    Busted,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContractsState {
    pub active_id: Option<ContractId>,
    pub started_at_sec: Option<f64>,
    pub start_coins: Option<Coins>,
    pub last_outcome: Option<ContractOutcome>,
}

/// Drop an active contract the config no longer knows and backfill missing
/// start markers.
pub(crate) fn normalize(state: &mut SimState, config: &SimConfig) {
    let known = state
        .contracts
        .active_id
        .as_deref()
        .is_some_and(|id| config.contract(id).is_some());
    if !known {
        state.contracts.active_id = None;
        state.contracts.started_at_sec = None;
        state.contracts.start_coins = None;
        return;
    }
    let (now, coins) = (state.sim_time, state.coins);
    let c = &mut state.contracts;
    c.started_at_sec = Some(c.started_at_sec.filter(|t| t.is_finite()).unwrap_or(now));
    c.start_coins = Some(c.start_coins.filter(|v| v.is_finite()).unwrap_or(coins));
}

/// Offerable contracts: none while one is active or heat is at the gate,
/// and prestige contracts only after the first season.
pub fn available_contracts<'a>(state: &SimState, config: &'a SimConfig) -> Vec<&'a ContractDef> {
    if state.contracts.active_id.is_some() || !state.is_unlocked(FeatureKey::Contract) {
        return Vec::new();
    }
    if state.is_unlocked(FeatureKey::Heat) && state.heat >= config.tuning.contract_heat_gate {
        return Vec::new();
    }
    let veteran = state.meta.seasons >= 1;
    config
        .contracts
        .iter()
        .filter(|c| veteran || !c.has_tag(PRESTIGE_TAG))
        .collect()
}

pub fn accept_contract(state: &mut SimState, config: &SimConfig, id: &str) -> bool {
    if !available_contracts(state, config).iter().any(|c| c.id == id) {
        return false;
    }
    state.contracts.active_id = Some(id.to_string());
    state.contracts.started_at_sec = Some(state.sim_time);
    state.contracts.start_coins = Some(state.coins);

    #[cfg(feature = "instrument")]
    tracing::info!(target: "contract", t = state.sim_time, id = id, action = "accept");

    true
}

pub fn active_contract<'a>(state: &SimState, config: &'a SimConfig) -> Option<&'a ContractDef> {
    config.contract(state.contracts.active_id.as_deref()?)
}

fn requirement_met(state: &SimState, req: &Requirement) -> bool {
    match req {
        Requirement::EarnCoins { coins } => {
            let start = state.contracts.start_coins.unwrap_or(state.coins);
            state.coins - start >= *coins
        }
        Requirement::DeliverGood { good, qty } => state.held(*good) >= *qty,
    }
}

fn elapsed(state: &SimState) -> f64 {
    let start = state.contracts.started_at_sec.unwrap_or(state.sim_time);
    state.sim_time - start
}

pub fn time_left(state: &SimState, config: &SimConfig) -> Option<f64> {
    let def = active_contract(state, config)?;
    Some(clamp0(def.deadline_sec - elapsed(state)))
}

/// Expired wins over complete: a late contract cannot be redeemed.
pub fn contract_status(state: &SimState, config: &SimConfig) -> Option<ContractStatus> {
    let def = active_contract(state, config)?;
    if elapsed(state) > def.deadline_sec {
        return Some(ContractStatus::Expired);
    }
    if def.requirements.iter().all(|r| requirement_met(state, r)) {
        Some(ContractStatus::Complete)
    } else {
        Some(ContractStatus::Active)
    }
}

pub fn is_active_contract_complete(state: &SimState, config: &SimConfig) -> bool {
    contract_status(state, config) == Some(ContractStatus::Complete)
}

fn clear_active(state: &mut SimState, outcome: ContractOutcome) {
    state.contracts.active_id = None;
    state.contracts.started_at_sec = None;
    state.contracts.start_coins = None;
    state.contracts.last_outcome = Some(outcome);
}

fn charge_penalty(state: &mut SimState, penalty: Coins) {
    state.coins = round2(clamp0(state.coins - penalty));
}

/// Give up the active contract and pay its penalty.
pub fn abandon_active_contract(state: &mut SimState, config: &SimConfig) -> bool {
    let Some(def) = active_contract(state, config) else {
        return false;
    };
    charge_penalty(state, def.penalty_coins);

    #[cfg(feature = "instrument")]
    tracing::info!(target: "contract", t = state.sim_time, id = def.id.as_str(), action = "abandon");

    clear_active(state, ContractOutcome::Abandoned);
    true
}

/// Hand in a complete contract: delivered goods leave inventory oldest-lot
/// first and the reward is paid.
pub fn redeem_active_contract(state: &mut SimState, config: &SimConfig) -> bool {
    if !is_active_contract_complete(state, config) {
        return false;
    }
    let Some(def) = active_contract(state, config) else {
        return false;
    };
    for req in &def.requirements {
        if let Requirement::DeliverGood { good, qty } = req {
            ledger::remove_units(state, *good, *qty);
        }
    }
    state.coins = round2(state.coins + def.reward_coins);

    #[cfg(feature = "instrument")]
    tracing::info!(target: "contract", t = state.sim_time, id = def.id.as_str(), action = "redeem");

    clear_active(state, ContractOutcome::Redeemed);
    true
}

/// Settle an expired contract. Runs once per tick.
pub fn check_expiry(state: &mut SimState, config: &SimConfig) -> Option<ContractOutcome> {
    if contract_status(state, config) != Some(ContractStatus::Expired) {
        return None;
    }
    let def = active_contract(state, config)?;

    #[cfg(feature = "instrument")]
    tracing::info!(
        target: "contract",
        t = state.sim_time,
        id = def.id.as_str(),
        action = if state.meta.strict_mode { "bust" } else { "expire" },
    );

    let outcome = if state.meta.strict_mode {
        prestige::bust_run(state, config);
        ContractOutcome::Busted
    } else {
        charge_penalty(state, def.penalty_coins);
        ContractOutcome::Failed
    };
    clear_active(state, outcome);
    Some(outcome)
}
