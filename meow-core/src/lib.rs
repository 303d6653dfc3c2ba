use wasm_bindgen::prelude::*;

pub mod config;
pub mod contracts;
pub mod error;
pub mod heat;
pub mod jobs;
pub mod ledger;
pub mod market;
pub mod prestige;
pub mod progression;
pub mod rng;
pub mod schemes;
pub mod state;
pub mod tick;
pub mod traders;
pub mod types;

pub use config::{ContractDef, Requirement, SimConfig};
pub use contracts::{
    ContractOutcome, ContractStatus, abandon_active_contract, accept_contract, active_contract,
    available_contracts, contract_status, is_active_contract_complete, redeem_active_contract,
};
pub use error::{ConfigError, LoadError, RuleError};
pub use jobs::assign_job;
pub use ledger::{average_cost, buy, can_buy, can_sell, sell, unrealized_pnl};
pub use prestige::{SeasonSummary, bust_run, end_season, set_district};
pub use progression::level_up;
pub use schemes::{activate_scheme, equip_scheme};
pub use state::{SimState, StateSnapshot};
pub use tick::{TickReport, tick};
pub use traders::{RuleKind, Trader, TraderRule, set_trader_enabled};
pub use types::*;

#[cfg(feature = "instrument")]
pub use instrument;

// ============================================================================
// WASM API - Simulation
// ============================================================================

/// One save plus the content it runs against. String ids from JS are parsed
/// here; unknown ids make the call return `false`.
#[wasm_bindgen]
pub struct Simulation {
    state: SimState,
    config: SimConfig,
}

fn js_error(err: impl std::fmt::Display) -> JsValue {
    js_sys::Error::new(&err.to_string()).into()
}

fn random_seed() -> u32 {
    (js_sys::Math::random() * 4_294_967_296.0) as u32
}

#[wasm_bindgen]
impl Simulation {
    /// New save with reference content. Without a seed, one is drawn from the
    /// host's `Math.random`.
    #[wasm_bindgen(constructor)]
    pub fn new(seed: Option<u32>) -> Self {
        // Better panic messages in browser console
        console_error_panic_hook::set_once();

        let config = SimConfig::default();
        let seed = seed.unwrap_or_else(random_seed);
        Self {
            state: SimState::new_save(&config, Some(seed)),
            config,
        }
    }

    /// New save against a custom JSON config.
    pub fn with_config(config_json: &str, seed: Option<u32>) -> Result<Simulation, JsValue> {
        console_error_panic_hook::set_once();
        let config = SimConfig::from_json(config_json).map_err(js_error)?;
        let seed = seed.unwrap_or_else(random_seed);
        Ok(Self {
            state: SimState::new_save(&config, Some(seed)),
            config,
        })
    }

    /// Restore a save produced by [`Simulation::save`].
    pub fn load(save_json: &str) -> Result<Simulation, JsValue> {
        console_error_panic_hook::set_once();
        let config = SimConfig::default();
        let state = SimState::from_json(save_json, &config).map_err(js_error)?;
        Ok(Self { state, config })
    }

    pub fn save(&self) -> Result<String, JsValue> {
        self.state.to_json().map_err(js_error)
    }

    pub fn tick(&mut self, dt: f64) -> TickReport {
        tick::tick(&mut self.state, &self.config, dt)
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot::capture(&self.state, &self.config)
    }

    // === Trading ===

    pub fn can_buy(&self, good: &str, qty: f64) -> bool {
        GoodKey::parse(good).is_some_and(|g| {
            ledger::can_buy(&self.state, &self.config, g, ledger::coerce_qty(qty))
        })
    }

    pub fn can_sell(&self, good: &str, qty: f64) -> bool {
        GoodKey::parse(good).is_some_and(|g| ledger::can_sell(&self.state, g, ledger::coerce_qty(qty)))
    }

    pub fn buy(&mut self, good: &str, qty: f64) -> bool {
        match GoodKey::parse(good) {
            Some(g) => ledger::buy(&mut self.state, &self.config, g, ledger::coerce_qty(qty)),
            None => false,
        }
    }

    pub fn sell(&mut self, good: &str, qty: f64) -> bool {
        match GoodKey::parse(good) {
            Some(g) => ledger::sell(&mut self.state, &self.config, g, ledger::coerce_qty(qty)),
            None => false,
        }
    }

    // === Contracts ===

    /// Offerable contracts as plain JS objects.
    pub fn available_contracts(&self) -> Result<JsValue, JsValue> {
        let offers: Vec<&ContractDef> = contracts::available_contracts(&self.state, &self.config);
        serde_wasm_bindgen::to_value(&offers).map_err(js_error)
    }

    /// The accepted contract, or `null` when none is active.
    pub fn active_contract(&self) -> Result<JsValue, JsValue> {
        match contracts::active_contract(&self.state, &self.config) {
            Some(def) => serde_wasm_bindgen::to_value(def).map_err(js_error),
            None => Ok(JsValue::NULL),
        }
    }

    pub fn accept_contract(&mut self, id: &str) -> bool {
        contracts::accept_contract(&mut self.state, &self.config, id)
    }

    pub fn abandon_contract(&mut self) -> bool {
        contracts::abandon_active_contract(&mut self.state, &self.config)
    }

    pub fn redeem_contract(&mut self) -> bool {
        contracts::redeem_active_contract(&mut self.state, &self.config)
    }

    pub fn is_contract_complete(&self) -> bool {
        contracts::is_active_contract_complete(&self.state, &self.config)
    }

    // === Cats, schemes, traders ===

    /// Assign a cat; `None` or an empty string takes it off duty.
    pub fn assign_job(&mut self, cat: &str, job: Option<String>) -> bool {
        let job = match job.as_deref() {
            None | Some("") => None,
            Some(key) => match JobKey::parse(key) {
                Some(j) => Some(j),
                None => return false,
            },
        };
        jobs::assign_job(&mut self.state, &self.config, cat, job)
    }

    pub fn equip_scheme(&mut self, slot: u32, scheme: Option<String>) -> bool {
        let id = match scheme.as_deref() {
            None | Some("") => None,
            Some(key) => match SchemeId::parse(key) {
                Some(s) => Some(s),
                None => return false,
            },
        };
        schemes::equip_scheme(&mut self.state, slot as usize, id)
    }

    pub fn activate_scheme(&mut self, scheme: &str) -> bool {
        SchemeId::parse(scheme)
            .is_some_and(|id| schemes::activate_scheme(&mut self.state, &self.config, id))
    }

    pub fn set_trader_enabled(&mut self, trader: &str, enabled: bool) -> bool {
        traders::set_trader_enabled(&mut self.state, trader, enabled)
    }

    // === Progression and prestige ===

    pub fn level_up(&mut self) -> bool {
        progression::level_up(&mut self.state, &self.config)
    }

    pub fn end_season(&mut self) -> SeasonSummary {
        prestige::end_season(&mut self.state, &self.config)
    }

    pub fn bust_run(&mut self) {
        prestige::bust_run(&mut self.state, &self.config);
    }

    pub fn set_district(&mut self, district: &str) -> bool {
        DistrictKey::parse(district)
            .is_some_and(|d| prestige::set_district(&mut self.state, &self.config, d))
    }

    pub fn set_strict_mode(&mut self, strict: bool) {
        self.state.meta.strict_mode = strict;
    }

    pub fn reseed(&mut self, seed: u32) {
        self.state.reseed(seed);
    }
}

impl Simulation {
    /// Wrap an existing state and config (native callers and tests).
    pub fn from_parts(mut state: SimState, config: SimConfig) -> Self {
        state.normalize(&config);
        Self { state, config }
    }

    pub fn state(&self) -> &SimState {
        &self.state
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_entry_points_reject_unknown_ids() {
        let mut sim = Simulation::new(Some(1));
        assert!(!sim.buy("tuna-cans", 1.0));
        assert!(!sim.sell("kibble", 1.0));
        assert!(!sim.assign_job("miso", Some("napping".into())));
        assert!(!sim.activate_scheme("zoomies"));
        assert!(!sim.set_district("moon"));
        assert!(!sim.equip_scheme(0, Some("zoomies".into())));
    }

    #[test]
    fn test_numeric_inputs_are_coerced() {
        let mut sim = Simulation::new(Some(1));
        assert!(!sim.buy("kibble", f64::NAN));
        assert!(!sim.buy("kibble", 0.7));
        assert!(sim.buy("kibble", 1.9));
        assert_eq!(sim.state().held(GoodKey::Kibble), 1);
        let report = sim.tick(f64::INFINITY);
        assert_eq!(report.dt, 0.0);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let mut sim = Simulation::new(Some(77));
        assert!(sim.buy("kibble", 2.0));
        for _ in 0..8 {
            sim.tick(0.25);
        }
        let json = sim.save().unwrap();
        let restored = Simulation::load(&json).unwrap();
        assert_eq!(restored.state().held(GoodKey::Kibble), 2);
        assert_eq!(restored.state().seed, Some(77));
        assert_eq!(restored.state().rng, sim.state().rng);
    }

    #[test]
    fn test_snapshot_reflects_state() {
        let mut sim = Simulation::new(Some(3));
        assert!(sim.assign_job("beans", Some("guarding".into())));
        let snap = sim.snapshot();
        assert_eq!(snap.goods.len(), 3);
        assert_eq!(snap.goal_target, Some(100.0));
        let beans = snap.cats.iter().find(|c| c.id == "beans").unwrap();
        assert_eq!(beans.job, Some(JobKey::Guarding));
        assert!(snap.unlocked.contains(&FeatureKey::Kibble));
        assert!(sim.assign_job("beans", Some(String::new())));
        assert_eq!(sim.state().job_of("beans"), None);
    }
}
