use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};
use tsify_next::Tsify;

use crate::config::SimConfig;
use crate::contracts::{self, ContractOutcome, ContractStatus, ContractsState};
use crate::error::LoadError;
use crate::heat::EventRecord;
use crate::jobs::Cat;
use crate::ledger::{self, LastTrade, Lot};
use crate::market::{self, LatentState, MarketEntry};
use crate::rng::{FALLBACK_SEED, Prng};
use crate::schemes::SchemeRuntime;
use crate::traders::{Trader, TraderRuntime};
use crate::types::{
    CatId, Coins, DistrictKey, FeatureKey, GoodKey, JobKey, Quantity, Regime, SchemeId,
    SeriesKey, TraderId, clamp_finite, clamp0, finite_or_zero, round2,
};

pub const HEAT_MAX: f64 = 100.0;

// ============================================================================
// Meta - survives prestige and bust
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
#[serde(default, rename_all = "camelCase")]
pub struct Meta {
    pub whiskers: f64,
    pub seasons: u32,
    pub scheme_slots: u32,
    pub district: DistrictKey,
    pub districts_unlocked: BTreeSet<DistrictKey>,
    /// Contract expiry busts the whole run instead of charging a penalty.
    pub strict_mode: bool,
}

impl Default for Meta {
    fn default() -> Self {
        Self {
            whiskers: 0.0,
            seasons: 0,
            scheme_slots: 1,
            district: DistrictKey::Alley,
            districts_unlocked: BTreeSet::from([DistrictKey::Alley]),
            strict_mode: false,
        }
    }
}

// ============================================================================
// SimState - the single owned aggregate
// ============================================================================

/// Everything one save needs. Serialises to a JSON blob with camelCase keys;
/// fields missing from an older blob fall back to defaults and are then
/// repaired by [`SimState::normalize`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimState {
    pub sim_time: f64,
    pub seed: Option<u32>,
    /// Evolving PRNG state; derived from `seed` when absent.
    pub rng: Option<Prng>,
    pub coins: Coins,
    pub inventory: BTreeMap<GoodKey, Quantity>,
    pub lots: BTreeMap<GoodKey, VecDeque<Lot>>,
    pub market: BTreeMap<GoodKey, MarketEntry>,
    pub market_latent: BTreeMap<GoodKey, LatentState>,
    /// Fractional-second carry for the 1 Hz price engine, in `[0, 1)`.
    pub price_clock: f64,
    pub heat: f64,
    pub unlocked: BTreeMap<FeatureKey, bool>,
    pub level: u32,
    pub history: BTreeMap<SeriesKey, VecDeque<f64>>,
    pub contracts: ContractsState,
    pub schemes: BTreeMap<SchemeId, SchemeRuntime>,
    pub scheme_loadout: Vec<Option<SchemeId>>,
    pub traders: Vec<Trader>,
    pub trader_runtime: BTreeMap<TraderId, TraderRuntime>,
    pub cats: Vec<Cat>,
    /// Cats absent from the map are idle.
    pub job_assignments: BTreeMap<CatId, JobKey>,
    pub production_carry: f64,
    /// Newest first.
    pub events: Vec<EventRecord>,
    pub last_event_sec: Option<u64>,
    pub meta: Meta,
    pub last_trade: Option<LastTrade>,
}

impl Default for SimState {
    fn default() -> Self {
        Self {
            sim_time: 0.0,
            seed: None,
            rng: None,
            coins: 50.0,
            inventory: BTreeMap::new(),
            lots: BTreeMap::new(),
            market: BTreeMap::new(),
            market_latent: BTreeMap::new(),
            price_clock: 0.0,
            heat: 0.0,
            unlocked: BTreeMap::new(),
            level: 0,
            history: BTreeMap::new(),
            contracts: ContractsState::default(),
            schemes: BTreeMap::new(),
            scheme_loadout: Vec::new(),
            traders: Vec::new(),
            trader_runtime: BTreeMap::new(),
            cats: Vec::new(),
            job_assignments: BTreeMap::new(),
            production_carry: 0.0,
            events: Vec::new(),
            last_event_sec: None,
            meta: Meta::default(),
            last_trade: None,
        }
    }
}

impl SimState {
    /// Fresh save with starter content and displayed prices ready.
    pub fn new_save(config: &SimConfig, seed: Option<u32>) -> Self {
        let mut state = SimState {
            seed,
            coins: config.tuning.start_coins,
            ..Default::default()
        };
        state.normalize(config);
        state
    }

    /// Restore a save blob and repair it against `config`.
    pub fn from_json(json: &str, config: &SimConfig) -> Result<Self, LoadError> {
        let mut state: SimState = serde_json::from_str(json)?;
        state.normalize(config);
        Ok(state)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Fill lazy defaults and clamp every field back into its invariant
    /// range. Idempotent; runs on load and at the start of every tick.
    pub fn normalize(&mut self, config: &SimConfig) {
        self.sim_time = clamp0(self.sim_time);
        let seed = *self.seed.get_or_insert(FALLBACK_SEED);
        self.rng.get_or_insert_with(|| Prng::from_seed(seed));
        self.coins = round2(clamp0(self.coins));
        self.heat = clamp_finite(self.heat, 0.0, HEAT_MAX);
        self.price_clock = unit_carry(self.price_clock);
        self.production_carry = unit_carry(self.production_carry);

        for feature in FeatureKey::ALL {
            let flag = self.unlocked.entry(feature).or_insert(false);
            *flag |= feature.unlocked_by_default();
        }
        self.level = self.level.min(config.goals.len() as u32);

        for good in GoodKey::ALL {
            let held = *self.inventory.entry(good).or_insert(0);
            ledger::reconcile_lots(self.lots.entry(good).or_default(), held);
        }

        self.normalize_meta();
        market::ensure_goods(self, config);
        market::sanitize(self, config);
        market::recompute(self, config);

        for id in SchemeId::ALL {
            self.schemes.entry(id).or_default().sanitize();
        }
        self.normalize_loadout();

        if self.cats.is_empty() {
            self.cats = config.cats.clone();
        }
        if self.traders.is_empty() {
            self.traders = config.traders.clone();
        }
        let trader_ids: BTreeSet<&str> = self.traders.iter().map(|t| t.id.as_str()).collect();
        self.trader_runtime
            .retain(|id, _| trader_ids.contains(id.as_str()));
        for trader in &self.traders {
            let runtime = self.trader_runtime.entry(trader.id.clone()).or_default();
            runtime.budget = clamp0(runtime.budget);
        }
        self.normalize_jobs(config);

        let len = config.tuning.history_len;
        for series in self.history.values_mut() {
            for v in series.iter_mut() {
                *v = finite_or_zero(*v);
            }
            while series.len() > len {
                series.pop_front();
            }
        }
        self.events.truncate(config.tuning.event_log_len);
        contracts::normalize(self, config);
    }

    fn normalize_meta(&mut self) {
        let meta = &mut self.meta;
        meta.whiskers = clamp0(meta.whiskers).floor();
        meta.scheme_slots = meta.scheme_slots.max(1);
        meta.districts_unlocked.insert(DistrictKey::Alley);
        if !meta.districts_unlocked.contains(&meta.district) {
            meta.district = DistrictKey::Alley;
        }
    }

    fn normalize_loadout(&mut self) {
        let slots = self.meta.scheme_slots as usize;
        self.scheme_loadout.resize(slots, None);
        let mut seen = BTreeSet::new();
        for slot in self.scheme_loadout.iter_mut() {
            if slot.is_some_and(|id| !seen.insert(id)) {
                *slot = None;
            }
        }
    }

    /// Drop assignments for unknown cats and seats beyond job capacity,
    /// keeping the earliest cats in id order.
    fn normalize_jobs(&mut self, config: &SimConfig) {
        let cat_ids: BTreeSet<&str> = self.cats.iter().map(|c| c.id.as_str()).collect();
        let mut seated: BTreeMap<JobKey, u32> = BTreeMap::new();
        self.job_assignments.retain(|cat, job| {
            if !cat_ids.contains(cat.as_str()) {
                return false;
            }
            let count = seated.entry(*job).or_insert(0);
            if *count >= config.job_capacity(*job) {
                return false;
            }
            *count += 1;
            true
        });
    }

    /// Reset everything run-scoped. Keeps `meta`, `seed`, `rng`, the
    /// player's cat and trader rosters, and the sim clock (which only moves
    /// forward).
    pub fn reset_run(&mut self, config: &SimConfig) {
        let previous = std::mem::take(self);
        *self = SimState {
            sim_time: previous.sim_time,
            last_event_sec: previous.last_event_sec,
            seed: previous.seed,
            rng: previous.rng,
            meta: previous.meta,
            cats: previous.cats,
            traders: previous.traders,
            coins: config.tuning.start_coins,
            ..Default::default()
        };
        self.normalize(config);
    }

    // === Queries ===

    /// Restart the PRNG from a new seed.
    pub fn reseed(&mut self, seed: u32) {
        self.seed = Some(seed);
        self.rng = Some(Prng::from_seed(seed));
    }

    pub fn rng(&mut self) -> &mut Prng {
        let seed = self.seed.unwrap_or(FALLBACK_SEED);
        self.rng.get_or_insert_with(|| Prng::from_seed(seed))
    }

    pub fn is_unlocked(&self, feature: FeatureKey) -> bool {
        self.unlocked
            .get(&feature)
            .copied()
            .unwrap_or_else(|| feature.unlocked_by_default())
    }

    pub fn unlock(&mut self, feature: FeatureKey) {
        self.unlocked.insert(feature, true);
    }

    pub fn held(&self, good: GoodKey) -> Quantity {
        self.inventory.get(&good).copied().unwrap_or(0)
    }

    pub fn price(&self, good: GoodKey) -> f64 {
        self.market.get(&good).map_or(1.0, |m| m.price)
    }

    pub fn pressure(&self, good: GoodKey) -> f64 {
        self.market.get(&good).map_or(0.0, |m| m.pressure)
    }

    pub fn job_of(&self, cat: &str) -> Option<JobKey> {
        self.job_assignments.get(cat).copied()
    }

    /// Number of cats currently assigned to `job`.
    pub fn job_count(&self, job: JobKey) -> u32 {
        self.job_assignments.values().filter(|j| **j == job).count() as u32
    }

    pub fn has_job(&self, job: JobKey) -> bool {
        self.job_assignments.values().any(|j| *j == job)
    }

    pub fn scheme_active(&self, id: SchemeId) -> bool {
        self.schemes.get(&id).is_some_and(|s| s.active_left > 0.0)
    }

    pub fn total_lot_qty(&self, good: GoodKey) -> u64 {
        self.lots
            .get(&good)
            .map_or(0, |lots| lots.iter().map(|l| l.qty as u64).sum())
    }
}

fn unit_carry(v: f64) -> f64 {
    if v.is_finite() && (0.0..1.0).contains(&v) {
        v
    } else {
        0.0
    }
}

// ============================================================================
// Serializable State Snapshot for JS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub sim_time: f64,
    pub coins: f64,
    pub heat: f64,
    pub level: u32,
    pub goal_target: Option<f64>,
    pub goods: Vec<GoodSnapshot>,
    pub unlocked: Vec<FeatureKey>,
    pub contract: Option<ContractSnapshot>,
    pub last_contract_outcome: Option<ContractOutcome>,
    pub schemes: Vec<SchemeSnapshot>,
    pub scheme_loadout: Vec<Option<SchemeId>>,
    pub cats: Vec<CatSnapshot>,
    pub traders: Vec<TraderSnapshot>,
    pub events: Vec<EventRecord>,
    pub history: Vec<SeriesSnapshot>,
    pub meta: Meta,
    pub last_trade: Option<LastTrade>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct GoodSnapshot {
    pub good: GoodKey,
    pub unlocked: bool,
    pub price: f64,
    pub buy_price: f64,
    pub sell_price: f64,
    pub pressure: f64,
    pub regime: Regime,
    pub held: Quantity,
    pub average_cost: Option<f64>,
    pub unrealized_pnl: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct ContractSnapshot {
    pub id: String,
    pub title: String,
    pub status: ContractStatus,
    pub time_left: f64,
    pub reward_coins: f64,
    pub penalty_coins: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct SchemeSnapshot {
    pub id: SchemeId,
    pub cooldown_left: f64,
    pub active_left: f64,
    pub charges: u32,
    pub equipped: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct CatSnapshot {
    pub id: String,
    pub name: String,
    pub job: Option<JobKey>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct TraderSnapshot {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    pub budget: f64,
    pub rule_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct SeriesSnapshot {
    pub key: String,
    pub values: Vec<f64>,
}

impl StateSnapshot {
    pub fn capture(state: &SimState, config: &SimConfig) -> Self {
        let goods = GoodKey::ALL
            .into_iter()
            .map(|good| GoodSnapshot {
                good,
                unlocked: state.is_unlocked(good.feature()),
                price: state.price(good),
                buy_price: ledger::buy_price(state, config, good),
                sell_price: ledger::sell_price(state, config, good),
                pressure: state.pressure(good),
                regime: state
                    .market_latent
                    .get(&good)
                    .map(|l| l.regime)
                    .unwrap_or_default(),
                held: state.held(good),
                average_cost: ledger::average_cost(state, good),
                unrealized_pnl: ledger::unrealized_pnl(state, good),
            })
            .collect();

        let contract = contracts::active_contract(state, config).map(|def| ContractSnapshot {
            id: def.id.clone(),
            title: def.title.clone(),
            status: contracts::contract_status(state, config).unwrap_or(ContractStatus::Active),
            time_left: contracts::time_left(state, config).unwrap_or(0.0),
            reward_coins: def.reward_coins,
            penalty_coins: def.penalty_coins,
        });

        let schemes = SchemeId::ALL
            .into_iter()
            .map(|id| {
                let rt = state.schemes.get(&id).copied().unwrap_or_default();
                SchemeSnapshot {
                    id,
                    cooldown_left: rt.cooldown_left,
                    active_left: rt.active_left,
                    charges: rt.charges,
                    equipped: state.scheme_loadout.contains(&Some(id)),
                }
            })
            .collect();

        let cats = state
            .cats
            .iter()
            .map(|cat| CatSnapshot {
                id: cat.id.clone(),
                name: cat.name.clone(),
                job: state.job_of(&cat.id),
            })
            .collect();

        let traders = state
            .traders
            .iter()
            .map(|t| TraderSnapshot {
                id: t.id.clone(),
                name: t.name.clone(),
                enabled: t.enabled,
                budget: state.trader_runtime.get(&t.id).map_or(0.0, |r| r.budget),
                rule_count: t.rules.len(),
            })
            .collect();

        let history = state
            .history
            .iter()
            .map(|(key, values)| SeriesSnapshot {
                key: key.as_str().to_string(),
                values: values.iter().copied().collect(),
            })
            .collect();

        StateSnapshot {
            sim_time: state.sim_time,
            coins: state.coins,
            heat: state.heat,
            level: state.level,
            goal_target: config
                .goals
                .get(state.level as usize)
                .map(|g| g.target_coins),
            goods,
            unlocked: FeatureKey::ALL
                .into_iter()
                .filter(|f| state.is_unlocked(*f))
                .collect(),
            contract,
            last_contract_outcome: state.contracts.last_outcome,
            schemes,
            scheme_loadout: state.scheme_loadout.clone(),
            cats,
            traders,
            events: state.events.clone(),
            history,
            meta: state.meta.clone(),
            last_trade: state.last_trade.clone(),
        }
    }
}
