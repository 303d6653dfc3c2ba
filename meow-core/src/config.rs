//! Content and tuning configuration.
//!
//! Everything the simulation treats as data lives here: the three goods and
//! their price-process tunables, districts, contracts, schemes, jobs, the goal
//! ladder, the starter cat and trader rosters, and global tuning constants.
//! `SimConfig::default()` is the reference content; a JSON document may
//! override any subset of it.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::jobs::Cat;
use crate::traders::{RuleKind, Trader, TraderRule};
use crate::types::{Coins, DistrictKey, FeatureKey, GoodKey, JobKey, Price, Quantity, SchemeId};

// ============================================================================
// Goods
// ============================================================================

/// Price-process tunables and trading parameters for one good.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoodDef {
    pub key: GoodKey,
    pub label: String,
    /// Long-run reference price the anchor reverts toward.
    pub base: Price,
    /// Innovation scale of the slow AR(1) component.
    pub slow_vol: f64,
    /// Innovation scale of the fast AR(1) component.
    pub fast_vol: f64,
    /// Innovation scale of the drift term.
    pub drift_mag: f64,
    /// Fraction of the anchor gap closed per second.
    pub mean_rev: f64,
    pub regime_min_sec: f64,
    pub regime_max_sec: f64,
    /// Heat added per unit traded once heat is unlocked.
    pub heat_base: f64,
    /// Coins needed to unlock trading; `None` means always tradeable.
    pub unlock_coins: Option<Coins>,
}

/// Tunables after district multipliers are applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceTunables {
    pub base: Price,
    pub slow_vol: f64,
    pub fast_vol: f64,
    pub drift_mag: f64,
    pub mean_rev: f64,
    pub regime_min_sec: f64,
    pub regime_max_sec: f64,
}

impl GoodDef {
    pub fn tunables(&self, mult: &DistrictMult) -> PriceTunables {
        PriceTunables {
            base: self.base * mult.base,
            slow_vol: self.slow_vol * mult.vol_slow,
            fast_vol: self.fast_vol * mult.vol_fast,
            drift_mag: self.drift_mag * mult.drift,
            mean_rev: self.mean_rev * mult.mean_rev,
            regime_min_sec: self.regime_min_sec,
            regime_max_sec: self.regime_max_sec,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let bad = |reason| ConfigError::InvalidGood {
            good: self.key,
            reason,
        };
        if !(self.base.is_finite() && self.base >= 1.0) {
            return Err(bad("base price must be finite and >= 1"));
        }
        let non_negative = [
            self.slow_vol,
            self.fast_vol,
            self.drift_mag,
            self.mean_rev,
            self.heat_base,
        ];
        if non_negative.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(bad("volatilities, mean reversion and heat must be finite and >= 0"));
        }
        if self.mean_rev > 1.0 {
            return Err(bad("mean reversion must be <= 1 per second"));
        }
        if !(self.regime_min_sec > 0.0 && self.regime_min_sec <= self.regime_max_sec)
            || !self.regime_max_sec.is_finite()
        {
            return Err(bad("regime duration range must satisfy 0 < min <= max"));
        }
        if matches!(self.unlock_coins, Some(c) if !(c.is_finite() && c >= 0.0)) {
            return Err(bad("unlock threshold must be finite and >= 0"));
        }
        Ok(())
    }
}

fn default_goods() -> Vec<GoodDef> {
    vec![
        GoodDef {
            key: GoodKey::Kibble,
            label: "Kibble".into(),
            base: 10.0,
            slow_vol: 0.3,
            fast_vol: 0.2,
            drift_mag: 0.05,
            mean_rev: 0.08,
            regime_min_sec: 20.0,
            regime_max_sec: 60.0,
            heat_base: 0.4,
            unlock_coins: None,
        },
        GoodDef {
            key: GoodKey::Catnip,
            label: "Catnip".into(),
            base: 18.0,
            slow_vol: 1.5,
            fast_vol: 1.0,
            drift_mag: 0.12,
            mean_rev: 0.05,
            regime_min_sec: 15.0,
            regime_max_sec: 45.0,
            heat_base: 0.9,
            unlock_coins: Some(100.0),
        },
        GoodDef {
            key: GoodKey::Shiny,
            label: "Shiny Things".into(),
            base: 40.0,
            slow_vol: 7.5,
            fast_vol: 5.0,
            drift_mag: 0.25,
            mean_rev: 0.03,
            regime_min_sec: 10.0,
            regime_max_sec: 35.0,
            heat_base: 1.6,
            unlock_coins: Some(250.0),
        },
    ]
}

// ============================================================================
// Districts
// ============================================================================

/// Multipliers a district applies to every good's tunables.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistrictMult {
    pub base: f64,
    pub vol_slow: f64,
    pub vol_fast: f64,
    pub drift: f64,
    pub mean_rev: f64,
}

impl Default for DistrictMult {
    fn default() -> Self {
        Self {
            base: 1.0,
            vol_slow: 1.0,
            vol_fast: 1.0,
            drift: 1.0,
            mean_rev: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistrictDef {
    pub key: DistrictKey,
    pub label: String,
    pub mult: DistrictMult,
}

fn default_districts() -> Vec<DistrictDef> {
    vec![
        DistrictDef {
            key: DistrictKey::Alley,
            label: "Alley Market".into(),
            mult: DistrictMult::default(),
        },
        DistrictDef {
            key: DistrictKey::Uptown,
            label: "Uptown Exchange".into(),
            mult: DistrictMult {
                base: 1.05,
                vol_slow: 1.10,
                vol_fast: 1.20,
                drift: 1.15,
                mean_rev: 0.95,
            },
        },
    ]
}

// ============================================================================
// Contracts
// ============================================================================

/// One condition a contract must meet before it can be redeemed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Requirement {
    /// Net coin gain since the contract was accepted.
    EarnCoins { coins: Coins },
    /// Absolute inventory of a good at check time; consumed on redeem.
    DeliverGood { good: GoodKey, qty: Quantity },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractDef {
    pub id: String,
    pub title: String,
    pub requirements: Vec<Requirement>,
    pub deadline_sec: f64,
    pub reward_coins: Coins,
    pub penalty_coins: Coins,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ContractDef {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let bad = |reason| ConfigError::InvalidContract {
            id: self.id.clone(),
            reason,
        };
        if self.requirements.is_empty() {
            return Err(bad("at least one requirement is needed"));
        }
        for req in &self.requirements {
            match req {
                Requirement::EarnCoins { coins } if !(coins.is_finite() && *coins > 0.0) => {
                    return Err(bad("earnCoins target must be positive"));
                }
                Requirement::DeliverGood { qty: 0, .. } => {
                    return Err(bad("deliverGood quantity must be positive"));
                }
                _ => {}
            }
        }
        if !(self.deadline_sec.is_finite() && self.deadline_sec > 0.0) {
            return Err(bad("deadline must be positive"));
        }
        if [self.reward_coins, self.penalty_coins]
            .iter()
            .any(|v| !v.is_finite() || *v < 0.0)
        {
            return Err(bad("reward and penalty must be finite and >= 0"));
        }
        Ok(())
    }
}

fn default_contracts() -> Vec<ContractDef> {
    vec![
        ContractDef {
            id: "starter-profit-60".into(),
            title: "Turn a quick profit".into(),
            requirements: vec![Requirement::EarnCoins { coins: 60.0 }],
            deadline_sec: 180.0,
            reward_coins: 25.0,
            penalty_coins: 10.0,
            tags: vec!["starter".into(), "trade".into(), "safe".into()],
        },
        ContractDef {
            id: "starter-kibble-8".into(),
            title: "Stock the pantry".into(),
            requirements: vec![Requirement::DeliverGood {
                good: GoodKey::Kibble,
                qty: 8,
            }],
            deadline_sec: 220.0,
            reward_coins: 35.0,
            penalty_coins: 12.0,
            tags: vec!["starter".into(), "delivery".into(), "safe".into()],
        },
        ContractDef {
            id: "prestige-heat-hedge".into(),
            title: "Hedge the heat".into(),
            requirements: vec![Requirement::EarnCoins { coins: 120.0 }],
            deadline_sec: 240.0,
            reward_coins: 70.0,
            penalty_coins: 25.0,
            tags: vec!["prestige".into(), "trade".into(), "risky".into()],
        },
    ]
}

// ============================================================================
// Schemes, jobs, goals
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemeDef {
    pub id: SchemeId,
    pub cooldown_sec: f64,
    /// Zero for instant schemes.
    pub duration_sec: f64,
}

fn default_schemes() -> Vec<SchemeDef> {
    let def = |id, cooldown_sec, duration_sec| SchemeDef {
        id,
        cooldown_sec,
        duration_sec,
    };
    vec![
        def(SchemeId::Hustle, 30.0, 10.0),
        def(SchemeId::PricePounce, 45.0, 8.0),
        def(SchemeId::NineLives, 60.0, 0.0),
        def(SchemeId::CoolWhiskers, 40.0, 0.0),
        def(SchemeId::MarketNap, 55.0, 0.0),
        def(SchemeId::PurrSuasion, 50.0, 12.0),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDef {
    pub key: JobKey,
    /// Maximum number of cats on this job at once.
    pub capacity: u32,
}

fn default_jobs() -> Vec<JobDef> {
    JobKey::ALL
        .into_iter()
        .map(|key| JobDef { key, capacity: 1 })
        .collect()
}

/// One rung of the goal ladder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalDef {
    pub target_coins: Coins,
    /// Features unlocked when the player levels past this goal.
    #[serde(default)]
    pub unlocks: Vec<FeatureKey>,
}

fn default_goals() -> Vec<GoalDef> {
    let goal = |target_coins, unlocks: &[FeatureKey]| GoalDef {
        target_coins,
        unlocks: unlocks.to_vec(),
    };
    vec![
        goal(100.0, &[]),
        goal(250.0, &[]),
        goal(500.0, &[FeatureKey::Heat, FeatureKey::Schemes]),
        goal(800.0, &[FeatureKey::Traders]),
        goal(1200.0, &[FeatureKey::Cats]),
    ]
}

fn default_cats() -> Vec<Cat> {
    vec![
        Cat {
            id: "miso".into(),
            name: "Miso".into(),
        },
        Cat {
            id: "beans".into(),
            name: "Beans".into(),
        },
    ]
}

fn default_traders() -> Vec<Trader> {
    let rules = [
        TraderRule::new(RuleKind::BuyBelow, GoodKey::Kibble, 9.5, 1),
        TraderRule::new(RuleKind::SellAbove, GoodKey::Kibble, 10.8, 1),
    ];
    vec![Trader {
        id: "tuna".into(),
        name: "Tuna".into(),
        enabled: false,
        fee_bps: 50.0,
        actions_per_min: 10.0,
        rules: rules.into_iter().flatten().collect(),
    }]
}

// ============================================================================
// Tuning - global constants
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Tuning {
    /// Upper bound on a single tick's dt.
    pub max_dt: f64,
    pub start_coins: Coins,
    /// Rolling history length per series.
    pub history_len: usize,
    pub event_log_len: usize,

    // Pressure
    pub pressure_limit: f64,
    pub pressure_decay_per_sec: f64,
    /// Fractional price impact per unit of pressure.
    pub pressure_price_coeff: f64,

    // Price edges
    pub negotiate_buy_mult: f64,
    pub negotiate_sell_mult: f64,
    pub pounce_buy_mult: f64,
    pub pounce_sell_mult: f64,

    // Heat
    pub heat_decay_per_sec: f64,
    pub heat_decay_guarded_per_sec: f64,
    pub guard_heat_mult: f64,
    pub purr_heat_mult: f64,
    pub guard_event_mult: f64,
    /// Heat at which events start to become possible.
    pub event_heat_floor: f64,
    pub event_heat_span: f64,
    pub event_max_chance: f64,
    pub cool_whiskers_heat_drop: f64,
    /// Contracts are withheld at or above this heat.
    pub contract_heat_gate: f64,

    // Production
    pub production_per_sec: f64,
    pub hustle_mult: f64,

    // Traders
    pub trader_max_actions_per_tick: u32,

    // Prestige
    pub coins_per_whisker: f64,
    pub prestige_scheme_slots: u32,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            max_dt: 5.0,
            start_coins: 50.0,
            history_len: 30,
            event_log_len: 10,
            pressure_limit: 25.0,
            pressure_decay_per_sec: 0.35,
            pressure_price_coeff: 0.02,
            negotiate_buy_mult: 0.98,
            negotiate_sell_mult: 1.02,
            pounce_buy_mult: 0.97,
            pounce_sell_mult: 1.03,
            heat_decay_per_sec: 0.6,
            heat_decay_guarded_per_sec: 1.0,
            guard_heat_mult: 0.7,
            purr_heat_mult: 0.5,
            guard_event_mult: 0.7,
            event_heat_floor: 20.0,
            event_heat_span: 400.0,
            event_max_chance: 0.18,
            cool_whiskers_heat_drop: 25.0,
            contract_heat_gate: 70.0,
            production_per_sec: 0.2,
            hustle_mult: 2.0,
            trader_max_actions_per_tick: 3,
            coins_per_whisker: 200.0,
            prestige_scheme_slots: 2,
        }
    }
}

impl Tuning {
    fn validate(&self) -> Result<(), ConfigError> {
        let bad = ConfigError::InvalidTuning;
        if !(self.max_dt.is_finite() && self.max_dt > 0.0) {
            return Err(bad("maxDt must be positive"));
        }
        if !(self.start_coins.is_finite() && self.start_coins >= 0.0) {
            return Err(bad("startCoins must be >= 0"));
        }
        if self.history_len == 0 || self.event_log_len == 0 {
            return Err(bad("history and event log lengths must be >= 1"));
        }
        if !(self.pressure_limit.is_finite() && self.pressure_limit > 0.0) {
            return Err(bad("pressureLimit must be positive"));
        }
        let multipliers = [
            self.pressure_decay_per_sec,
            self.pressure_price_coeff,
            self.negotiate_buy_mult,
            self.negotiate_sell_mult,
            self.pounce_buy_mult,
            self.pounce_sell_mult,
            self.heat_decay_per_sec,
            self.heat_decay_guarded_per_sec,
            self.guard_heat_mult,
            self.purr_heat_mult,
            self.guard_event_mult,
            self.event_max_chance,
            self.cool_whiskers_heat_drop,
            self.production_per_sec,
            self.hustle_mult,
        ];
        if multipliers.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(bad("rates and multipliers must be finite and >= 0"));
        }
        if !(self.event_heat_span.is_finite() && self.event_heat_span > 0.0) {
            return Err(bad("eventHeatSpan must be positive"));
        }
        if !(self.coins_per_whisker.is_finite() && self.coins_per_whisker > 0.0) {
            return Err(bad("coinsPerWhisker must be positive"));
        }
        if self.prestige_scheme_slots == 0 {
            return Err(bad("prestigeSchemeSlots must be >= 1"));
        }
        Ok(())
    }
}

// ============================================================================
// SimConfig
// ============================================================================

/// Full content + tuning configuration. Fields omitted from a JSON document
/// fall back to the reference content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimConfig {
    pub goods: Vec<GoodDef>,
    pub districts: Vec<DistrictDef>,
    pub contracts: Vec<ContractDef>,
    pub schemes: Vec<SchemeDef>,
    pub jobs: Vec<JobDef>,
    pub goals: Vec<GoalDef>,
    pub cats: Vec<Cat>,
    pub traders: Vec<Trader>,
    pub tuning: Tuning,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            goods: default_goods(),
            districts: default_districts(),
            contracts: default_contracts(),
            schemes: default_schemes(),
            jobs: default_jobs(),
            goals: default_goals(),
            cats: default_cats(),
            traders: default_traders(),
            tuning: Tuning::default(),
        }
    }
}

impl SimConfig {
    /// Parse and validate a JSON config document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for key in GoodKey::ALL {
            self.good(key).ok_or(ConfigError::MissingGood(key))?.validate()?;
        }
        for district in &self.districts {
            let m = &district.mult;
            if [m.base, m.vol_slow, m.vol_fast, m.drift, m.mean_rev]
                .iter()
                .any(|v| !v.is_finite() || *v <= 0.0)
            {
                return Err(ConfigError::InvalidDistrict(district.key.as_str()));
            }
        }
        let mut seen = BTreeSet::new();
        for contract in &self.contracts {
            if !seen.insert(contract.id.as_str()) {
                return Err(ConfigError::DuplicateContract(contract.id.clone()));
            }
            contract.validate()?;
        }
        for id in SchemeId::ALL {
            let def = self.scheme(id).ok_or(ConfigError::MissingScheme(id))?;
            if !(def.cooldown_sec.is_finite() && def.cooldown_sec >= 0.0)
                || !(def.duration_sec.is_finite() && def.duration_sec >= 0.0)
            {
                return Err(ConfigError::InvalidTuning("scheme timers must be finite and >= 0"));
            }
        }
        for trader in &self.traders {
            trader
                .validate()
                .map_err(|source| ConfigError::InvalidTrader {
                    id: trader.id.clone(),
                    source,
                })?;
        }
        for goal in &self.goals {
            if !(goal.target_coins.is_finite() && goal.target_coins >= 0.0) {
                return Err(ConfigError::InvalidTuning("goal targets must be finite and >= 0"));
            }
        }
        self.tuning.validate()
    }

    pub fn good(&self, key: GoodKey) -> Option<&GoodDef> {
        self.goods.iter().find(|g| g.key == key)
    }

    /// Multipliers for a district; unknown districts behave like the alley.
    pub fn district_mult(&self, key: DistrictKey) -> DistrictMult {
        self.districts
            .iter()
            .find(|d| d.key == key)
            .map(|d| d.mult)
            .unwrap_or_default()
    }

    pub fn contract(&self, id: &str) -> Option<&ContractDef> {
        self.contracts.iter().find(|c| c.id == id)
    }

    pub fn scheme(&self, id: SchemeId) -> Option<&SchemeDef> {
        self.schemes.iter().find(|s| s.id == id)
    }

    /// Seat count for a job; jobs without a definition hold no cats.
    pub fn job_capacity(&self, key: JobKey) -> u32 {
        self.jobs
            .iter()
            .find(|j| j.key == key)
            .map_or(0, |j| j.capacity)
    }

    pub fn heat_base(&self, key: GoodKey) -> f64 {
        self.good(key).map_or(0.0, |g| g.heat_base)
    }
}
