use serde::{Deserialize, Serialize};
use tsify_next::Tsify;

pub type Coins = f64;
pub type Price = f64;
pub type Quantity = u32;

pub type ContractId = String;
pub type TraderId = String;
pub type CatId = String;

// ============================================================================
// Numeric guards - every entry point coerces before trusting a number
// ============================================================================

/// Round to whole cents.
pub fn round2(n: f64) -> f64 {
    let n = finite_or_zero(n);
    (n * 100.0).round() / 100.0
}

/// Non-finite values (NaN, ±inf) collapse to 0.
pub fn finite_or_zero(n: f64) -> f64 {
    if n.is_finite() { n } else { 0.0 }
}

/// Clamp to `[0, +inf)`, treating non-finite input as 0.
pub fn clamp0(n: f64) -> f64 {
    finite_or_zero(n).max(0.0)
}

/// Clamp into `[lo, hi]`, treating non-finite input as 0 first.
pub fn clamp_finite(n: f64, lo: f64, hi: f64) -> f64 {
    finite_or_zero(n).clamp(lo, hi)
}

// ============================================================================
// Goods - the tradeable commodities
// ============================================================================

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Tsify,
)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub enum GoodKey {
    /// Stable, low-margin.
    Kibble,
    /// Volatile.
    Catnip,
    /// Highly volatile.
    Shiny,
}

impl GoodKey {
    pub const ALL: [GoodKey; 3] = [GoodKey::Kibble, GoodKey::Catnip, GoodKey::Shiny];

    pub fn as_str(self) -> &'static str {
        match self {
            GoodKey::Kibble => "kibble",
            GoodKey::Catnip => "catnip",
            GoodKey::Shiny => "shiny",
        }
    }

    pub fn parse(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|g| g.as_str() == key)
    }

    /// The feature flag that gates trading this good.
    pub fn feature(self) -> FeatureKey {
        match self {
            GoodKey::Kibble => FeatureKey::Kibble,
            GoodKey::Catnip => FeatureKey::Catnip,
            GoodKey::Shiny => FeatureKey::Shiny,
        }
    }
}

// ============================================================================
// Features - monotonic unlock flags
// ============================================================================

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Tsify,
)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub enum FeatureKey {
    Kibble,
    Catnip,
    Shiny,
    Contract,
    Cats,
    Traders,
    Heat,
    Schemes,
}

impl FeatureKey {
    pub const ALL: [FeatureKey; 8] = [
        FeatureKey::Kibble,
        FeatureKey::Catnip,
        FeatureKey::Shiny,
        FeatureKey::Contract,
        FeatureKey::Cats,
        FeatureKey::Traders,
        FeatureKey::Heat,
        FeatureKey::Schemes,
    ];

    /// Unlock state of a brand-new run.
    pub fn unlocked_by_default(self) -> bool {
        matches!(self, FeatureKey::Kibble | FeatureKey::Contract)
    }
}

// ============================================================================
// Jobs
// ============================================================================

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Tsify,
)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub enum JobKey {
    /// Generates kibble over time.
    Production,
    /// Market intel; no numeric effect in the core.
    Scouting,
    /// Small price edge on every manual trade.
    Negotiating,
    /// Less trade heat, faster heat decay, fewer events.
    Guarding,
}

impl JobKey {
    pub const ALL: [JobKey; 4] = [
        JobKey::Production,
        JobKey::Scouting,
        JobKey::Negotiating,
        JobKey::Guarding,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            JobKey::Production => "production",
            JobKey::Scouting => "scouting",
            JobKey::Negotiating => "negotiating",
            JobKey::Guarding => "guarding",
        }
    }

    pub fn parse(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|j| j.as_str() == key)
    }
}

// ============================================================================
// Schemes - active abilities
// ============================================================================

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Tsify,
)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub enum SchemeId {
    Hustle,
    PricePounce,
    NineLives,
    CoolWhiskers,
    MarketNap,
    PurrSuasion,
}

impl SchemeId {
    pub const ALL: [SchemeId; 6] = [
        SchemeId::Hustle,
        SchemeId::PricePounce,
        SchemeId::NineLives,
        SchemeId::CoolWhiskers,
        SchemeId::MarketNap,
        SchemeId::PurrSuasion,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SchemeId::Hustle => "hustle",
            SchemeId::PricePounce => "pricePounce",
            SchemeId::NineLives => "nineLives",
            SchemeId::CoolWhiskers => "coolWhiskers",
            SchemeId::MarketNap => "marketNap",
            SchemeId::PurrSuasion => "purrSuasion",
        }
    }

    pub fn parse(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == key)
    }
}

// ============================================================================
// Districts - market variants with multiplied tunables
// ============================================================================

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Tsify,
)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub enum DistrictKey {
    #[default]
    Alley,
    Uptown,
}

impl DistrictKey {
    pub const ALL: [DistrictKey; 2] = [DistrictKey::Alley, DistrictKey::Uptown];

    pub fn as_str(self) -> &'static str {
        match self {
            DistrictKey::Alley => "alley",
            DistrictKey::Uptown => "uptown",
        }
    }

    pub fn parse(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.as_str() == key)
    }
}

// ============================================================================
// Regime - volatility state of a good's latent process
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub enum Regime {
    #[default]
    Calm,
    Choppy,
    Hype,
}

impl Regime {
    pub fn as_str(self) -> &'static str {
        match self {
            Regime::Calm => "calm",
            Regime::Choppy => "choppy",
            Regime::Hype => "hype",
        }
    }

    /// Multiplier applied to every stochastic innovation while in this regime.
    pub fn vol_mult(self) -> f64 {
        match self {
            Regime::Calm => 0.75,
            Regime::Choppy => 1.05,
            Regime::Hype => 1.55,
        }
    }

    /// Map a uniform draw in [0,1) to a regime: calm 62%, choppy 28%, hype 10%.
    pub fn from_roll(roll: f64) -> Self {
        if roll < 0.62 {
            Regime::Calm
        } else if roll < 0.90 {
            Regime::Choppy
        } else {
            Regime::Hype
        }
    }
}

// ============================================================================
// Trades and events
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub enum TradeKind {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    /// Proportional coin loss; cools heat.
    Tax,
    /// Swipes one unit of the most valuable held good; raises heat.
    Rival,
    /// Removes units of a random held good; cools heat.
    Confiscation,
}

impl TradeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TradeKind::Buy => "buy",
            TradeKind::Sell => "sell",
        }
    }
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Tax => "tax",
            EventKind::Rival => "rival",
            EventKind::Confiscation => "confiscation",
        }
    }

    /// tax 50%, rival 30%, confiscation 20%.
    pub fn from_roll(roll: f64) -> Self {
        if roll < 0.5 {
            EventKind::Tax
        } else if roll < 0.8 {
            EventKind::Rival
        } else {
            EventKind::Confiscation
        }
    }
}

// ============================================================================
// Series keys - rolling history buckets
// ============================================================================

/// History series identifier. Serialised as a plain string (`"kibble"`,
/// `"heat"`, `"coins"`) so the history map stays a JSON object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum SeriesKey {
    Price(GoodKey),
    Heat,
    Coins,
}

impl SeriesKey {
    pub fn as_str(self) -> &'static str {
        match self {
            SeriesKey::Price(good) => good.as_str(),
            SeriesKey::Heat => "heat",
            SeriesKey::Coins => "coins",
        }
    }
}

impl From<SeriesKey> for String {
    fn from(key: SeriesKey) -> Self {
        key.as_str().to_string()
    }
}

impl TryFrom<String> for SeriesKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "heat" => Ok(SeriesKey::Heat),
            "coins" => Ok(SeriesKey::Coins),
            other => GoodKey::parse(other)
                .map(SeriesKey::Price)
                .ok_or_else(|| format!("unknown series key: {other}")),
        }
    }
}
