use serde::{Deserialize, Serialize};
use tsify_next::Tsify;

use crate::config::PriceTunables;
use crate::rng::Prng;
use crate::types::{GoodKey, Price, Regime, clamp_finite, finite_or_zero, round2};

/// Persistence of the drift term per step.
const DRIFT_KEEP: f64 = 0.92;
const DRIFT_LIMIT: f64 = 0.6;
/// Drift is amplified when pulling the anchor target.
const DRIFT_ANCHOR_GAIN: f64 = 2.0;
const SLOW_KEEP: f64 = 0.985;
const FAST_KEEP: f64 = 0.90;

/// Hidden per-good price process. Only `last_base_price` is observable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Tsify)]
#[serde(default, rename_all = "camelCase")]
pub struct LatentState {
    pub anchor: f64,
    pub drift: f64,
    pub regime: Regime,
    pub regime_time_left: f64,
    pub slow: f64,
    pub fast: f64,
    pub last_base_price: Price,
}

impl Default for LatentState {
    fn default() -> Self {
        Self {
            anchor: 0.0,
            drift: 0.0,
            regime: Regime::Calm,
            regime_time_left: 0.0,
            slow: 0.0,
            fast: 0.0,
            last_base_price: 1.0,
        }
    }
}

impl LatentState {
    /// Fresh process sitting at the base price. `regime_time_left` starts
    /// expired so the first step draws a regime.
    pub fn new(t: &PriceTunables) -> Self {
        Self {
            anchor: t.base,
            last_base_price: round2(t.base).max(1.0),
            ..Default::default()
        }
    }

    /// Replace non-finite components; a broken anchor restarts at base.
    pub fn sanitize(&mut self, t: &PriceTunables) {
        if !(self.anchor.is_finite() && self.anchor > 0.0) {
            self.anchor = t.base;
        }
        self.drift = clamp_finite(self.drift, -DRIFT_LIMIT, DRIFT_LIMIT);
        self.regime_time_left = finite_or_zero(self.regime_time_left);
        self.slow = finite_or_zero(self.slow);
        self.fast = finite_or_zero(self.fast);
        self.last_base_price = round2(self.last_base_price).max(1.0);
    }

    /// Advance the process by `dt` seconds and return the new base price.
    ///
    /// Draw order per step is fixed (regime, regime duration, drift, slow,
    /// fast) so a given PRNG state always yields the same path.
    pub fn step(&mut self, t: &PriceTunables, rng: &mut Prng, good: GoodKey, dt: f64) -> Price {
        let key = good.as_str();
        let dt = finite_or_zero(dt).max(0.0);

        self.regime_time_left -= dt;
        if self.regime_time_left <= 0.0 {
            self.regime = Regime::from_roll(rng.uniform01(&["regime", key]));
            self.regime_time_left =
                rng.range(&["regimeDur", key], t.regime_min_sec, t.regime_max_sec);
        }
        let vol = self.regime.vol_mult();
        let sqrt_dt = dt.sqrt();

        let n = rng.normalish(&["drift", key]);
        self.drift = clamp_finite(
            DRIFT_KEEP * self.drift + t.drift_mag * vol * n,
            -DRIFT_LIMIT,
            DRIFT_LIMIT,
        );

        let n = rng.normalish(&["slow", key]);
        self.slow = finite_or_zero(SLOW_KEEP * self.slow + t.slow_vol * vol * n * sqrt_dt);

        let n = rng.normalish(&["fast", key]);
        self.fast = finite_or_zero(FAST_KEEP * self.fast + t.fast_vol * vol * n * sqrt_dt);

        let target = t.base + DRIFT_ANCHOR_GAIN * self.drift;
        let pull = (t.mean_rev * dt).clamp(0.0, 1.0);
        self.anchor = finite_or_zero(self.anchor + (target - self.anchor) * pull);
        if self.anchor <= 0.0 {
            self.anchor = t.base;
        }

        self.last_base_price = round2(self.anchor + self.slow + self.fast).max(1.0);
        self.last_base_price
    }
}
