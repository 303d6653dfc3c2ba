//! Transient order-flow pressure layered on top of the latent base price.

use crate::config::SimConfig;
use crate::state::SimState;
use crate::types::{GoodKey, clamp_finite, round2};

/// Add `delta` units of pressure (buys positive, sells negative), rounded to
/// cents and clamped to the configured limit.
pub fn apply_pressure(state: &mut SimState, config: &SimConfig, good: GoodKey, delta: f64) {
    let limit = config.tuning.pressure_limit;
    let entry = state.market.entry(good).or_default();
    entry.pressure = clamp_finite(round2(entry.pressure + delta), -limit, limit);
}

/// Exponential decay toward zero over `dt` seconds.
pub fn decay_pressure(state: &mut SimState, config: &SimConfig, dt: f64) {
    let keep = (-config.tuning.pressure_decay_per_sec * dt).exp();
    let limit = config.tuning.pressure_limit;
    for entry in state.market.values_mut() {
        entry.pressure = clamp_finite(round2(entry.pressure * keep), -limit, limit);
    }
}

/// Multiply every good's pressure by `factor`.
pub fn scale_pressure(state: &mut SimState, config: &SimConfig, factor: f64) {
    let limit = config.tuning.pressure_limit;
    for entry in state.market.values_mut() {
        entry.pressure = clamp_finite(round2(entry.pressure * factor), -limit, limit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pressure_is_clamped() {
        let config = SimConfig::default();
        let mut state = SimState::new_save(&config, Some(1));
        apply_pressure(&mut state, &config, GoodKey::Kibble, 40.0);
        assert_eq!(state.pressure(GoodKey::Kibble), 25.0);
        apply_pressure(&mut state, &config, GoodKey::Kibble, -80.0);
        assert_eq!(state.pressure(GoodKey::Kibble), -25.0);
    }

    #[test]
    fn test_decay_shrinks_toward_zero() {
        let config = SimConfig::default();
        let mut state = SimState::new_save(&config, Some(1));
        apply_pressure(&mut state, &config, GoodKey::Catnip, 10.0);
        decay_pressure(&mut state, &config, 1.0);
        // 10 * e^-0.35 = 7.0469
        assert_eq!(state.pressure(GoodKey::Catnip), 7.05);
        // Cent rounding leaves a sticky residue once p * (1 - e^-0.35) < 0.005.
        for _ in 0..60 {
            decay_pressure(&mut state, &config, 1.0);
        }
        assert!(state.pressure(GoodKey::Catnip) <= 0.01);
    }

    #[test]
    fn test_scale_halves_pressure() {
        let config = SimConfig::default();
        let mut state = SimState::new_save(&config, Some(1));
        apply_pressure(&mut state, &config, GoodKey::Shiny, -7.0);
        scale_pressure(&mut state, &config, 0.5);
        assert_eq!(state.pressure(GoodKey::Shiny), -3.5);
    }
}
