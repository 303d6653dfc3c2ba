//! Error types for configuration and save loading.
//!
//! Gameplay operations never error: they return `bool`/`Option` and leave the
//! state untouched on failure. Only the two boundaries where foreign data
//! enters the core (content configuration and saved state) report typed errors.

use crate::types::{GoodKey, SchemeId};

/// A trader rule rejected at construction.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuleError {
    /// Threshold price must be finite and positive.
    #[error("rule threshold price must be positive, got {0}")]
    NonPositivePrice(f64),

    /// Rule quantity must be at least one unit.
    #[error("rule quantity must be at least 1")]
    ZeroQuantity,

    /// Fee must be finite and non-negative.
    #[error("trader fee must be non-negative, got {0} bps")]
    NegativeFee(f64),

    /// Action rate must be finite and positive.
    #[error("trader action rate must be positive, got {0}/min")]
    NonPositiveRate(f64),
}

/// Errors raised while validating or parsing a [`SimConfig`](crate::SimConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The JSON document could not be parsed.
    #[error("failed to parse config JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Every good must have exactly one definition.
    #[error("missing definition for good {0:?}")]
    MissingGood(GoodKey),

    /// A good's tunables are out of range.
    #[error("good {good:?}: {reason}")]
    InvalidGood {
        /// Offending good.
        good: GoodKey,
        /// What is wrong.
        reason: &'static str,
    },

    /// Every scheme must have a definition.
    #[error("missing definition for scheme {0:?}")]
    MissingScheme(SchemeId),

    /// Two contracts share an id.
    #[error("duplicate contract id: {0}")]
    DuplicateContract(String),

    /// A contract definition is malformed.
    #[error("contract {id}: {reason}")]
    InvalidContract {
        /// Offending contract id.
        id: String,
        /// What is wrong.
        reason: &'static str,
    },

    /// A district multiplier is not positive.
    #[error("district {0}: multipliers must be finite and positive")]
    InvalidDistrict(&'static str),

    /// A trader in the starter roster is malformed.
    #[error("trader {id}: {source}")]
    InvalidTrader {
        /// Offending trader id.
        id: String,
        /// Underlying rule error.
        source: RuleError,
    },

    /// A global tuning constant is out of range.
    #[error("tuning: {0}")]
    InvalidTuning(&'static str),
}

/// Errors raised while restoring a saved [`SimState`](crate::SimState).
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The save blob is not valid JSON for the state schema.
    #[error("failed to parse save JSON: {0}")]
    Json(#[from] serde_json::Error),
}
