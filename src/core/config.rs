//! Network constants and construction parameters.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{MonaError, Result};

pub type Need = f64;
pub type Motive = f64;
pub type Enablement = f64;
pub type Weight = f64;
pub type Sensor = f32;
pub type Time = u64;

// Need bound used when reducing a motive accumulator.
pub const MAX_NEED: Need = 10.0;
pub const MIN_MOTIVE: Motive = 0.001;

pub const MAX_ENABLEMENT: Enablement = 1.0;
pub const MIN_ENABLEMENT: Enablement = 0.05;
pub const NEW_ENABLEMENT: Enablement = 0.075;

pub const DRIVE_ATTENUATION: Weight = 0.99;
pub const WAGER_HISTORY_UPDATE_VELOCITY: Weight = 0.25;

pub const DEFAULT_MAX_MEDIATORS: usize = 400;
pub const MAX_MEDIATOR_LEVEL: usize = 1;
pub const MAX_MEDIATOR_CAUSES: usize = 3;
pub const MAX_MEDIATOR_EVENTS: usize = 40;
pub const MIN_WAGER_WEIGHT: Weight = 0.01;

// Learning probability exponents.
pub const MOTIVE_LEARNING_DAMPER: Weight = 0.001;
pub const STRENGTH_LEARNING_DAMPER: Weight = 0.1;
pub const ENABLEMENT_LEARNING_DAMPER: Weight = 0.1;

pub const EXPIRATION_WEIGHT: Weight = 1.0;
pub const RESPONSE_EXPIRATION_WEIGHT: Weight = 1.0;

pub const RESIDUAL_RESPONSE_RANDOMNESS: f64 = 0.001;
pub const DEFAULT_RANDOM_SEED: u64 = 4517;
pub const DEFAULT_SENSOR_RESOLUTION: Sensor = 0.0;

pub const NEARLY_ZERO: f64 = 1e-10;

// Bound on the number of effect event intervals per level.
pub const MAX_INTERVALS: usize = 100;
// Bound on a single effect event interval, in cycles.
pub const MAX_EFFECT_EVENT_INTERVAL: Time = i32::MAX as Time;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MonaConfig {
    pub num_sensors: usize,
    pub num_responses: usize,
    pub num_needs: usize,

    // If unset, DEFAULT_RANDOM_SEED.
    pub seed: Option<u64>,

    // Learned mediators beyond this count are pruned by utility.
    pub max_mediators: usize,

    // Mixed into normalized response potentials (0..1).
    pub response_randomness: f64,

    // If false, the learn phase only ages and pays existing structure.
    pub learning_enabled: bool,
}

impl Default for MonaConfig {
    fn default() -> Self {
        Self {
            num_sensors: 1,
            num_responses: 1,
            num_needs: 1,
            seed: None,
            max_mediators: DEFAULT_MAX_MEDIATORS,
            response_randomness: RESIDUAL_RESPONSE_RANDOMNESS,
            learning_enabled: true,
        }
    }
}

impl MonaConfig {
    pub fn new(num_sensors: usize, num_responses: usize, num_needs: usize) -> Self {
        Self {
            num_sensors,
            num_responses,
            num_needs,
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_max_mediators(mut self, max_mediators: usize) -> Self {
        self.max_mediators = max_mediators;
        self
    }

    pub fn with_response_randomness(mut self, randomness: f64) -> Self {
        self.response_randomness = randomness;
        self
    }

    pub fn without_learning(mut self) -> Self {
        self.learning_enabled = false;
        self
    }

    pub fn effective_seed(&self) -> u64 {
        self.seed.unwrap_or(DEFAULT_RANDOM_SEED)
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_sensors == 0 {
            return Err(MonaError::InvalidParameters(
                "number of sensors must be > 0".into(),
            ));
        }
        if self.num_responses == 0 {
            return Err(MonaError::InvalidParameters(
                "number of responses must be > 0".into(),
            ));
        }
        if self.num_needs == 0 {
            return Err(MonaError::InvalidParameters(
                "number of needs must be > 0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.response_randomness) {
            return Err(MonaError::InvalidParameters(format!(
                "response randomness {} not in [0,1]",
                self.response_randomness
            )));
        }
        Ok(())
    }

    /// Parse a JSON config document.
    #[cfg(feature = "serde")]
    pub fn from_json(text: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(text).map_err(|e| MonaError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_and_validation() {
        let cfg = MonaConfig::new(2, 3, 1).with_seed(9).with_max_mediators(10);
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.effective_seed(), 9);
        assert_eq!(MonaConfig::new(2, 3, 1).effective_seed(), DEFAULT_RANDOM_SEED);

        assert!(MonaConfig::new(0, 3, 1).validate().is_err());
        assert!(MonaConfig::new(1, 1, 1)
            .with_response_randomness(2.0)
            .validate()
            .is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn json_fills_defaults() {
        let cfg = MonaConfig::from_json(r#"{"num_sensors":4,"num_responses":2,"num_needs":1}"#)
            .unwrap();
        assert_eq!(cfg.num_sensors, 4);
        assert_eq!(cfg.max_mediators, DEFAULT_MAX_MEDIATORS);
        assert!(cfg.learning_enabled);

        assert!(MonaConfig::from_json(r#"{"num_sensors":0}"#).is_err());
        assert!(MonaConfig::from_json("not json").is_err());
    }
}
