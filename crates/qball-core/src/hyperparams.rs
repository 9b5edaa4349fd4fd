//! Learning hyperparameters and the shared handle used to tune them at runtime

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{QBallError, Result};

/// One of the three tunable learning parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Hyperparameter {
    /// Learning rate
    Alpha,
    /// Discount factor
    Gamma,
    /// Exploration probability
    Epsilon,
}

impl Hyperparameter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Hyperparameter::Alpha => "alpha",
            Hyperparameter::Gamma => "gamma",
            Hyperparameter::Epsilon => "epsilon",
        }
    }
}

impl fmt::Display for Hyperparameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Values read by the policy and the learner on every call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hyperparameters {
    pub alpha: f64,
    pub gamma: f64,
    pub epsilon: f64,
}

impl Hyperparameters {
    /// Create a validated set of hyperparameters
    pub fn new(alpha: f64, gamma: f64, epsilon: f64) -> Result<Self> {
        let params = Self {
            alpha,
            gamma,
            epsilon,
        };
        params.validate()?;
        Ok(params)
    }

    /// Reject any value outside [0, 1]
    pub fn validate(&self) -> Result<()> {
        check(Hyperparameter::Alpha, self.alpha)?;
        check(Hyperparameter::Gamma, self.gamma)?;
        check(Hyperparameter::Epsilon, self.epsilon)?;
        Ok(())
    }

    pub fn get(&self, param: Hyperparameter) -> f64 {
        match param {
            Hyperparameter::Alpha => self.alpha,
            Hyperparameter::Gamma => self.gamma,
            Hyperparameter::Epsilon => self.epsilon,
        }
    }

    fn slot(&mut self, param: Hyperparameter) -> &mut f64 {
        match param {
            Hyperparameter::Alpha => &mut self.alpha,
            Hyperparameter::Gamma => &mut self.gamma,
            Hyperparameter::Epsilon => &mut self.epsilon,
        }
    }
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            alpha: 0.5,
            gamma: 0.9,
            epsilon: 0.3,
        }
    }
}

fn check(param: Hyperparameter, value: f64) -> Result<f64> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(QBallError::InvalidHyperparameter {
            name: param.to_string(),
            value,
        })
    }
}

#[derive(Debug)]
struct Controls {
    params: Hyperparameters,
    speed: f64,
}

/// Shared, cloneable handle to the live hyperparameters.
///
/// A UI collaborator keeps one clone and writes through it; the learner keeps
/// another and takes a [`snapshot`](Self::snapshot) on every decision, so a
/// change is visible on the next tick.
#[derive(Debug, Clone)]
pub struct HyperparameterControl {
    inner: Arc<RwLock<Controls>>,
}

impl HyperparameterControl {
    /// Wrap an already validated parameter set
    pub fn new(params: Hyperparameters) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            inner: Arc::new(RwLock::new(Controls { params, speed: 1.0 })),
        })
    }

    /// Read all three values under one lock
    pub fn snapshot(&self) -> Hyperparameters {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .params
    }

    pub fn get(&self, param: Hyperparameter) -> f64 {
        self.snapshot().get(param)
    }

    /// Set a value, rejecting anything outside [0, 1]
    pub fn set(&self, param: Hyperparameter, value: f64) -> Result<()> {
        let value = check(param, value)?;
        self.write(param, value);
        Ok(())
    }

    /// Clamp a value into [0, 1] and store it, returning what was applied
    pub fn set_clamped(&self, param: Hyperparameter, value: f64) -> Result<f64> {
        if value.is_nan() {
            return Err(QBallError::InvalidHyperparameter {
                name: param.to_string(),
                value,
            });
        }
        let value = value.clamp(0.0, 1.0);
        self.write(param, value);
        Ok(value)
    }

    /// Replace the whole parameter set atomically
    pub fn replace(&self, params: Hyperparameters) -> Result<()> {
        params.validate()?;
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .params = params;
        Ok(())
    }

    /// Simulation speed multiplier
    pub fn speed(&self) -> f64 {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .speed
    }

    /// Set the speed multiplier. Not clamped above; 0 means unthrottled.
    pub fn set_speed(&self, speed: f64) -> Result<()> {
        if !speed.is_finite() || speed < 0.0 {
            return Err(QBallError::Config(format!(
                "speed multiplier must be finite and >= 0, got {speed}"
            )));
        }
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .speed = speed;
        Ok(())
    }

    fn write(&self, param: Hyperparameter, value: f64) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        *guard.params.slot(param) = value;
        debug!("{} set to {:.2}", param, value);
    }
}

impl Default for HyperparameterControl {
    fn default() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Controls {
                params: Hyperparameters::default(),
                speed: 1.0,
            })),
        }
    }
}
