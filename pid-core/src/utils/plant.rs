//! Process models a control loop can drive.
//!
//! `MotorModel` is a first-order speed model: the control input adds to the
//! speed through `input_gain`, then the speed decays by `damping` every step.

use serde::{Deserialize, Serialize};

/// A controlled process: accepts a control input, reports a measurement.
pub trait Plant {
    /// Current measured value.
    fn measurement(&self) -> f64;
    /// Apply one step of control input and return the new measurement.
    fn apply(
        &mut self,
        input: f64,
    ) -> f64;
    /// Return to the initial condition.
    fn reset(&mut self);
}

/// Parameters of the simulated motor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotorParams {
    /// Speed gained per unit of control input per step.
    pub input_gain: f64,
    /// Fraction of speed kept at the end of each step (0..1).
    pub damping: f64,
    pub initial_speed: f64,
}

impl Default for MotorParams {
    fn default() -> Self {
        Self {
            input_gain: 0.1,
            damping: 0.9,
            initial_speed: 0.0,
        }
    }
}

/// Simulated motor whose speed responds proportionally to input, with damping.
#[derive(Debug, Clone)]
pub struct MotorModel {
    params: MotorParams,
    speed: f64,
}

impl MotorModel {
    pub fn new(params: MotorParams) -> Self {
        Self {
            params,
            speed: params.initial_speed,
        }
    }

    pub fn params(&self) -> MotorParams {
        self.params
    }
}

impl Default for MotorModel {
    fn default() -> Self {
        Self::new(MotorParams::default())
    }
}

impl Plant for MotorModel {
    fn measurement(&self) -> f64 {
        self.speed
    }

    fn apply(
        &mut self,
        input: f64,
    ) -> f64 {
        self.speed += input * self.params.input_gain;
        self.speed *= self.params.damping;
        self.speed
    }

    fn reset(&mut self) {
        self.speed = self.params.initial_speed;
    }
}
