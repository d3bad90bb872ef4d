//! Controllers and the closed-loop driver.
//!
//! - `pid`: the time-aware PID controller
//!
//! `ControlLoop` wires one controller to one [`Plant`]: every `step` reads the
//! plant's measurement, computes the control output and feeds it back in.

pub mod pid;

use serde::{Deserialize, Serialize};

use crate::utils::{plant::Plant, time::Clock};
pub use pid::{ConfigError, Gains, PidConfig, PidController};

/// Outcome of one closed-loop step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// 0-based index of the step.
    pub step: u32,
    pub setpoint: f64,
    /// Control output sent to the plant.
    pub output: f64,
    /// Plant measurement after applying `output`.
    pub measurement: f64,
}

/// Single control loop: one controller driving one plant toward a setpoint.
pub struct ControlLoop<P, C> {
    pub controller: PidController<C>,
    pub plant: P,
    setpoint: f64,
    step: u32,
}

impl<P, C> ControlLoop<P, C>
where
    P: Plant,
    C: Clock,
{
    pub fn new(
        controller: PidController<C>,
        plant: P,
        setpoint: f64,
    ) -> Self {
        ControlLoop {
            controller,
            plant,
            setpoint,
            step: 0,
        }
    }

    pub fn setpoint(&self) -> f64 {
        self.setpoint
    }

    /// Number of steps taken since construction or the last `reset`.
    pub fn steps_taken(&self) -> u32 {
        self.step
    }

    /// Change the target. With `reset`, the controller's history is discarded
    /// so the jump does not kick the derivative or carry the old integral.
    pub fn set_setpoint(
        &mut self,
        setpoint: f64,
        reset: bool,
    ) {
        tracing::info!(from = self.setpoint, to = setpoint, reset, "setpoint changed");
        self.setpoint = setpoint;
        if reset {
            self.controller.reset();
        }
    }

    /// Run one compute/apply cycle.
    pub fn step(&mut self) -> StepRecord {
        let measured = self.plant.measurement();
        let output = self.controller.compute(self.setpoint, measured);
        let measurement = self.plant.apply(output);

        let record = StepRecord {
            step: self.step,
            setpoint: self.setpoint,
            output,
            measurement,
        };
        tracing::trace!(?record, "control step");

        self.step = self.step.saturating_add(1);
        record
    }

    /// Return both controller and plant to their initial state.
    pub fn reset(&mut self) {
        self.controller.reset();
        self.plant.reset();
        self.step = 0;
    }
}
