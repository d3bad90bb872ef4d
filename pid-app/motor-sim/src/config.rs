//! Simulation settings, loaded from JSON.
//!
//! Top-level fields and `motor` fields are optional; missing ones fall back to
//! the stock demo (gains 1.0 / 0.1 / 0.05, target speed 10, 100 steps every
//! 100 ms). A `pid` object, when present, must give all of `kp`, `ki` and `kd`.
//!
//! ```json
//! {
//!   "pid": { "kp": 1.0, "ki": 0.1, "kd": 0.05, "integral_limit": 50.0 },
//!   "setpoint": 10.0,
//!   "steps": 200,
//!   "interval_ms": 50,
//!   "motor": { "damping": 0.85 },
//!   "schedule": [ { "at_step": 100, "setpoint": 4.0, "reset": true } ]
//! }
//! ```

use std::{fs, path::Path};

use anyhow::{Context, Result};
use pid_core::utils::{MotorParams, PidConfig};
use serde::{Deserialize, Serialize};

/// Setpoint jump applied before the given step runs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SetpointChange {
    pub at_step: u32,
    pub setpoint: f64,
    /// Discard controller history at the jump.
    #[serde(default)]
    pub reset: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub pid: PidConfig,
    pub setpoint: f64,
    pub steps: u32,
    pub interval_ms: u64,
    pub motor: MotorParams,
    pub schedule: Vec<SetpointChange>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            pid: PidConfig::new(1.0, 0.1, 0.05),
            setpoint: 10.0,
            steps: 100,
            interval_ms: 100,
            motor: MotorParams::default(),
            schedule: Vec::new(),
        }
    }
}

impl SimConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: SimConfig = serde_json::from_str(text)?;
        config.pid.validate()?;
        Ok(config)
    }

    /// Scheduled changes that fire before `step`, in file order.
    pub fn changes_at(
        &self,
        step: u32,
    ) -> impl Iterator<Item = &SetpointChange> {
        self.schedule.iter().filter(move |c| c.at_step == step)
    }

    /// Scheduled changes that can never fire because they fall at or past `steps`.
    pub fn unreachable_changes(&self) -> impl Iterator<Item = &SetpointChange> {
        self.schedule.iter().filter(move |c| c.at_step >= self.steps)
    }
}
