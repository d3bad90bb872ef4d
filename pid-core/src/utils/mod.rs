//! Utility re-exports for the PID control core.
//!
//! - `controllers`: the PID controller and the closed-loop driver
//! - `plant`: process models the loop can drive (simulated motor)
//! - `time`: monotonic clock abstraction and the elapsed-time floor

pub mod controllers;
pub mod plant;
pub mod time;

pub use controllers::{
    pid::{ConfigError, Gains, PidConfig, PidController},
    ControlLoop, StepRecord,
};
pub use plant::{MotorModel, MotorParams, Plant};
#[cfg(feature = "std")]
pub use time::MonotonicClock;
pub use time::{Clock, ManualClock};
