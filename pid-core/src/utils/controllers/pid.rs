//! Time-aware PID controller.
//!
//! Each `compute` call measures the time since the previous call on an
//! injected monotonic [`Clock`], integrates the error with a rectangular rule
//! and differentiates it against the previous error:
//!
//! ```text
//! error      = setpoint - measured
//! integral  += error * dt
//! derivative = (error - previous_error) / dt
//! output     = kp * error + ki * integral + kd * derivative
//! ```
//!
//! A zero or negative `dt` is replaced by [`FLOOR_SECS`]. The output is never
//! clamped and NaN or infinite inputs propagate arithmetically. The integral
//! is unbounded unless `PidConfig::integral_limit` is set.
//!
//! # Example
//! ```rust
//! use core::time::Duration;
//! use pid_core::utils::{ManualClock, PidController};
//!
//! let clock = ManualClock::default();
//! let mut pid = PidController::with_clock(1.0, 0.1, 0.05, &clock);
//! clock.advance(Duration::from_secs(1));
//! let output = pid.compute(10.0, 0.0);
//! assert!((output - 11.5).abs() < 1e-9);
//! ```

use core::{fmt, time::Duration};

use serde::{Deserialize, Serialize};

#[cfg(feature = "std")]
use crate::utils::time::MonotonicClock;
use crate::utils::time::{self, Clock, FLOOR_SECS};

/// Consecutive floored steps before a warning is logged.
pub const DEFAULT_FLOOR_WARN_AFTER: u32 = 8;

/// Proportional, integral and derivative gains.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

/// Errors raised while building a controller from a [`PidConfig`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigError {
    /// The integral limit was negative or NaN.
    InvalidIntegralLimit(f64),
}

impl fmt::Display for ConfigError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            ConfigError::InvalidIntegralLimit(limit) => {
                write!(f, "integral limit must be a non-negative number, got {}", limit)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

/// Serializable controller settings.
///
/// Only the gains are required; JSON such as `{"kp":1.0,"ki":0.1,"kd":0.05}`
/// yields an unbounded integral and the default floor warning threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidConfig {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    /// Symmetric bound applied to the integral accumulator. `None` = unbounded.
    #[serde(default)]
    pub integral_limit: Option<f64>,
    /// Consecutive floored steps before a warning; 0 disables it.
    #[serde(default = "default_floor_warn_after")]
    pub floor_warn_after: u32,
}

fn default_floor_warn_after() -> u32 {
    DEFAULT_FLOOR_WARN_AFTER
}

impl PidConfig {
    pub fn new(
        kp: f64,
        ki: f64,
        kd: f64,
    ) -> Self {
        Self {
            kp,
            ki,
            kd,
            integral_limit: None,
            floor_warn_after: DEFAULT_FLOOR_WARN_AFTER,
        }
    }

    /// Builder: bound the integral accumulator to `[-limit, limit]`.
    pub fn with_integral_limit(
        mut self,
        limit: f64,
    ) -> Self {
        self.integral_limit = Some(limit);
        self
    }

    /// Builder: set the floor warning threshold.
    pub fn with_floor_warn_after(
        mut self,
        steps: u32,
    ) -> Self {
        self.floor_warn_after = steps;
        self
    }

    pub fn gains(&self) -> Gains {
        Gains {
            kp: self.kp,
            ki: self.ki,
            kd: self.kd,
        }
    }

    /// Check the optional settings. Gains are accepted as-is.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.integral_limit {
            Some(limit) if limit.is_nan() || limit < 0.0 => {
                Err(ConfigError::InvalidIntegralLimit(limit))
            }
            _ => Ok(()),
        }
    }
}

/// Single-loop PID controller.
///
/// Plain mutable value: callers sharing one instance across threads must
/// serialize access themselves.
#[derive(Debug, Clone)]
pub struct PidController<C> {
    gains: Gains,
    integral_limit: Option<f64>,
    floor_warn_after: u32,

    // State
    previous_error: f64,
    integral: f64,
    previous_timestamp: Duration,
    floor_hits: u32,

    clock: C,
}

#[cfg(feature = "std")]
impl PidController<MonotonicClock> {
    /// Create a controller reading the process monotonic clock.
    pub fn new(
        kp: f64,
        ki: f64,
        kd: f64,
    ) -> Self {
        Self::with_clock(kp, ki, kd, MonotonicClock::new())
    }
}

impl<C: Clock> PidController<C> {
    /// Create a controller reading time from `clock`.
    ///
    /// The current reading becomes the previous timestamp, so the first
    /// `compute` integrates over the time since construction.
    pub fn with_clock(
        kp: f64,
        ki: f64,
        kd: f64,
        clock: C,
    ) -> Self {
        let previous_timestamp = clock.now();
        Self {
            gains: Gains { kp, ki, kd },
            integral_limit: None,
            floor_warn_after: DEFAULT_FLOOR_WARN_AFTER,
            previous_error: 0.0,
            integral: 0.0,
            previous_timestamp,
            floor_hits: 0,
            clock,
        }
    }

    pub fn from_config(
        config: PidConfig,
        clock: C,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut pid = Self::with_clock(config.kp, config.ki, config.kd, clock);
        pid.integral_limit = config.integral_limit;
        pid.floor_warn_after = config.floor_warn_after;
        Ok(pid)
    }

    /// Advance one control step and return the unclamped output.
    #[must_use = "the control output should be applied to the actuator"]
    pub fn compute(
        &mut self,
        setpoint: f64,
        measured_value: f64,
    ) -> f64 {
        let now = self.clock.now();
        let (dt, floored) = time::elapsed_secs(self.previous_timestamp, now);
        self.track_floor(floored);

        let error = setpoint - measured_value;

        self.integral += error * dt;
        if let Some(limit) = self.integral_limit {
            self.integral = self.integral.clamp(-limit, limit);
        }

        let derivative = (error - self.previous_error) / dt;

        let Gains { kp, ki, kd } = self.gains;
        let output = kp * error + ki * self.integral + kd * derivative;

        self.previous_error = error;
        self.previous_timestamp = now;

        output
    }

    /// Discard accumulated history. Gains and limits are kept.
    pub fn reset(&mut self) {
        self.previous_error = 0.0;
        self.integral = 0.0;
        self.previous_timestamp = self.clock.now();
        self.floor_hits = 0;
        tracing::debug!("pid state reset");
    }

    pub fn gains(&self) -> Gains {
        self.gains
    }

    pub fn integral_limit(&self) -> Option<f64> {
        self.integral_limit
    }

    /// Error seen by the last `compute`, or 0 when fresh.
    pub fn previous_error(&self) -> f64 {
        self.previous_error
    }

    /// Raw accumulator (sum of `error * dt`), before scaling by `ki`.
    pub fn integral(&self) -> f64 {
        self.integral
    }

    /// Number of back-to-back steps that ran on the floored elapsed time.
    pub fn consecutive_floor_hits(&self) -> u32 {
        self.floor_hits
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    fn track_floor(
        &mut self,
        floored: bool,
    ) {
        if !floored {
            self.floor_hits = 0;
            return;
        }

        self.floor_hits = self.floor_hits.saturating_add(1);
        tracing::debug!(hits = self.floor_hits, "elapsed time floored to {}s", FLOOR_SECS);
        if self.floor_warn_after != 0 && self.floor_hits == self.floor_warn_after {
            tracing::warn!(
                hits = self.floor_hits,
                "compute is being called faster than the {}s time resolution",
                FLOOR_SECS
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::time::ManualClock;

    fn approx(
        a: f64,
        b: f64,
    ) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_worked_example() {
        let clock = ManualClock::default();
        let mut pid = PidController::with_clock(1.0, 0.1, 0.05, &clock);
        clock.advance(Duration::from_secs(1));

        let out = pid.compute(10.0, 0.0);
        assert!(approx(out, 11.5), "got {}", out);
        assert!(approx(pid.integral(), 10.0));
        assert_eq!(pid.previous_error(), 10.0);
    }

    #[test]
    fn test_zero_error_is_a_fixed_point() {
        let clock = ManualClock::default();
        let mut pid = PidController::with_clock(2.0, 0.7, 0.3, &clock);
        for _ in 0..20 {
            clock.advance(Duration::from_millis(100));
            assert_eq!(pid.compute(4.2, 4.2), 0.0);
        }
        assert_eq!(pid.integral(), 0.0);
    }

    #[test]
    fn test_proportional_only_ignores_elapsed_time() {
        let clock = ManualClock::default();
        let mut pid = PidController::with_clock(2.5, 0.0, 0.0, &clock);
        for (step, ms) in [0u64, 1, 37, 1000, 0, 5].into_iter().enumerate() {
            clock.advance(Duration::from_millis(ms));
            let measured = step as f64;
            assert_eq!(pid.compute(10.0, measured), 2.5 * (10.0 - measured));
        }
    }

    #[test]
    fn test_integral_accumulates_linearly() {
        let clock = ManualClock::default();
        let mut pid = PidController::with_clock(0.0, 1.0, 0.0, &clock);
        let mut last = f64::NEG_INFINITY;
        for n in 1..=10 {
            clock.advance(Duration::from_millis(500));
            let out = pid.compute(3.0, 1.0);
            assert!(out > last, "output must grow: {} <= {}", out, last);
            assert!(approx(pid.integral(), n as f64 * 2.0 * 0.5));
            last = out;
        }
    }

    #[test]
    fn test_derivative_uses_true_elapsed_time() {
        let clock = ManualClock::default();
        let mut pid = PidController::with_clock(0.0, 0.0, 1.0, &clock);
        clock.advance(Duration::from_millis(250));
        // error jumps 0 -> 2 over 0.25 s
        assert!(approx(pid.compute(2.0, 0.0), 8.0));
        clock.advance(Duration::from_millis(500));
        // error falls 2 -> 1 over 0.5 s
        assert!(approx(pid.compute(1.0, 0.0), -2.0));
    }

    #[test]
    fn test_zero_elapsed_uses_floor() {
        let clock = ManualClock::default();
        let mut pid = PidController::with_clock(0.0, 0.0, 1.0, &clock);

        let out = pid.compute(1.0, 0.0);
        assert!(approx(out, 1.0 / FLOOR_SECS));
        assert!(approx(pid.integral(), FLOOR_SECS));
        assert_eq!(pid.consecutive_floor_hits(), 1);

        let out = pid.compute(1.0, 0.0);
        assert_eq!(out, 0.0);
        assert_eq!(pid.consecutive_floor_hits(), 2);
    }

    #[test]
    fn test_negative_elapsed_uses_floor() {
        let clock = ManualClock::starting_at(Duration::from_secs(5));
        let mut pid = PidController::with_clock(0.0, 1.0, 1.0, &clock);
        clock.set(Duration::from_secs(2));

        let out = pid.compute(1.0, 0.0);
        assert!(out.is_finite());
        assert!(approx(out, FLOOR_SECS + 1.0 / FLOOR_SECS));

        // the earlier reading becomes the new reference
        clock.advance(Duration::from_secs(1));
        let _ = pid.compute(1.0, 0.0);
        assert!(approx(pid.integral(), FLOOR_SECS + 1.0));
        assert_eq!(pid.consecutive_floor_hits(), 0);
    }

    #[test]
    fn test_reset_restores_fresh_behaviour() {
        let clock = ManualClock::default();
        let mut fresh = PidController::with_clock(1.0, 0.1, 0.05, &clock);
        let mut used = PidController::with_clock(1.0, 0.1, 0.05, &clock);

        clock.advance(Duration::from_millis(300));
        let _ = used.compute(50.0, -3.0);
        clock.advance(Duration::from_millis(300));
        let _ = used.compute(7.0, 1.0);

        used.reset();
        used.reset();
        fresh.reset();
        assert_eq!(used.previous_error(), 0.0);
        assert_eq!(used.integral(), 0.0);
        assert_eq!(used.gains(), fresh.gains());

        clock.advance(Duration::from_secs(1));
        assert_eq!(used.compute(10.0, 0.0), fresh.compute(10.0, 0.0));
    }

    #[test]
    fn test_nan_propagates() {
        let clock = ManualClock::default();
        let mut pid = PidController::with_clock(1.0, 1.0, 1.0, &clock);
        clock.advance(Duration::from_millis(10));
        assert!(pid.compute(f64::NAN, 0.0).is_nan());
        clock.advance(Duration::from_millis(10));
        // the accumulator stays poisoned
        assert!(pid.compute(1.0, 0.0).is_nan());
        pid.reset();
        clock.advance(Duration::from_millis(10));
        assert!(pid.compute(1.0, 0.0).is_finite());
    }

    #[test]
    fn test_negative_gains_accepted() {
        let clock = ManualClock::default();
        let mut pid = PidController::with_clock(-1.0, 0.0, 0.0, &clock);
        clock.advance(Duration::from_millis(10));
        assert_eq!(pid.compute(1.0, 0.0), -1.0);
    }

    #[test]
    fn test_integral_limit_clamps_accumulator() {
        let clock = ManualClock::default();
        let config = PidConfig::new(0.0, 1.0, 0.0).with_integral_limit(2.0);
        let mut pid = PidController::from_config(config, &clock).unwrap();
        assert_eq!(pid.integral_limit(), Some(2.0));
        for _ in 0..10 {
            clock.advance(Duration::from_secs(1));
            let _ = pid.compute(1.0, 0.0);
        }
        assert_eq!(pid.integral(), 2.0);
        clock.advance(Duration::from_secs(1));
        assert_eq!(pid.compute(-10.0, 0.0), -2.0);
    }

    #[test]
    fn test_config_rejects_bad_integral_limit() {
        let clock = ManualClock::default();
        let err = PidController::from_config(PidConfig::new(1.0, 0.0, 0.0).with_integral_limit(-1.0), &clock)
            .unwrap_err();
        assert_eq!(err, ConfigError::InvalidIntegralLimit(-1.0));
        let unbounded = PidController::with_clock(1.0, 0.0, 0.0, &clock);
        assert_eq!(unbounded.integral_limit(), None);
        assert!(PidConfig::new(1.0, 0.0, 0.0)
            .with_integral_limit(f64::NAN)
            .validate()
            .is_err());
        assert!(PidConfig::new(1.0, 0.0, 0.0).with_integral_limit(0.0).validate().is_ok());
    }

    #[test]
    fn test_config_defaults_from_json() {
        let config: PidConfig = serde_json::from_str(r#"{"kp":1.0,"ki":0.1,"kd":0.05}"#).unwrap();
        assert_eq!(config, PidConfig::new(1.0, 0.1, 0.05));
        assert_eq!(config.integral_limit, None);
        assert_eq!(config.floor_warn_after, DEFAULT_FLOOR_WARN_AFTER);

        let config: PidConfig = serde_json::from_str(
            r#"{"kp":1.0,"ki":0.1,"kd":0.05,"integral_limit":5.0,"floor_warn_after":0}"#,
        )
        .unwrap();
        assert_eq!(config.integral_limit, Some(5.0));
        assert_eq!(config.floor_warn_after, 0);
    }

    #[test]
    fn test_floor_counter_clears_on_normal_step() {
        let clock = ManualClock::default();
        let config = PidConfig::new(1.0, 0.0, 0.0).with_floor_warn_after(2);
        let mut pid = PidController::from_config(config, &clock).unwrap();
        for _ in 0..3 {
            let _ = pid.compute(1.0, 0.0);
        }
        assert_eq!(pid.consecutive_floor_hits(), 3);
        clock.advance(Duration::from_millis(5));
        let _ = pid.compute(1.0, 0.0);
        assert_eq!(pid.consecutive_floor_hits(), 0);
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_monotonic_controller_smoke() {
        let mut pid = PidController::new(1.0, 0.1, 0.05);
        let out = pid.compute(10.0, 0.0);
        assert!(out.is_finite());
        assert!(out >= 10.0);
    }

    #[cfg(feature = "std")]
    mod floor_warning {
        use std::sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        };

        use tracing::{Event, Level, Subscriber};
        use tracing_subscriber::{
            layer::{Context, SubscriberExt},
            Layer, Registry,
        };

        use super::*;

        /// Counts WARN events seen by the subscriber.
        struct WarnCounter(Arc<AtomicUsize>);

        impl<S: Subscriber> Layer<S> for WarnCounter {
            fn on_event(
                &self,
                event: &Event<'_>,
                _ctx: Context<'_, S>,
            ) {
                if *event.metadata().level() == Level::WARN {
                    self.0.fetch_add(1, Ordering::SeqCst);
                }
            }
        }

        /// Run `f` with a subscriber installed and return the WARN count.
        fn count_warnings(f: impl FnOnce()) -> usize {
            let warnings = Arc::new(AtomicUsize::new(0));
            let subscriber = Registry::default().with(WarnCounter(warnings.clone()));
            tracing::subscriber::with_default(subscriber, f);
            warnings.load(Ordering::SeqCst)
        }

        fn floored_steps(
            pid: &mut PidController<&ManualClock>,
            n: u32,
        ) {
            for _ in 0..n {
                let _ = pid.compute(1.0, 0.0);
            }
        }

        #[test]
        fn test_warns_once_per_run_of_floored_steps() {
            let clock = ManualClock::default();
            let config = PidConfig::new(1.0, 0.0, 0.0).with_floor_warn_after(3);
            let mut pid = PidController::from_config(config, &clock).unwrap();

            let first_run = count_warnings(|| floored_steps(&mut pid, 5));
            assert_eq!(first_run, 1);
            assert_eq!(pid.consecutive_floor_hits(), 5);

            let second_run = count_warnings(|| {
                clock.advance(Duration::from_millis(10));
                let _ = pid.compute(1.0, 0.0);
                floored_steps(&mut pid, 5);
            });
            assert_eq!(second_run, 1);
        }

        #[test]
        fn test_below_threshold_does_not_warn() {
            let clock = ManualClock::default();
            let config = PidConfig::new(1.0, 0.0, 0.0).with_floor_warn_after(3);
            let mut pid = PidController::from_config(config, &clock).unwrap();
            let warnings = count_warnings(|| floored_steps(&mut pid, 2));
            assert_eq!(warnings, 0);
        }

        #[test]
        fn test_zero_threshold_disables_warning() {
            let clock = ManualClock::default();
            let config = PidConfig::new(1.0, 0.0, 0.0).with_floor_warn_after(0);
            let mut pid = PidController::from_config(config, &clock).unwrap();
            let warnings = count_warnings(|| floored_steps(&mut pid, 20));
            assert_eq!(warnings, 0);
            assert_eq!(pid.consecutive_floor_hits(), 20);
        }
    }
}
