mod config;

use std::{path::PathBuf, thread, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use pid_core::utils::{ControlLoop, MonotonicClock, MotorModel, PidController, Plant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::SimConfig;

#[derive(Parser)]
#[command(
    version = "1.0",
    about = "Drive a simulated motor with a PID controller",
    allow_negative_numbers = true
)]
struct Opts {
    /// JSON file with loop settings; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,
    /// number of control steps
    #[arg(long)]
    steps: Option<u32>,
    /// sleep between steps, in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,
    /// target motor speed
    #[arg(long)]
    setpoint: Option<f64>,
    #[arg(long)]
    kp: Option<f64>,
    #[arg(long)]
    ki: Option<f64>,
    #[arg(long)]
    kd: Option<f64>,
    /// bound the integral accumulator to +/- this value
    #[arg(long)]
    integral_limit: Option<f64>,
    /// print one JSON record per step on stdout
    #[arg(long)]
    json: bool,
}

impl Opts {
    fn apply(
        &self,
        config: &mut SimConfig,
    ) {
        if let Some(steps) = self.steps {
            config.steps = steps;
        }
        if let Some(ms) = self.interval_ms {
            config.interval_ms = ms;
        }
        if let Some(sp) = self.setpoint {
            config.setpoint = sp;
        }
        if let Some(kp) = self.kp {
            config.pid.kp = kp;
        }
        if let Some(ki) = self.ki {
            config.pid.ki = ki;
        }
        if let Some(kd) = self.kd {
            config.pid.kd = kd;
        }
        if self.integral_limit.is_some() {
            config.pid.integral_limit = self.integral_limit;
        }
    }
}

fn run(opts: &Opts) -> Result<()> {
    let mut config = match &opts.config {
        Some(path) => SimConfig::load(path)?,
        None => SimConfig::default(),
    };
    opts.apply(&mut config);
    for change in config.unreachable_changes() {
        warn!(
            at_step = change.at_step,
            steps = config.steps,
            "setpoint change scheduled past the last step is ignored"
        );
    }

    let pid = PidController::from_config(config.pid, MonotonicClock::new())
        .context("invalid controller settings")?;
    let mut lp = ControlLoop::new(pid, MotorModel::new(config.motor), config.setpoint);
    let interval = Duration::from_millis(config.interval_ms);

    info!(
        gains = ?config.pid.gains(),
        setpoint = config.setpoint,
        steps = config.steps,
        interval_ms = config.interval_ms,
        "starting motor simulation"
    );

    for step in 0..config.steps {
        for change in config.changes_at(step) {
            lp.set_setpoint(change.setpoint, change.reset);
        }

        let rec = lp.step();
        if opts.json {
            println!("{}", serde_json::to_string(&rec)?);
        } else {
            info!(
                "Step {}: motor input = {:.4}, speed = {:.4}",
                rec.step, rec.output, rec.measurement
            );
        }

        thread::sleep(interval);
    }

    info!(speed = lp.plant.measurement(), "simulation finished");
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let opts = Opts::parse();
    run(&opts)
}
