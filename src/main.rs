//! Autocar — host entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  Sim peripherals     LogEventSink     stdin token reader       │
//! │  (Motor/Servo/...)   (EventSink)      (operator input)         │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │  CommandQueue ─▶ Vehicle ─▶ ModeController ─▶ loops    │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Usage: `autocar [config.json] [--tune-encoder]`
//!
//! Each stdin line is one command token (`forward`, `selfdrivingon`, ...).
//! `bump` briefly trips the simulated front bumper.  EOF shuts down.
#![deny(unused_must_use)]

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{info, warn};

use autocar::adapters::log_sink::LogEventSink;
use autocar::adapters::sim::sim_car;
use autocar::adapters::video::ProcessVideoService;
use autocar::app::ports::Services;
use autocar::app::queue::CommandQueue;
use autocar::app::service::Vehicle;
use autocar::config::VehicleConfig;
use autocar::control::turn::TurnCalibrator;
use autocar::task::{delay_ms, detach};

/// Motor duty used while calibrating turns.
const TUNING_SPEED: u8 = 30;

fn main() -> Result<()> {
    // ── 1. Logging ────────────────────────────────────────────
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("╔══════════════════════════════════════╗");
    info!("║  Autocar v{}                        ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Arguments and config ───────────────────────────────
    let args: Vec<String> = std::env::args().skip(1).collect();
    let tune = args.iter().any(|a| a == "--tune-encoder");
    let config = match args.iter().find(|a| !a.starts_with("--")) {
        Some(path) => VehicleConfig::load(Path::new(path))
            .with_context(|| format!("loading config from {path}"))?,
        None => {
            info!("No config file given, using defaults");
            VehicleConfig::default()
        }
    };

    // ── 3. Simulated hardware ─────────────────────────────────
    let car = sim_car();

    if tune {
        let turner = TurnCalibrator::new(&car.peripherals, &config);
        car.peripherals.motor.set_speed(TUNING_SPEED);
        info!("Tuning at speed {}", car.motor.speed());
        return tune_encoder(&turner);
    }

    // ── 4. Vehicle + command queue ────────────────────────────
    let services = Services {
        video: Some(Arc::new(ProcessVideoService::new(&config.video))),
        ..Services::default()
    };
    let vehicle = Arc::new(Vehicle::new(
        car.peripherals.clone(),
        services,
        config,
        Arc::new(LogEventSink::new()),
    ));
    vehicle.start();
    let queue = CommandQueue::spawn(Arc::clone(&vehicle));

    info!("Ready. One command per line; EOF to quit.");

    // ── 5. Operator input ─────────────────────────────────────
    for line in io::stdin().lock().lines() {
        let line = line.context("reading stdin")?;
        let token = line.trim();
        if token.is_empty() {
            continue;
        }
        if token.eq_ignore_ascii_case("bump") {
            let bumper = Arc::clone(&car.bumpers[0]);
            detach("bump", move || {
                bumper.set(true);
                delay_ms(100);
                bumper.set(false);
            });
            continue;
        }
        queue.submit(token);
    }

    info!("Input closed, shutting down");
    queue.shutdown();
    Ok(())
}

/// Interactive turn calibration: spin by a signed pulse count, 0 exits.
fn tune_encoder(turner: &TurnCalibrator) -> Result<()> {
    let stdin = io::stdin();
    let mut out = io::stdout();
    let mut line = String::new();
    loop {
        write!(out, "pulses (negative = left, 0 = exit): ")?;
        out.flush()?;
        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(());
        }
        match line.trim().parse::<i32>() {
            Ok(0) => return Ok(()),
            Ok(n) => {
                if !turner.spin_pulses(n) {
                    warn!("Spin of {} pulses did not complete", n);
                }
            }
            Err(_) => warn!("Not a number: '{}'", line.trim()),
        }
    }
}
