//! Calibrated in-place turns.
//!
//! The car has no heading sensor.  A turn is a spin whose length is
//! measured in wheel-encoder pulses, looked up from a table calibrated on
//! the real vehicle (see the `--tune-encoder` console).  Only the angles in
//! the table are supported; anything else is a logged no-op.

use std::sync::Arc;
use std::time::{Duration, Instant};

use heapless::LinearMap;
use log::{debug, info, warn};

use crate::app::ports::{EncoderPort, MotorPort, Peripherals};
use crate::config::{MAX_ANGLES, VehicleConfig};
use crate::task::delay_ms;

/// Supported heading change (degrees) → encoder pulses.
pub type TurnTable = LinearMap<i32, u32, MAX_ANGLES>;

/// Counts pulses while alive; stops the encoder on drop, including the
/// early return of a stalled turn.
struct EncoderSession<'a>(&'a dyn EncoderPort);

impl<'a> EncoderSession<'a> {
    fn start(encoder: &'a dyn EncoderPort) -> Self {
        encoder.start();
        Self(encoder)
    }

    fn count(&self) -> u32 {
        self.0.pulse_count()
    }
}

impl Drop for EncoderSession<'_> {
    fn drop(&mut self) {
        self.0.stop();
    }
}

/// Turns the car by a discrete angle using encoder pulse counts.
#[derive(Clone)]
pub struct TurnCalibrator {
    table: TurnTable,
    motor: Arc<dyn MotorPort>,
    encoder: Option<Arc<dyn EncoderPort>>,
    poll_ms: u64,
    timeout: Duration,
}

impl TurnCalibrator {
    pub fn new(hw: &Peripherals, config: &VehicleConfig) -> Self {
        let mut table = TurnTable::new();
        for entry in &config.turn_table {
            if table.insert(entry.angle, entry.pulses).is_err() {
                warn!("Turn table full, dropping {}°", entry.angle);
            }
        }
        Self {
            table,
            motor: Arc::clone(&hw.motor),
            encoder: hw.encoder.clone(),
            poll_ms: config.turn_poll_ms,
            timeout: Duration::from_millis(config.turn_timeout_ms),
        }
    }

    /// Pulse count for `angle`, if the angle is calibrated.
    pub fn pulses_for(&self, angle: i32) -> Option<u32> {
        self.table.get(&angle).copied()
    }

    /// Spin by `angle` degrees (negative = left).  Returns whether the
    /// turn completed.
    pub fn turn(&self, angle: i32) -> bool {
        let Some(pulses) = self.pulses_for(angle) else {
            warn!("Unsupported turn angle: {}°", angle);
            return false;
        };
        debug!("turn {}° = {} pulses", angle, pulses);
        let signed = if angle < 0 {
            -(pulses as i32)
        } else {
            pulses as i32
        };
        self.spin_pulses(signed)
    }

    /// Spin until the encoder has counted `|count|` pulses (negative =
    /// left).  Returns whether the count was reached before the timeout.
    pub fn spin_pulses(&self, count: i32) -> bool {
        if count == 0 {
            return true;
        }
        let Some(encoder) = self.encoder.as_deref() else {
            warn!("No encoder fitted, cannot turn");
            return false;
        };
        let target = count.unsigned_abs();

        if count < 0 {
            self.motor.left();
        } else {
            self.motor.right();
        }

        let session = EncoderSession::start(encoder);
        let started = Instant::now();
        let mut reached = true;
        while session.count() < target {
            if started.elapsed() >= self.timeout {
                warn!(
                    "Turn stalled: {}/{} pulses after {:?}",
                    session.count(),
                    target,
                    self.timeout
                );
                reached = false;
                break;
            }
            delay_ms(self.poll_ms);
        }
        self.motor.stop();
        drop(session);

        if reached {
            info!("Turned {} pulses {}", target, if count < 0 { "left" } else { "right" });
        }
        reached
    }
}
