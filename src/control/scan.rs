//! Servo sweep for the nearest and farthest obstacle.

use std::sync::Arc;

use log::{debug, warn};

use crate::app::ports::{DistancePort, Peripherals, ServoPort};
use crate::config::{MAX_ANGLES, VehicleConfig};
use crate::fsm::context::VehicleState;
use crate::task::delay_ms;

/// Outcome of one sweep.  Distances are in cm; negative means no valid
/// reading was taken at any angle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanResult {
    pub min_dist: f32,
    pub max_dist: f32,
    pub min_angle: i32,
    pub max_angle: i32,
}

impl ScanResult {
    pub const INVALID: Self = Self {
        min_dist: -1.0,
        max_dist: -1.0,
        min_angle: 0,
        max_angle: 0,
    };

    pub fn is_valid(&self) -> bool {
        self.min_dist >= 0.0 && self.max_dist >= 0.0
    }

    /// Fold `(angle, distance)` readings into a result.  Invalid readings
    /// are skipped; on ties the first angle wins.
    pub fn from_readings(readings: impl IntoIterator<Item = (i32, f32)>) -> Self {
        let mut result: Option<Self> = None;
        for (angle, dist) in readings {
            if dist < 0.0 {
                continue;
            }
            let r = result.get_or_insert(Self {
                min_dist: dist,
                max_dist: dist,
                min_angle: angle,
                max_angle: angle,
            });
            if dist < r.min_dist {
                r.min_dist = dist;
                r.min_angle = angle;
            }
            if dist > r.max_dist {
                r.max_dist = dist;
                r.max_angle = angle;
            }
        }
        result.unwrap_or(Self::INVALID)
    }
}

/// Sweeps the distance sensor across a fixed angle list.
#[derive(Clone)]
pub struct ScanSweep {
    servo: Option<Arc<dyn ServoPort>>,
    distance: Option<Arc<dyn DistancePort>>,
    state: Arc<VehicleState>,
    angles: heapless::Vec<i32, MAX_ANGLES>,
    settle_ms: u64,
    retries: u8,
    recenter_ms: u64,
}

impl ScanSweep {
    pub fn new(hw: &Peripherals, state: Arc<VehicleState>, config: &VehicleConfig) -> Self {
        Self {
            servo: hw.servo.clone(),
            distance: hw.distance.clone(),
            state,
            angles: config.scan_angles.clone(),
            settle_ms: config.scan_settle_ms,
            retries: config.scan_retries,
            recenter_ms: config.scan_recenter_ms,
        }
    }

    /// Visit every angle, then recentre the servo.
    pub fn sweep(&self) -> ScanResult {
        let Some(distance) = self.distance.as_deref() else {
            warn!("Scan without a distance sensor");
            return ScanResult::INVALID;
        };

        let readings = self.angles.iter().filter_map(|&angle| {
            self.roll(angle);
            delay_ms(self.settle_ms);
            let mut d = distance.measure_cm();
            for _ in 0..self.retries {
                if d >= 0.0 {
                    break;
                }
                delay_ms(self.settle_ms);
                d = distance.measure_cm();
            }
            if d < 0.0 {
                debug!("scan: no reading at {}°", angle);
                return None;
            }
            debug!("scan: {}° = {:.0}cm", angle, d);
            Some((angle, d))
        });
        let result = ScanResult::from_readings(readings);

        self.roll(0);
        delay_ms(self.recenter_ms);
        result
    }

    fn roll(&self, angle: i32) {
        let angle = self.state.set_servo_angle(angle);
        if let Some(servo) = &self.servo {
            servo.roll_to(angle);
        }
    }
}
