//! Vehicle configuration parameters
//!
//! All tunable timings, thresholds and calibration tables for the car.
//! Every field has a default matching the reference vehicle; a JSON file
//! may override any subset of them.

use std::path::Path;

use heapless::Vec;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::speech::Intent;

/// Maximum entries in any angle list (scan sweep, obstacle pattern).
pub const MAX_ANGLES: usize = 16;

/// One row of the turn calibration table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnEntry {
    /// Heading change in degrees (negative = left).
    pub angle: i32,
    /// Encoder pulses needed to spin by `angle`.
    pub pulses: u32,
}

/// Core vehicle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleConfig {
    // --- Command queue ---
    /// Operator command queue depth
    pub command_queue_capacity: usize,

    // --- Mode arbitration ---
    /// Delay between clearing the old mode and raising the new one (ms)
    pub mode_grace_ms: u64,
    /// Motor settle time after a navigation loop exits (ms)
    pub loop_settle_ms: u64,
    /// Warning beeps before self-driving starts
    pub warning_beeps: u32,
    /// Interval between warning beeps (ms)
    pub warning_beep_interval_ms: u64,

    // --- Navigation loop ---
    /// Poll period while driving forward (ms)
    pub forward_poll_ms: u64,
    /// Pause between stopping and the next manoeuvre (ms)
    pub brake_pause_ms: u64,
    /// Reverse duration when backing off an obstacle (ms)
    pub backward_ms: u64,
    /// Pause after a calibrated turn (ms)
    pub turn_settle_ms: u64,
    /// Idle period of the pause op (ms)
    pub pause_ms: u64,
    /// Back-off attempts before turning regardless of a close obstacle
    pub max_backoff_retries: u8,

    // --- Distance thresholds ---
    /// Below this distance the car backs off (cm)
    pub near_cm: f32,
    /// Below this distance the car stops and rescans (cm)
    pub caution_cm: f32,

    // --- Scan sweep ---
    /// Servo angles visited by a full scan (degrees)
    pub scan_angles: Vec<i32, MAX_ANGLES>,
    /// Servo settle time before each reading (ms)
    pub scan_settle_ms: u64,
    /// Extra attempts for an invalid reading
    pub scan_retries: u8,
    /// Settle time after recentring the servo (ms)
    pub scan_recenter_ms: u64,

    // --- Calibrated turns ---
    /// Supported turn angles and their encoder pulse counts
    pub turn_table: Vec<TurnEntry, MAX_ANGLES>,
    /// Encoder poll period during a turn (ms)
    pub turn_poll_ms: u64,
    /// Turn is abandoned if the count is not reached within this (ms)
    pub turn_timeout_ms: u64,

    // --- Watchers ---
    /// Collision switch poll period (ms)
    pub collision_poll_ms: u64,
    /// Servo pattern swept while driving forward (degrees)
    pub obstacle_pattern: Vec<i32, MAX_ANGLES>,
    /// Servo settle time before each forward reading (ms)
    pub obstacle_settle_ms: u64,

    /// Visual tracking parameters
    pub tracking: TrackingConfig,
    /// Voice command parameters
    pub speech: SpeechConfig,
    /// Operator (manual) command parameters
    pub manual: ManualConfig,
    /// Video recording service commands
    pub video: VideoConfig,
}

/// Visual-tracking (target following) parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Tracker poll period while looking for a target (ms)
    pub poll_ms: u64,
    /// Search turn per attempt when the target is lost (degrees)
    pub search_step_deg: i32,
    /// Cumulative search after which the watcher gives up (degrees)
    pub search_limit_deg: i32,
    /// Settle time after each search turn (ms)
    pub search_settle_ms: u64,
    /// Bounding-box bottom edge beyond which the target is too close (px)
    pub near_y: i32,
    /// Centroid x below which the car steers right (px)
    pub left_x: i32,
    /// Centroid x above which the car steers left (px)
    pub right_x: i32,
    /// Duration of one steering pulse (ms)
    pub pulse_ms: u64,
    /// Settle after closing the tracker before restarting video (ms)
    pub close_settle_ms: u64,
}

/// Voice-command parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Length of each recorded clip (seconds)
    pub clip_secs: u32,
    /// Reverse duration for the voice "back" command (ms)
    pub backward_ms: u64,
    /// Idle period of the stop op (ms)
    pub stop_idle_ms: u64,
    /// Pause around voice-commanded turns (ms)
    pub turn_pause_ms: u64,
    /// Back-off after a failed listen cycle (ms)
    pub retry_ms: u64,
    /// Spoken prefix for a recognized object
    pub answer_prefix: String,
    /// Keyword table, checked in order; first substring match wins
    pub keywords: std::vec::Vec<KeywordEntry>,
}

/// One keyword → intent mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordEntry {
    pub phrase: String,
    pub intent: Intent,
}

/// Operator command parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManualConfig {
    /// Spin duration of a manual left/right (ms)
    pub turn_ms: u64,
    /// Servo step for servoleft/servoright (degrees)
    pub servo_step_deg: i32,
    /// Horn beeps for the beep command
    pub beep_times: u32,
    /// Interval between horn beeps (ms)
    pub beep_interval_ms: u64,
    /// LED blinks for the blink command
    pub blink_times: u32,
    /// Interval between LED blinks (ms)
    pub blink_interval_ms: u64,
    /// Heartbeat LED period (ms)
    pub heartbeat_ms: u64,
}

/// Shell commands controlling the video recording daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub start_cmd: String,
    pub stop_cmd: String,
}

fn fixed<T: Copy, const N: usize>(items: &[T]) -> Vec<T, N> {
    items.iter().copied().take(N).collect()
}

impl Default for VehicleConfig {
    fn default() -> Self {
        const TURNS: [(i32, u32); 10] = [
            (-90, 20),
            (-75, 17),
            (-60, 14),
            (-45, 10),
            (-30, 7),
            (30, 5),
            (45, 8),
            (60, 10),
            (75, 13),
            (90, 17),
        ];
        let turn_table = TURNS
            .iter()
            .map(|&(angle, pulses)| TurnEntry { angle, pulses })
            .take(MAX_ANGLES)
            .collect();

        Self {
            // Command queue
            command_queue_capacity: 8,

            // Mode arbitration
            mode_grace_ms: 1000,
            loop_settle_ms: 1000,
            warning_beeps: 3,
            warning_beep_interval_ms: 300,

            // Navigation loop
            forward_poll_ms: 50,
            brake_pause_ms: 20,
            backward_ms: 500,
            turn_settle_ms: 150,
            pause_ms: 500,
            max_backoff_retries: 4,

            // Distance thresholds
            near_cm: 10.0,
            caution_cm: 40.0,

            // Scan sweep
            scan_angles: fixed(&[-90, -75, -60, -45, -30, 30, 45, 60, 75, 90]),
            scan_settle_ms: 120,
            scan_retries: 3,
            scan_recenter_ms: 50,

            // Calibrated turns
            turn_table,
            turn_poll_ms: 1,
            turn_timeout_ms: 3000,

            // Watchers
            collision_poll_ms: 10,
            obstacle_pattern: fixed(&[0, -15, 0, 15]),
            obstacle_settle_ms: 70,

            tracking: TrackingConfig::default(),
            speech: SpeechConfig::default(),
            manual: ManualConfig::default(),
            video: VideoConfig::default(),
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            poll_ms: 20,
            search_step_deg: 30,
            search_limit_deg: 360,
            search_settle_ms: 200,
            near_y: 580,
            left_x: 200,
            right_x: 400,
            pulse_ms: 100,
            close_settle_ms: 500,
        }
    }
}

impl Default for SpeechConfig {
    fn default() -> Self {
        let keywords = [
            ("forward", Intent::Forward),
            ("back", Intent::Backward),
            ("left", Intent::Left),
            ("right", Intent::Right),
            ("stop", Intent::Stop),
            ("what is this", Intent::Identify),
            ("sing", Intent::Sing),
        ]
        .into_iter()
        .map(|(phrase, intent)| KeywordEntry {
            phrase: phrase.to_owned(),
            intent,
        })
        .collect();

        Self {
            clip_secs: 2,
            backward_ms: 600,
            stop_idle_ms: 500,
            turn_pause_ms: 20,
            retry_ms: 500,
            answer_prefix: "this is".to_owned(),
            keywords,
        }
    }
}

impl Default for ManualConfig {
    fn default() -> Self {
        Self {
            turn_ms: 250,
            servo_step_deg: 15,
            beep_times: 5,
            beep_interval_ms: 100,
            blink_times: 3,
            blink_interval_ms: 200,
            heartbeat_ms: 1000,
        }
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            start_cmd: "sudo motion".to_owned(),
            stop_cmd: "sudo killall motion".to_owned(),
        }
    }
}

impl VehicleConfig {
    /// Load a JSON config file; missing fields keep their defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the controller misbehave.
    pub fn validate(&self) -> Result<(), Error> {
        if self.command_queue_capacity == 0 {
            return Err(Error::Config("command_queue_capacity must be > 0"));
        }
        if !(self.near_cm > 0.0 && self.near_cm < self.caution_cm) {
            return Err(Error::Config("near_cm must be positive and below caution_cm"));
        }
        if self.scan_angles.is_empty() {
            return Err(Error::Config("scan_angles must not be empty"));
        }
        if self.obstacle_pattern.is_empty() {
            return Err(Error::Config("obstacle_pattern must not be empty"));
        }
        if self
            .scan_angles
            .iter()
            .chain(self.obstacle_pattern.iter())
            .any(|a| !(-90..=90).contains(a))
        {
            return Err(Error::Config("servo angles must lie within [-90, 90]"));
        }
        if self.turn_table.iter().any(|t| t.angle == 0 || t.pulses == 0) {
            return Err(Error::Config("turn_table entries need a non-zero angle and count"));
        }
        if self.tracking.left_x >= self.tracking.right_x {
            return Err(Error::Config("tracking.left_x must be below tracking.right_x"));
        }
        if self.tracking.search_step_deg <= 0 {
            return Err(Error::Config("tracking.search_step_deg must be positive"));
        }
        Ok(())
    }
}
