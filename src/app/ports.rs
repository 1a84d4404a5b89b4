//! Port traits — the hexagonal boundary between the controller and the car.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Vehicle / ModeController / loops
//! ```
//!
//! Peripheral drivers, the visual tracker, cloud services and event sinks
//! implement these traits.  The controller holds them as shared trait
//! objects because every mode loop and watcher runs on its own thread, so
//! all ports are `Send + Sync` and take `&self`; implementations carry
//! their own interior mutability.
//!
//! Optional peripherals are `Option<Arc<..>>` in [`Peripherals`]: a missing
//! one turns every call site into a silent no-op.

use std::sync::Arc;

use crate::error::ServiceError;

// ───────────────────────────────────────────────────────────────
// Motion (domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Differential drive.  Each call replaces the previous motion.
pub trait MotorPort: Send + Sync {
    fn forward(&self);
    fn backward(&self);
    /// Spin in place to the left.
    fn left(&self);
    /// Spin in place to the right.
    fn right(&self);
    fn stop(&self);
    /// Duty cycle in percent (0–100).
    fn set_speed(&self, percent: u8);
}

/// Steering servo carrying the distance sensor.
pub trait ServoPort: Send + Sync {
    /// Move to `angle` degrees (negative = left, already clamped to ±90).
    fn roll_to(&self, angle: i32);
}

// ───────────────────────────────────────────────────────────────
// Sensors (hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Ultrasonic (or equivalent) range finder.
pub trait DistancePort: Send + Sync {
    /// Distance in centimetres; a negative value marks an invalid reading.
    fn measure_cm(&self) -> f32;
}

/// A bumper switch.
pub trait CollisionPort: Send + Sync {
    fn is_tripped(&self) -> bool;
}

/// Wheel encoder.  Counts only between `start` and `stop`; `start`
/// resets the count.
pub trait EncoderPort: Send + Sync {
    fn start(&self);
    fn stop(&self);
    fn pulse_count(&self) -> u32;
}

// ───────────────────────────────────────────────────────────────
// Indicators
// ───────────────────────────────────────────────────────────────

/// Buzzer.  Blocks for the duration of the pattern.
pub trait HornPort: Send + Sync {
    fn beep(&self, times: u32, interval_ms: u64);
}

/// Single-colour LED (status LED or headlight).
pub trait LedPort: Send + Sync {
    fn on(&self);
    fn off(&self);
    /// Blocks for the duration of the pattern.
    fn blink(&self, times: u32, interval_ms: u64);
}

// ───────────────────────────────────────────────────────────────
// Vision
// ───────────────────────────────────────────────────────────────

/// Axis-aligned bounding box in camera pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
}

/// An open visual tracker.  Owned by exactly one thread at a time.
pub trait TrackerPort: Send {
    /// One frame: the target's box, or `None` when it is not in view.
    fn locate(&mut self) -> Option<BoundingBox>;

    /// Centre of `rect`.
    fn middle_xy(&self, rect: &BoundingBox) -> (i32, i32) {
        ((rect.min_x + rect.max_x) / 2, (rect.min_y + rect.max_y) / 2)
    }
}

/// Opens trackers on demand; dropping a tracker closes it.
pub trait TrackerFactory: Send + Sync {
    fn open(&self) -> Result<Box<dyn TrackerPort>, ServiceError>;
}

/// A still image (encoded bytes, format chosen by the camera adapter).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Photo(pub Vec<u8>);

pub trait CameraPort: Send + Sync {
    fn take_photo(&self) -> Result<Photo, ServiceError>;
}

// ───────────────────────────────────────────────────────────────
// Voice and cloud services
// ───────────────────────────────────────────────────────────────

/// Recorded or synthesized audio (encoded bytes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Audio(pub Vec<u8>);

/// Canned sounds shipped with the car.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    /// "Let me think" while an image is recognised.
    Thinking,
    /// Played when recognition yields nothing.
    Failure,
    Song,
}

/// Microphone plus speech-to-text.
pub trait SpeechPort: Send + Sync {
    fn record_clip(&self, secs: u32) -> Result<Audio, ServiceError>;
    fn to_text(&self, audio: &Audio) -> Result<String, ServiceError>;
}

pub trait ImageRecognizerPort: Send + Sync {
    /// Best label for the photo's main object.
    fn recognize(&self, photo: &Photo) -> Result<String, ServiceError>;
}

pub trait TextToSpeechPort: Send + Sync {
    fn synthesize(&self, text: &str) -> Result<Audio, ServiceError>;
}

pub trait AudioPort: Send + Sync {
    fn play(&self, audio: &Audio) -> Result<(), ServiceError>;
    fn play_cue(&self, cue: Cue) -> Result<(), ServiceError>;
}

/// Background video-recording daemon.  Both calls are best-effort.
pub trait VideoPort: Send + Sync {
    fn start(&self) -> Result<(), ServiceError>;
    fn stop(&self) -> Result<(), ServiceError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The controller emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go (log, UI, test
/// recorder).
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Wiring
// ───────────────────────────────────────────────────────────────

/// Maximum number of bumper switches.
pub const MAX_SWITCHES: usize = 4;

/// Physical peripherals.  Only the motor is mandatory.
#[derive(Clone)]
pub struct Peripherals {
    pub motor: Arc<dyn MotorPort>,
    pub servo: Option<Arc<dyn ServoPort>>,
    pub distance: Option<Arc<dyn DistancePort>>,
    pub encoder: Option<Arc<dyn EncoderPort>>,
    pub horn: Option<Arc<dyn HornPort>>,
    /// Status LED (heartbeat, recording indicator).
    pub led: Option<Arc<dyn LedPort>>,
    /// Headlight.
    pub light: Option<Arc<dyn LedPort>>,
    pub switches: heapless::Vec<Arc<dyn CollisionPort>, MAX_SWITCHES>,
}

impl Peripherals {
    /// A car with nothing but wheels.
    pub fn with_motor(motor: Arc<dyn MotorPort>) -> Self {
        Self {
            motor,
            servo: None,
            distance: None,
            encoder: None,
            horn: None,
            led: None,
            light: None,
            switches: heapless::Vec::new(),
        }
    }

    /// Logical OR over every bumper switch.
    pub fn any_collision(&self) -> bool {
        self.switches.iter().any(|s| s.is_tripped())
    }

    pub(crate) fn servo_to(&self, angle: i32) {
        if let Some(servo) = &self.servo {
            servo.roll_to(angle);
        }
    }

    pub(crate) fn beep(&self, times: u32, interval_ms: u64) {
        if let Some(horn) = &self.horn {
            horn.beep(times, interval_ms);
        }
    }
}

/// External (non-peripheral) collaborators.  All optional.
#[derive(Clone, Default)]
pub struct Services {
    pub speech: Option<Arc<dyn SpeechPort>>,
    pub images: Option<Arc<dyn ImageRecognizerPort>>,
    pub tts: Option<Arc<dyn TextToSpeechPort>>,
    pub audio: Option<Arc<dyn AudioPort>>,
    pub camera: Option<Arc<dyn CameraPort>>,
    pub video: Option<Arc<dyn VideoPort>>,
    pub trackers: Option<Arc<dyn TrackerFactory>>,
}
