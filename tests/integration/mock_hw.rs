//! Mock adapters for integration tests.
//!
//! Actuators record every call; sensors replay scripted readings.  Only the
//! LED blink sleeps (it paces the heartbeat), so mode loops run at the pace
//! of the shortened test config.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use autocar::app::events::AppEvent;
use autocar::app::ports::{
    Audio, AudioPort, BoundingBox, CameraPort, CollisionPort, Cue, DistancePort, EncoderPort,
    EventSink, HornPort, ImageRecognizerPort, LedPort, MotorPort, Peripherals, Photo, ServoPort,
    SpeechPort, TextToSpeechPort, TrackerFactory, TrackerPort, VideoPort,
};
use autocar::config::VehicleConfig;
use autocar::error::ServiceError;

// ── Motor ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorCall {
    Forward,
    Backward,
    Left,
    Right,
    Stop,
    Speed(u8),
}

#[derive(Default)]
pub struct MockMotor {
    calls: Mutex<Vec<MotorCall>>,
}

#[allow(dead_code)]
impl MockMotor {
    pub fn calls(&self) -> Vec<MotorCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<MotorCall> {
        self.calls.lock().unwrap().last().copied()
    }

    pub fn count(&self, call: MotorCall) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == call).count()
    }

    fn push(&self, call: MotorCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl MotorPort for MockMotor {
    fn forward(&self) {
        self.push(MotorCall::Forward);
    }
    fn backward(&self) {
        self.push(MotorCall::Backward);
    }
    fn left(&self) {
        self.push(MotorCall::Left);
    }
    fn right(&self) {
        self.push(MotorCall::Right);
    }
    fn stop(&self) {
        self.push(MotorCall::Stop);
    }
    fn set_speed(&self, percent: u8) {
        self.push(MotorCall::Speed(percent));
    }
}

// ── Servo ─────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockServo {
    angles: Mutex<Vec<i32>>,
}

#[allow(dead_code)]
impl MockServo {
    pub fn angles(&self) -> Vec<i32> {
        self.angles.lock().unwrap().clone()
    }
}

impl ServoPort for MockServo {
    fn roll_to(&self, angle: i32) {
        self.angles.lock().unwrap().push(angle);
    }
}

// ── Range finder ──────────────────────────────────────────────

/// Pops queued readings, then keeps answering `fallback`.
pub struct QueuedRanger {
    queue: Mutex<VecDeque<f32>>,
    fallback: f32,
}

#[allow(dead_code)]
impl QueuedRanger {
    pub fn new(fallback: f32) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback,
        }
    }

    pub fn push(&self, readings: &[f32]) {
        self.queue.lock().unwrap().extend(readings.iter().copied());
    }
}

impl DistancePort for QueuedRanger {
    fn measure_cm(&self) -> f32 {
        self.queue.lock().unwrap().pop_front().unwrap_or(self.fallback)
    }
}

// ── Encoder ───────────────────────────────────────────────────

/// Every read advances the count by one, so any turn finishes quickly.
#[derive(Default)]
pub struct CountingEncoder {
    count: AtomicU32,
    starts: AtomicUsize,
}

#[allow(dead_code)]
impl CountingEncoder {
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }
}

impl EncoderPort for CountingEncoder {
    fn start(&self) {
        self.count.store(0, Ordering::SeqCst);
        self.starts.fetch_add(1, Ordering::SeqCst);
    }
    fn stop(&self) {}
    fn pulse_count(&self) -> u32 {
        self.count.fetch_add(1, Ordering::SeqCst)
    }
}

// ── Bumper, horn, LED ─────────────────────────────────────────

#[derive(Default)]
pub struct MockSwitch(AtomicBool);

#[allow(dead_code)]
impl MockSwitch {
    pub fn set(&self, tripped: bool) {
        self.0.store(tripped, Ordering::SeqCst);
    }
}

impl CollisionPort for MockSwitch {
    fn is_tripped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct CountingHorn {
    beeps: AtomicU32,
}

#[allow(dead_code)]
impl CountingHorn {
    pub fn beeps(&self) -> u32 {
        self.beeps.load(Ordering::SeqCst)
    }
}

impl HornPort for CountingHorn {
    fn beep(&self, times: u32, _interval_ms: u64) {
        self.beeps.fetch_add(times, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct MockLed {
    lit: AtomicBool,
    switched_on: AtomicUsize,
}

#[allow(dead_code)]
impl MockLed {
    pub fn is_on(&self) -> bool {
        self.lit.load(Ordering::SeqCst)
    }

    pub fn times_on(&self) -> usize {
        self.switched_on.load(Ordering::SeqCst)
    }
}

impl LedPort for MockLed {
    fn on(&self) {
        self.lit.store(true, Ordering::SeqCst);
        self.switched_on.fetch_add(1, Ordering::SeqCst);
    }
    fn off(&self) {
        self.lit.store(false, Ordering::SeqCst);
    }
    fn blink(&self, times: u32, interval_ms: u64) {
        std::thread::sleep(Duration::from_millis(2 * u64::from(times) * interval_ms));
    }
}

// ── Event recorder ────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<(Instant, AppEvent)>>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn events(&self) -> Vec<AppEvent> {
        self.events.lock().unwrap().iter().map(|(_, e)| e.clone()).collect()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.lock().unwrap().iter().filter(|(_, e)| pred(e)).count()
    }

    /// Time of the first event matching `pred`.
    pub fn first_at(&self, pred: impl Fn(&AppEvent) -> bool) -> Option<Instant> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .find(|(_, e)| pred(e))
            .map(|(t, _)| *t)
    }

    /// Poll until an event matching `pred` shows up or `timeout` passes.
    pub fn wait_for(&self, timeout: Duration, pred: impl Fn(&AppEvent) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.count(&pred) > 0 {
                return true;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        self.count(&pred) > 0
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &AppEvent) {
        self.events.lock().unwrap().push((Instant::now(), event.clone()));
    }
}

// ── Tracker ───────────────────────────────────────────────────

/// Replays scripted frames, then `steady` forever.
pub struct ScriptedTrackers {
    frames: Arc<Mutex<VecDeque<Option<BoundingBox>>>>,
    steady: Option<BoundingBox>,
    fail: bool,
    opened: AtomicUsize,
}

#[allow(dead_code)]
impl ScriptedTrackers {
    pub fn new(frames: Vec<Option<BoundingBox>>, steady: Option<BoundingBox>) -> Self {
        Self {
            frames: Arc::new(Mutex::new(frames.into())),
            steady,
            fail: false,
            opened: AtomicUsize::new(0),
        }
    }

    pub fn broken() -> Self {
        Self {
            fail: true,
            ..Self::new(Vec::new(), None)
        }
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

struct ScriptedTracker {
    frames: Arc<Mutex<VecDeque<Option<BoundingBox>>>>,
    steady: Option<BoundingBox>,
}

impl TrackerPort for ScriptedTracker {
    fn locate(&mut self) -> Option<BoundingBox> {
        self.frames.lock().unwrap().pop_front().unwrap_or(self.steady)
    }
}

impl TrackerFactory for ScriptedTrackers {
    fn open(&self) -> Result<Box<dyn TrackerPort>, ServiceError> {
        if self.fail {
            return Err(ServiceError::Unavailable);
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedTracker {
            frames: Arc::clone(&self.frames),
            steady: self.steady,
        }))
    }
}

// ── Voice, camera, cloud ──────────────────────────────────────

/// Transcribes each clip as the next scripted phrase; times out once the
/// script is exhausted.
#[derive(Default)]
pub struct ScriptedSpeech {
    phrases: Mutex<VecDeque<String>>,
    clips: AtomicUsize,
}

#[allow(dead_code)]
impl ScriptedSpeech {
    pub fn new(phrases: &[&str]) -> Self {
        Self {
            phrases: Mutex::new(phrases.iter().map(|p| (*p).to_owned()).collect()),
            clips: AtomicUsize::new(0),
        }
    }

    pub fn clips(&self) -> usize {
        self.clips.load(Ordering::SeqCst)
    }
}

impl SpeechPort for ScriptedSpeech {
    fn record_clip(&self, _secs: u32) -> Result<Audio, ServiceError> {
        self.clips.fetch_add(1, Ordering::SeqCst);
        Ok(Audio(vec![0; 4]))
    }

    fn to_text(&self, _audio: &Audio) -> Result<String, ServiceError> {
        self.phrases.lock().unwrap().pop_front().ok_or(ServiceError::Timeout)
    }
}

#[derive(Default)]
pub struct RecordingAudio {
    cues: Mutex<Vec<Cue>>,
    played: Mutex<Vec<Audio>>,
}

#[allow(dead_code)]
impl RecordingAudio {
    pub fn cues(&self) -> Vec<Cue> {
        self.cues.lock().unwrap().clone()
    }

    pub fn played(&self) -> Vec<Audio> {
        self.played.lock().unwrap().clone()
    }
}

impl AudioPort for RecordingAudio {
    fn play(&self, audio: &Audio) -> Result<(), ServiceError> {
        self.played.lock().unwrap().push(audio.clone());
        Ok(())
    }

    fn play_cue(&self, cue: Cue) -> Result<(), ServiceError> {
        self.cues.lock().unwrap().push(cue);
        Ok(())
    }
}

pub struct StillCamera;

impl CameraPort for StillCamera {
    fn take_photo(&self) -> Result<Photo, ServiceError> {
        Ok(Photo(vec![0xFF, 0xD8]))
    }
}

pub struct FixedRecognizer(pub Result<String, ServiceError>);

impl ImageRecognizerPort for FixedRecognizer {
    fn recognize(&self, _photo: &Photo) -> Result<String, ServiceError> {
        self.0.clone()
    }
}

/// "Synthesizes" text as its UTF-8 bytes.
pub struct EchoTts;

impl TextToSpeechPort for EchoTts {
    fn synthesize(&self, text: &str) -> Result<Audio, ServiceError> {
        Ok(Audio(text.as_bytes().to_vec()))
    }
}

#[derive(Default)]
pub struct CountingVideo {
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
}

impl VideoPort for CountingVideo {
    fn start(&self) -> Result<(), ServiceError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) -> Result<(), ServiceError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ── Rig ───────────────────────────────────────────────────────

/// A fully fitted mock car plus handles on each part.
pub struct Rig {
    pub motor: Arc<MockMotor>,
    pub servo: Arc<MockServo>,
    pub ranger: Arc<QueuedRanger>,
    pub encoder: Arc<CountingEncoder>,
    pub bumper: Arc<MockSwitch>,
    pub horn: Arc<CountingHorn>,
    pub led: Arc<MockLed>,
    pub sink: Arc<RecordingSink>,
    pub hw: Peripherals,
}

/// Open floor: the ranger reads `far_cm` unless readings are queued.
pub fn rig(far_cm: f32) -> Rig {
    let motor = Arc::new(MockMotor::default());
    let servo = Arc::new(MockServo::default());
    let ranger = Arc::new(QueuedRanger::new(far_cm));
    let encoder = Arc::new(CountingEncoder::default());
    let bumper = Arc::new(MockSwitch::default());
    let horn = Arc::new(CountingHorn::default());
    let led = Arc::new(MockLed::default());

    let mut hw = Peripherals::with_motor(motor.clone());
    hw.servo = Some(servo.clone());
    hw.distance = Some(ranger.clone());
    hw.encoder = Some(encoder.clone());
    hw.horn = Some(horn.clone());
    hw.led = Some(led.clone());
    let switch: Arc<dyn CollisionPort> = bumper.clone();
    assert!(hw.switches.push(switch).is_ok());

    Rig {
        motor,
        servo,
        ranger,
        encoder,
        bumper,
        horn,
        led,
        sink: Arc::new(RecordingSink::default()),
        hw,
    }
}

/// Default tunables with every delay cut down to a few milliseconds.
pub fn fast_config() -> VehicleConfig {
    let mut c = VehicleConfig {
        mode_grace_ms: 50,
        loop_settle_ms: 5,
        warning_beeps: 1,
        warning_beep_interval_ms: 1,
        forward_poll_ms: 5,
        brake_pause_ms: 1,
        backward_ms: 5,
        turn_settle_ms: 1,
        pause_ms: 5,
        scan_settle_ms: 1,
        scan_recenter_ms: 1,
        turn_timeout_ms: 200,
        collision_poll_ms: 2,
        obstacle_settle_ms: 2,
        ..VehicleConfig::default()
    };
    c.tracking.poll_ms = 2;
    c.tracking.search_settle_ms = 1;
    c.tracking.pulse_ms = 2;
    c.tracking.close_settle_ms = 1;
    c.speech.backward_ms = 5;
    c.speech.stop_idle_ms = 5;
    c.speech.turn_pause_ms = 1;
    c.speech.retry_ms = 5;
    c.manual.turn_ms = 5;
    c.manual.heartbeat_ms = 5;
    c.manual.beep_interval_ms = 1;
    c.manual.blink_interval_ms = 1;
    c
}

pub const WAIT: Duration = Duration::from_secs(3);
