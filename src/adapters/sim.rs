//! Simulated peripherals for the host binary.
//!
//! Everything is in-memory.  Timing-dependent parts (encoder pulses, horn
//! and LED patterns) follow the wall clock so mode loops behave with
//! realistic pacing on a desktop.

use core::sync::atomic::{AtomicBool, AtomicI32, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use log::{debug, info};

use crate::app::ports::{
    CollisionPort, DistancePort, EncoderPort, HornPort, LedPort, MotorPort, Peripherals, ServoPort,
};
use crate::task::delay_ms;

/// What the simulated wheels are doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motion {
    Stopped,
    Forward,
    Backward,
    Left,
    Right,
}

// ── Motor ─────────────────────────────────────────────────────

pub struct SimMotor {
    motion: Mutex<Motion>,
    speed: AtomicU8,
}

impl Default for SimMotor {
    fn default() -> Self {
        Self {
            motion: Mutex::new(Motion::Stopped),
            speed: AtomicU8::new(100),
        }
    }
}

impl SimMotor {
    pub fn motion(&self) -> Motion {
        *self.motion.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn speed(&self) -> u8 {
        self.speed.load(Ordering::Relaxed)
    }

    fn set(&self, m: Motion) {
        let mut cur = self.motion.lock().unwrap_or_else(PoisonError::into_inner);
        if *cur != m {
            debug!("motor: {:?} -> {:?}", *cur, m);
            *cur = m;
        }
    }
}

impl MotorPort for SimMotor {
    fn forward(&self) {
        self.set(Motion::Forward);
    }
    fn backward(&self) {
        self.set(Motion::Backward);
    }
    fn left(&self) {
        self.set(Motion::Left);
    }
    fn right(&self) {
        self.set(Motion::Right);
    }
    fn stop(&self) {
        self.set(Motion::Stopped);
    }
    fn set_speed(&self, percent: u8) {
        self.speed.store(percent.min(100), Ordering::Relaxed);
    }
}

// ── Servo ─────────────────────────────────────────────────────

#[derive(Default)]
pub struct SimServo(AtomicI32);

impl SimServo {
    pub fn angle(&self) -> i32 {
        self.0.load(Ordering::Relaxed)
    }
}

impl ServoPort for SimServo {
    fn roll_to(&self, angle: i32) {
        self.0.store(angle, Ordering::Relaxed);
    }
}

// ── Range finder ──────────────────────────────────────────────

/// Replays a cyclic list of distances, one per reading.
pub struct SimRanger {
    readings: Vec<f32>,
    next: AtomicUsize,
}

impl SimRanger {
    pub fn new(readings: Vec<f32>) -> Self {
        Self {
            readings,
            next: AtomicUsize::new(0),
        }
    }
}

impl Default for SimRanger {
    /// A room with mostly open floor and the odd wall.
    fn default() -> Self {
        Self::new(vec![
            120.0, 95.0, 180.0, 60.0, 140.0, 75.0, 210.0, 33.0, 160.0, 8.0, 90.0, -1.0,
        ])
    }
}

impl DistancePort for SimRanger {
    fn measure_cm(&self) -> f32 {
        if self.readings.is_empty() {
            return -1.0;
        }
        let i = self.next.fetch_add(1, Ordering::Relaxed) % self.readings.len();
        self.readings[i]
    }
}

// ── Encoder ───────────────────────────────────────────────────

/// One pulse every `ms_per_pulse` milliseconds while started.
pub struct SimEncoder {
    started: Mutex<Option<Instant>>,
    ms_per_pulse: u64,
}

impl SimEncoder {
    pub fn new(ms_per_pulse: u64) -> Self {
        Self {
            started: Mutex::new(None),
            ms_per_pulse: ms_per_pulse.max(1),
        }
    }
}

impl Default for SimEncoder {
    fn default() -> Self {
        Self::new(20)
    }
}

impl EncoderPort for SimEncoder {
    fn start(&self) {
        *self.started.lock().unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
    }

    fn stop(&self) {
        *self.started.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn pulse_count(&self) -> u32 {
        let started = *self.started.lock().unwrap_or_else(PoisonError::into_inner);
        started.map_or(0, |t| {
            (t.elapsed().as_millis() / u128::from(self.ms_per_pulse)) as u32
        })
    }
}

// ── Bumper ────────────────────────────────────────────────────

#[derive(Default)]
pub struct SimSwitch(AtomicBool);

impl SimSwitch {
    pub fn set(&self, tripped: bool) {
        self.0.store(tripped, Ordering::Release);
    }
}

impl CollisionPort for SimSwitch {
    fn is_tripped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

// ── Indicators ────────────────────────────────────────────────

#[derive(Default)]
pub struct SimHorn;

impl HornPort for SimHorn {
    fn beep(&self, times: u32, interval_ms: u64) {
        info!("horn: beep x{}", times);
        for _ in 0..times {
            delay_ms(interval_ms);
            delay_ms(interval_ms);
        }
    }
}

pub struct SimLed {
    name: &'static str,
    lit: AtomicBool,
}

impl SimLed {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            lit: AtomicBool::new(false),
        }
    }

    pub fn is_on(&self) -> bool {
        self.lit.load(Ordering::Relaxed)
    }
}

impl LedPort for SimLed {
    fn on(&self) {
        debug!("{}: on", self.name);
        self.lit.store(true, Ordering::Relaxed);
    }

    fn off(&self) {
        debug!("{}: off", self.name);
        self.lit.store(false, Ordering::Relaxed);
    }

    fn blink(&self, times: u32, interval_ms: u64) {
        for _ in 0..times {
            self.lit.store(true, Ordering::Relaxed);
            delay_ms(interval_ms);
            self.lit.store(false, Ordering::Relaxed);
            delay_ms(interval_ms);
        }
    }
}

// ── Wiring ────────────────────────────────────────────────────

/// Handles the binary keeps to inspect or poke the simulation.
pub struct SimCar {
    pub motor: Arc<SimMotor>,
    pub servo: Arc<SimServo>,
    pub bumpers: [Arc<SimSwitch>; 2],
    pub peripherals: Peripherals,
}

/// A fully fitted simulated car: motor, servo, range finder, encoder,
/// two bumpers, horn, status LED and headlight.
pub fn sim_car() -> SimCar {
    let motor = Arc::new(SimMotor::default());
    let servo = Arc::new(SimServo::default());
    let bumpers = [Arc::new(SimSwitch::default()), Arc::new(SimSwitch::default())];

    let mut hw = Peripherals::with_motor(motor.clone());
    hw.servo = Some(servo.clone());
    hw.distance = Some(Arc::new(SimRanger::default()));
    hw.encoder = Some(Arc::new(SimEncoder::default()));
    hw.horn = Some(Arc::new(SimHorn));
    hw.led = Some(Arc::new(SimLed::new("led")));
    hw.light = Some(Arc::new(SimLed::new("light")));
    for b in &bumpers {
        let switch: Arc<dyn CollisionPort> = b.clone();
        if hw.switches.push(switch).is_err() {
            break;
        }
    }

    SimCar {
        motor,
        servo,
        bumpers,
        peripherals: hw,
    }
}
