//! Vehicle service — the hexagonal core.
//!
//! [`Vehicle`] owns the shared state and the [`ModeController`] and turns
//! operator [`Command`]s into port calls.  All I/O flows through the port
//! traits, so the whole service runs against mock adapters in tests.
//!
//! ```text
//!  CommandQueue ──▶ ┌────────────────────────┐ ──▶ EventSink
//!                   │        Vehicle         │
//!   MotorPort ◀─────│  dispatch · modes      │──▶ ServoPort / HornPort / LedPort
//!                   └────────────────────────┘
//! ```
//!
//! Motion commands run on the caller's thread.  Everything else (side
//! effects, mode changes) is fire-and-forget on a short-lived thread so a
//! slow horn or a mode's grace period never stalls the queue.

use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info};

use crate::config::VehicleConfig;
use crate::fsm::NavOp;
use crate::fsm::context::{Mode, ModeFlags, VehicleState};
use crate::mode::ModeController;
use crate::task::{delay_ms, detach};

use super::commands::Command;
use super::events::AppEvent;
use super::ports::{EventSink, Peripherals, Services};

// ───────────────────────────────────────────────────────────────
// Vehicle
// ───────────────────────────────────────────────────────────────

/// The car: peripherals, shared state and mode arbitration.
pub struct Vehicle {
    hw: Peripherals,
    state: Arc<VehicleState>,
    config: Arc<VehicleConfig>,
    sink: Arc<dyn EventSink>,
    modes: Arc<ModeController>,
    running: Arc<AtomicBool>,
}

impl Vehicle {
    /// Construct the vehicle.  Does **not** start the heartbeat — call
    /// [`start`](Self::start) next.
    pub fn new(
        hw: Peripherals,
        services: Services,
        config: VehicleConfig,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let state = Arc::new(VehicleState::new());
        let config = Arc::new(config);
        let modes = Arc::new(ModeController::new(
            hw.clone(),
            services,
            Arc::clone(&state),
            Arc::clone(&config),
            Arc::clone(&sink),
        ));
        Self {
            hw,
            state,
            config,
            sink,
            modes,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Centre the servo and start the heartbeat LED.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::AcqRel) {
            return;
        }
        self.hw.servo_to(self.state.set_servo_angle(0));

        if let Some(led) = self.hw.led.clone() {
            let running = Arc::clone(&self.running);
            let state = Arc::clone(&self.state);
            let period = self.config.manual.heartbeat_ms;
            detach("heartbeat", move || {
                while running.load(Ordering::Acquire) {
                    // The LED shows recording while speech driving.
                    if state.is_active(Mode::SpeechDriving) {
                        delay_ms(period);
                    } else {
                        led.blink(1, period / 2);
                    }
                }
            });
        }

        info!("Vehicle started");
        self.sink.emit(&AppEvent::Started);
    }

    /// Lower every mode for good, then stop the motor.  Called once the
    /// command queue has drained; a mode request still in its grace period
    /// cannot raise a flag afterwards.
    pub fn shutdown(&self) {
        self.state.close();
        self.hw.motor.stop();
        self.running.store(false, Ordering::Release);
        info!("Vehicle shut down");
        self.sink.emit(&AppEvent::Shutdown);
    }

    // ── Command handling ──────────────────────────────────────

    pub fn dispatch(&self, cmd: Command) {
        debug!("dispatch {}", cmd);
        let motor = &self.hw.motor;
        match cmd {
            Command::Forward => motor.forward(),
            Command::Backward => motor.backward(),
            Command::Stop => motor.stop(),
            Command::Left => {
                motor.left();
                delay_ms(self.config.manual.turn_ms);
                motor.stop();
            }
            Command::Right => {
                motor.right();
                delay_ms(self.config.manual.turn_ms);
                motor.stop();
            }

            Command::Pause => self.forward_nav_op(cmd, NavOp::Pause),
            Command::Turn => self.forward_nav_op(cmd, NavOp::Turn),
            Command::Scan => self.forward_nav_op(cmd, NavOp::Scan),

            Command::Beep => {
                if let Some(horn) = self.hw.horn.clone() {
                    let m = &self.config.manual;
                    let (times, interval) = (m.beep_times, m.beep_interval_ms);
                    detach("beep", move || horn.beep(times, interval));
                }
            }
            Command::Blink => {
                if let Some(led) = self.hw.led.clone() {
                    let m = &self.config.manual;
                    let (times, interval) = (m.blink_times, m.blink_interval_ms);
                    detach("blink", move || led.blink(times, interval));
                }
            }
            Command::LightOn => {
                if let Some(light) = self.hw.light.clone() {
                    detach("light", move || light.on());
                }
            }
            Command::LightOff => {
                if let Some(light) = self.hw.light.clone() {
                    detach("light", move || light.off());
                }
            }
            Command::ServoLeft => self.step_servo(-self.config.manual.servo_step_deg),
            Command::ServoRight => self.step_servo(self.config.manual.servo_step_deg),
            Command::ServoAhead => {
                let angle = self.state.set_servo_angle(0);
                self.roll_servo(angle);
            }

            Command::SelfDrivingOn => self.with_modes("mode-on", ModeController::enable_self_driving),
            Command::SelfDrivingOff => self.with_modes("mode-off", ModeController::disable_self_driving),
            Command::SelfTrackingOn => self.with_modes("mode-on", ModeController::enable_self_tracking),
            Command::SelfTrackingOff => self.with_modes("mode-off", ModeController::disable_self_tracking),
            Command::SpeechDrivingOn => self.with_modes("mode-on", ModeController::enable_speech_driving),
            Command::SpeechDrivingOff => self.with_modes("mode-off", ModeController::disable_speech_driving),
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn flags(&self) -> ModeFlags {
        self.modes.flags()
    }

    pub fn state(&self) -> &Arc<VehicleState> {
        &self.state
    }

    pub fn modes(&self) -> &Arc<ModeController> {
        &self.modes
    }

    pub fn config(&self) -> &VehicleConfig {
        &self.config
    }

    pub fn sink(&self) -> &Arc<dyn EventSink> {
        &self.sink
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    // ── Internal ──────────────────────────────────────────────

    fn forward_nav_op(&self, cmd: Command, op: NavOp) {
        if !self.modes.forward_nav_op(op) {
            info!("No navigation loop running, '{}' dropped", cmd);
            self.sink.emit(&AppEvent::CommandDropped(cmd.token().to_owned()));
        }
    }

    fn step_servo(&self, delta: i32) {
        let angle = self.state.step_servo_angle(delta);
        self.roll_servo(angle);
    }

    fn roll_servo(&self, angle: i32) {
        info!("Servo to {}°", angle);
        if let Some(servo) = self.hw.servo.clone() {
            detach("servo", move || servo.roll_to(angle));
        }
    }

    fn with_modes(&self, name: &'static str, f: fn(&ModeController)) {
        let modes = Arc::clone(&self.modes);
        detach(name, move || f(&modes));
    }
}
