//! Mode arbitration: self-driving, self-tracking and speech driving.
//!
//! At most one mode is up at a time.  Enabling a mode:
//!
//! ```text
//!   already up? ──Y──▶ no-op
//!        │N
//!   prerequisites ──missing──▶ ModeAborted
//!        │
//!   clear all modes (new epoch) ──▶ grace period ──▶ claim(epoch)
//!                                                     │        │
//!                                            newer request     won
//!                                              ▼               ▼
//!                                            give up      run the loop
//!                                                         until released
//! ```
//!
//! The enable call blocks for the life of the loop, so the dispatcher runs
//! it on its own thread.  Disabling only lowers the flag; the loop notices
//! at its next poll.

use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::{EventSink, Peripherals, Services, SpeechPort};
use crate::config::VehicleConfig;
use crate::error::Error;
use crate::fsm::context::{Lease, Mode, ModeFlags, NavContext, TrackerSlot, VehicleState};
use crate::fsm::states::{build_nav_table, build_speech_table, finish_navigation, finish_speech};
use crate::fsm::{Fsm, Mailbox, NavOp};
use crate::speech::SpeechCommandBridge;
use crate::task::{delay_ms, join_quietly, spawn_named};

/// Owns mode transitions and runs the mode loops.
pub struct ModeController {
    hw: Peripherals,
    services: Services,
    state: Arc<VehicleState>,
    config: Arc<VehicleConfig>,
    sink: Arc<dyn EventSink>,
    /// Open tracker while self-tracking.
    tracker: Mutex<Option<Arc<TrackerSlot>>>,
    /// Mailbox of the running navigation loop.
    nav_mailbox: Mutex<Option<Arc<Mailbox>>>,
}

impl ModeController {
    pub fn new(
        hw: Peripherals,
        services: Services,
        state: Arc<VehicleState>,
        config: Arc<VehicleConfig>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            hw,
            services,
            state,
            config,
            sink,
            tracker: Mutex::new(None),
            nav_mailbox: Mutex::new(None),
        }
    }

    pub fn flags(&self) -> ModeFlags {
        self.state.flags()
    }

    // ── Self-driving ──────────────────────────────────────────

    pub fn enable_self_driving(&self) {
        if self.state.is_active(Mode::SelfDriving) {
            debug!("self-driving already on");
            return;
        }
        if self.hw.distance.is_none() {
            self.abort(Mode::SelfDriving, "no distance sensor");
            return;
        }
        let Some(lease) = self.raise(Mode::SelfDriving) else {
            return;
        };
        self.run_navigation(lease, None);
    }

    pub fn disable_self_driving(&self) {
        self.lower(Mode::SelfDriving);
    }

    // ── Self-tracking ─────────────────────────────────────────

    pub fn enable_self_tracking(&self) {
        if self.state.is_active(Mode::SelfTracking) {
            debug!("self-tracking already on");
            return;
        }
        let Some(trackers) = self.services.trackers.clone() else {
            self.abort(Mode::SelfTracking, "no tracker");
            return;
        };

        // The tracker needs the camera the video daemon holds.
        if let Some(video) = &self.services.video {
            if let Err(e) = video.stop() {
                warn!("Could not stop video recording: {}", e);
            }
        }

        let Some(ticket) = self.clear_and_wait() else {
            return;
        };
        let tracker = match trackers.open() {
            Ok(t) => t,
            Err(e) => {
                warn!("{}", Error::Tracker(e));
                self.abort(Mode::SelfTracking, "tracker unavailable");
                return;
            }
        };
        let slot = Arc::new(TrackerSlot::new(tracker));

        let Some(lease) = self.claim(Mode::SelfTracking, ticket) else {
            slot.close();
            return;
        };
        *self.tracker.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&slot));

        self.run_navigation(lease, Some(Arc::clone(&slot)));
        slot.close();
        let mut current = self.tracker.lock().unwrap_or_else(PoisonError::into_inner);
        if current.as_ref().is_some_and(|s| Arc::ptr_eq(s, &slot)) {
            *current = None;
        }
    }

    pub fn disable_self_tracking(&self) {
        if !self.lower(Mode::SelfTracking) {
            return;
        }
        let slot = self.tracker.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(slot) = slot {
            slot.close();
        }
        delay_ms(self.config.tracking.close_settle_ms);
        if let Some(video) = &self.services.video {
            if let Err(e) = video.start() {
                warn!("Could not restart video recording: {}", e);
            }
        }
    }

    // ── Speech driving ────────────────────────────────────────

    pub fn enable_speech_driving(&self) {
        if self.state.is_active(Mode::SpeechDriving) {
            debug!("speech driving already on");
            return;
        }
        let Some(speech) = self.services.speech.clone() else {
            self.abort(Mode::SpeechDriving, "no speech recognizer");
            return;
        };
        let Some(lease) = self.raise(Mode::SpeechDriving) else {
            return;
        };
        self.run_speech(lease, speech);
    }

    pub fn disable_speech_driving(&self) {
        self.lower(Mode::SpeechDriving);
    }

    // ── Navigation ops from the operator ──────────────────────

    /// Post `op` to the running navigation loop.  Returns `false` when no
    /// navigation loop is running.
    pub fn forward_nav_op(&self, op: NavOp) -> bool {
        if !self.state.navigating() {
            return false;
        }
        let mailbox = self.nav_mailbox.lock().unwrap_or_else(PoisonError::into_inner).clone();
        match mailbox {
            Some(mb) => {
                mb.post(op);
                true
            }
            None => false,
        }
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    /// `None` once the vehicle has shut down.
    fn clear_and_wait(&self) -> Option<u64> {
        if self.state.is_closed() {
            info!("Vehicle is shut down, ignoring mode request");
            return None;
        }
        let ticket = self.state.clear_modes();
        info!("Modes cleared, waiting {} ms", self.config.mode_grace_ms);
        self.sink.emit(&AppEvent::ModesCleared);
        delay_ms(self.config.mode_grace_ms);
        Some(ticket)
    }

    fn claim(&self, mode: Mode, ticket: u64) -> Option<Lease> {
        let lease = self.state.claim(mode, ticket);
        match lease {
            Some(_) => {
                info!("{:?} on", mode);
                self.sink.emit(&AppEvent::ModeEnabled(mode));
            }
            None if self.state.is_closed() => info!("{:?} dropped, vehicle shut down", mode),
            None => info!("{:?} superseded by a newer request", mode),
        }
        lease
    }

    fn raise(&self, mode: Mode) -> Option<Lease> {
        let ticket = self.clear_and_wait()?;
        self.claim(mode, ticket)
    }

    fn lower(&self, mode: Mode) -> bool {
        if self.state.release(mode) {
            info!("{:?} off", mode);
            self.sink.emit(&AppEvent::ModeDisabled(mode));
            true
        } else {
            debug!("{:?} was not on", mode);
            false
        }
    }

    fn abort(&self, mode: Mode, reason: &'static str) {
        warn!("{:?} not entered: {}", mode, reason);
        self.sink.emit(&AppEvent::ModeAborted { mode, reason });
    }

    fn context(&self, lease: Lease) -> NavContext {
        NavContext::new(
            self.hw.clone(),
            Arc::clone(&self.state),
            Arc::clone(&self.config),
            Arc::clone(&self.sink),
            lease,
        )
    }

    fn run_navigation(&self, lease: Lease, tracker: Option<Arc<TrackerSlot>>) {
        let mut ctx = self.context(lease);
        if let Some(slot) = tracker {
            ctx = ctx.with_tracker(slot);
        }
        *self.nav_mailbox.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(Arc::clone(&ctx.mailbox));

        self.hw
            .beep(self.config.warning_beeps, self.config.warning_beep_interval_ms);

        let mut fsm = Fsm::new(build_nav_table(), NavOp::Forward);
        fsm.run(&mut ctx);
        finish_navigation(&mut ctx);

        let mut slot = self.nav_mailbox.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|mb| Arc::ptr_eq(mb, &ctx.mailbox)) {
            *slot = None;
        }
        info!("{:?} loop finished", lease.mode);
    }

    fn run_speech(&self, lease: Lease, speech: Arc<dyn SpeechPort>) {
        let mut ctx = self.context(lease);
        let bridge = SpeechCommandBridge::new(
            speech,
            self.services.clone(),
            &self.hw,
            Arc::clone(&ctx.mailbox),
            Arc::clone(&self.sink),
            &self.config.speech,
        );
        let state = Arc::clone(&self.state);
        let listener = spawn_named("speech-bridge", move || bridge.run(|| state.holds(lease)));

        let mut fsm = Fsm::new(build_speech_table(), NavOp::Stop);
        fsm.run(&mut ctx);
        finish_speech(&mut ctx);

        if let Some(handle) = listener {
            join_quietly(handle);
        }
        info!("{:?} loop finished", lease.mode);
    }
}
