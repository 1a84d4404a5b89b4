//! Shared vehicle state and the context threaded through every op handler.
//!
//! [`VehicleState`] lives for the whole process and is read and written
//! from the dispatch thread, every mode loop and every watcher.  All of it
//! is atomics:
//!
//! ```text
//!  mode word (AtomicU64)
//!  ┌──────────────────────────────────────────┬────────┬──────────┐
//!  │ epoch (56 bits, bumped on every clear)   │ closed │ mode (7) │
//!  └──────────────────────────────────────────┴────────┴──────────┘
//! ```
//!
//! A single mode byte means at most one mode can ever be raised.  The epoch
//! lets an enable request detect, after its grace period, whether a newer
//! request cleared the word in the meantime, and gives every running loop a
//! [`Lease`] that lapses the moment its mode is cleared, even if another
//! mode is raised before the loop next looks.  Once shutdown sets the
//! closed bit no claim can succeed again.
//!
//! [`NavContext`] is the "blackboard" a running loop hands to its state
//! handlers: ports, config, mailbox and per-loop bookkeeping.

use core::sync::atomic::{AtomicI32, AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::app::events::AppEvent;
use crate::app::ports::{EventSink, Peripherals, TrackerPort};
use crate::config::VehicleConfig;
use crate::control::scan::{ScanResult, ScanSweep};
use crate::control::turn::TurnCalibrator;
use crate::watchers::WatcherSet;

use super::{Mailbox, NavOp};

/// Servo travel limit (degrees either side of centre).
pub const SERVO_LIMIT: i32 = 90;

// ---------------------------------------------------------------------------
// Modes
// ---------------------------------------------------------------------------

/// The mutually exclusive autonomous modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Mode {
    SelfDriving = 1,
    SelfTracking = 2,
    SpeechDriving = 3,
}

impl Mode {
    fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            1 => Some(Self::SelfDriving),
            2 => Some(Self::SelfTracking),
            3 => Some(Self::SpeechDriving),
            _ => None,
        }
    }
}

/// Snapshot of the three mode flags, as shown to an operator UI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModeFlags {
    pub self_driving: bool,
    pub self_tracking: bool,
    pub speech_driving: bool,
}

impl ModeFlags {
    /// Number of raised flags (never more than one).
    pub fn count(self) -> usize {
        usize::from(self.self_driving)
            + usize::from(self.self_tracking)
            + usize::from(self.speech_driving)
    }
}

const MODE_MASK: u64 = 0x7F;
const CLOSED: u64 = 0x80;
const EPOCH_SHIFT: u32 = 8;

fn pack(epoch: u64, mode: Option<Mode>) -> u64 {
    (epoch << EPOCH_SHIFT) | mode.map_or(0, |m| m as u64)
}

fn unpack(word: u64) -> (u64, Option<Mode>) {
    (word >> EPOCH_SHIFT, Mode::from_bits((word & MODE_MASK) as u8))
}

/// Proof that a mode was raised at a given epoch.  Mode loops and their
/// watchers run while their lease holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lease {
    pub mode: Mode,
    pub ticket: u64,
}

// ---------------------------------------------------------------------------
// VehicleState
// ---------------------------------------------------------------------------

/// Process-wide vehicle state.
pub struct VehicleState {
    mode: AtomicU64,
    servo_angle: AtomicI32,
    op: AtomicU8,
}

impl Default for VehicleState {
    fn default() -> Self {
        Self::new()
    }
}

impl VehicleState {
    pub const fn new() -> Self {
        Self {
            mode: AtomicU64::new(0),
            servo_angle: AtomicI32::new(0),
            op: AtomicU8::new(NavOp::Stop as u8),
        }
    }

    // ── Modes ─────────────────────────────────────────────────

    /// Lower every mode flag and start a new epoch.  Returns the ticket a
    /// later [`claim`](Self::claim) must present.
    pub fn clear_modes(&self) -> u64 {
        let prev = self
            .mode
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |w| {
                let (epoch, _) = unpack(w);
                Some(pack(epoch.wrapping_add(1), None) | (w & CLOSED))
            })
            .unwrap_or_else(|w| w);
        unpack(prev).0.wrapping_add(1)
    }

    /// Raise `mode` if nothing has touched the word since the clear that
    /// issued `ticket`.
    pub fn claim(&self, mode: Mode, ticket: u64) -> Option<Lease> {
        self.mode
            .compare_exchange(
                pack(ticket, None),
                pack(ticket, Some(mode)),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .ok()
            .map(|_| Lease { mode, ticket })
    }

    /// The mode raised under `lease` is still up.
    pub fn holds(&self, lease: Lease) -> bool {
        self.mode.load(Ordering::Acquire) == pack(lease.ticket, Some(lease.mode))
    }

    /// Lower `mode` if it is the raised one.  Returns whether it was.
    pub fn release(&self, mode: Mode) -> bool {
        self.mode
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |w| match unpack(w) {
                (epoch, Some(m)) if m == mode => {
                    Some(pack(epoch.wrapping_add(1), None) | (w & CLOSED))
                }
                _ => None,
            })
            .is_ok()
    }

    /// Lower every flag for good.  Outstanding tickets and leases lapse and
    /// no later claim can succeed.
    pub fn close(&self) {
        let _ = self
            .mode
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |w| {
                let (epoch, _) = unpack(w);
                Some(pack(epoch.wrapping_add(1), None) | CLOSED)
            });
    }

    pub fn is_closed(&self) -> bool {
        self.mode.load(Ordering::Acquire) & CLOSED != 0
    }

    pub fn active(&self) -> Option<Mode> {
        unpack(self.mode.load(Ordering::Acquire)).1
    }

    pub fn is_active(&self, mode: Mode) -> bool {
        self.active() == Some(mode)
    }

    /// Self-driving or self-tracking (both run the navigation loop).
    pub fn navigating(&self) -> bool {
        matches!(self.active(), Some(Mode::SelfDriving | Mode::SelfTracking))
    }

    pub fn flags(&self) -> ModeFlags {
        let active = self.active();
        ModeFlags {
            self_driving: active == Some(Mode::SelfDriving),
            self_tracking: active == Some(Mode::SelfTracking),
            speech_driving: active == Some(Mode::SpeechDriving),
        }
    }

    // ── Servo ─────────────────────────────────────────────────

    pub fn servo_angle(&self) -> i32 {
        self.servo_angle.load(Ordering::Acquire)
    }

    /// Record an absolute servo angle, clamped.  Returns the stored value.
    pub fn set_servo_angle(&self, angle: i32) -> i32 {
        let clamped = angle.clamp(-SERVO_LIMIT, SERVO_LIMIT);
        self.servo_angle.store(clamped, Ordering::Release);
        clamped
    }

    /// Move the recorded angle by `delta`, clamped.  Returns the new value.
    pub fn step_servo_angle(&self, delta: i32) -> i32 {
        let prev = self
            .servo_angle
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |a| {
                Some(a.saturating_add(delta).clamp(-SERVO_LIMIT, SERVO_LIMIT))
            })
            .unwrap_or_else(|a| a);
        prev.saturating_add(delta).clamp(-SERVO_LIMIT, SERVO_LIMIT)
    }

    // ── Current op ────────────────────────────────────────────

    pub fn op(&self) -> NavOp {
        NavOp::from_index(self.op.load(Ordering::Acquire) as usize)
    }

    pub(crate) fn set_op(&self, op: NavOp) {
        self.op.store(op as u8, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// Tracker slot
// ---------------------------------------------------------------------------

/// The open visual tracker, shared between the mode controller (which opens
/// and closes it) and the tracking watcher (which polls it).
#[derive(Default)]
pub struct TrackerSlot(Mutex<Option<Box<dyn TrackerPort>>>);

impl TrackerSlot {
    pub fn new(tracker: Box<dyn TrackerPort>) -> Self {
        Self(Mutex::new(Some(tracker)))
    }

    /// Run `f` against the tracker.  `None` once the tracker is closed.
    pub fn with<R>(&self, f: impl FnOnce(&mut dyn TrackerPort) -> R) -> Option<R> {
        let mut guard = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        guard.as_deref_mut().map(|t| f(t))
    }

    /// Drop the tracker.  Returns whether one was open.
    pub fn close(&self) -> bool {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
    }

    pub fn is_open(&self) -> bool {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }
}

// ---------------------------------------------------------------------------
// NavContext
// ---------------------------------------------------------------------------

/// Everything a mode loop's op handlers read from and write to.
pub struct NavContext {
    pub hw: Peripherals,
    pub state: Arc<VehicleState>,
    pub config: Arc<VehicleConfig>,
    pub sink: Arc<dyn EventSink>,
    pub mailbox: Arc<Mailbox>,
    /// Open tracker while self-tracking.
    pub tracker: Option<Arc<TrackerSlot>>,
    pub turner: TurnCalibrator,
    pub scanner: ScanSweep,
    /// The loop runs while this holds.
    pub lease: Lease,

    /// Consecutive back-offs since the last turn.
    pub retry: u8,
    /// Result of the most recent sweep.
    pub last_scan: ScanResult,
    /// Motors were started by the forward op and watchers are out.
    pub moving: bool,
    /// Watchers of the current (or last) forward episode.
    pub watchers: Option<WatcherSet>,
}

impl NavContext {
    pub fn new(
        hw: Peripherals,
        state: Arc<VehicleState>,
        config: Arc<VehicleConfig>,
        sink: Arc<dyn EventSink>,
        lease: Lease,
    ) -> Self {
        let turner = TurnCalibrator::new(&hw, &config);
        let scanner = ScanSweep::new(&hw, Arc::clone(&state), &config);
        Self {
            hw,
            state,
            config,
            sink,
            mailbox: Arc::new(Mailbox::new()),
            tracker: None,
            turner,
            scanner,
            lease,
            retry: 0,
            last_scan: ScanResult::INVALID,
            moving: false,
            watchers: None,
        }
    }

    pub fn with_tracker(mut self, tracker: Arc<TrackerSlot>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn running(&self) -> bool {
        self.state.holds(self.lease)
    }

    pub fn emit(&self, event: &AppEvent) {
        self.sink.emit(event);
    }
}
