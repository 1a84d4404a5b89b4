//! Outbound application events.
//!
//! The controller emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: log them, feed a UI, or record them
//! in tests.

use crate::control::scan::ScanResult;
use crate::fsm::NavOp;
use crate::fsm::context::Mode;
use crate::speech::Intent;
use crate::watchers::WatcherKind;

/// Structured events emitted by the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The vehicle finished its start-up sequence.
    Started,

    /// Every mode flag was cleared ahead of an enable.
    ModesCleared,

    /// A mode flag was raised and its loop is about to run.
    ModeEnabled(Mode),

    /// A mode flag was cleared by an operator request.
    ModeDisabled(Mode),

    /// An enable request was refused or could not complete.
    ModeAborted { mode: Mode, reason: &'static str },

    /// A mode loop moved from one op to another.
    OpChanged { from: NavOp, to: NavOp },

    /// A full servo sweep finished.
    Scanned(ScanResult),

    /// A watcher won its episode and posted an override.
    Override { op: NavOp, by: WatcherKind },

    /// The tracking watcher caught sight of its target.
    TargetAcquired,

    /// The tracking watcher searched a full circle without a sighting.
    TargetLost,

    /// A spoken phrase matched a keyword.
    VoiceCommand(Intent),

    /// An operator token did not parse, or had no loop to go to.
    CommandDropped(String),

    /// The command queue drained and the motor was stopped.
    Shutdown,
}
