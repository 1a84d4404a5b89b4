//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the `log` facade.  A UI or telemetry adapter would implement the same
//! trait.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`].
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&self, event: &AppEvent) {
        match event {
            AppEvent::Started => info!("START | vehicle ready"),
            AppEvent::ModesCleared => info!("MODE  | all cleared"),
            AppEvent::ModeEnabled(mode) => info!("MODE  | {:?} on", mode),
            AppEvent::ModeDisabled(mode) => info!("MODE  | {:?} off", mode),
            AppEvent::ModeAborted { mode, reason } => {
                warn!("MODE  | {:?} refused: {}", mode, reason);
            }
            AppEvent::OpChanged { from, to } => {
                info!("OP    | {} -> {}", from.name(), to.name());
            }
            AppEvent::Scanned(s) => {
                info!(
                    "SCAN  | min={:.0}cm@{}\u{00b0} max={:.0}cm@{}\u{00b0}",
                    s.min_dist, s.min_angle, s.max_dist, s.max_angle
                );
            }
            AppEvent::Override { op, by } => {
                info!("WATCH | {:?} -> {}", by, op.name());
            }
            AppEvent::TargetAcquired => info!("TRACK | target acquired"),
            AppEvent::TargetLost => info!("TRACK | target lost"),
            AppEvent::VoiceCommand(intent) => info!("VOICE | {:?}", intent),
            AppEvent::CommandDropped(token) => warn!("CMD   | dropped '{}'", token),
            AppEvent::Shutdown => info!("STOP  | vehicle stopped"),
        }
    }
}
