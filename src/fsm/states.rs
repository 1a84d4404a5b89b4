//! Concrete op handlers and table builders.
//!
//! Two loops share the engine: the navigation loop (self-driving and
//! self-tracking) and the speech-driving loop.
//!
//! ```text
//!  NAVIGATION
//!
//!   FORWARD ──[watcher: too near / bump]──▶ BACKWARD ──▶ STOP ──▶ SCAN
//!     ▲   └──[watcher: caution]──────────────────────────▶ STOP     │
//!     │                                                           │
//!     │               [min < near, not at ±90, retry < max]       │
//!     │                         BACKWARD ◀────────────────────────┤
//!     │                                                           │
//!     └────────────────────── TURN ◀──────────[otherwise]─────────┘
//!
//!   FORWARD ──[tracker: target]──▶ PAUSE ──[target lost]──▶ SCAN
//!
//!  SPEECH
//!
//!   STOP ◀── BACKWARD        LEFT / RIGHT ──▶ FORWARD
//!   (any op is replaced by the next voice intent)
//! ```

use log::{debug, info, warn};

use super::context::{NavContext, SERVO_LIMIT};
use super::{NavOp, OpDescriptor, OpTable};
use crate::app::events::AppEvent;
use crate::config::VehicleConfig;
use crate::control::scan::ScanResult;
use crate::task::delay_ms;
use crate::watchers;

// ═══════════════════════════════════════════════════════════════════════════
//  Table builders
// ═══════════════════════════════════════════════════════════════════════════

/// Op table of the navigation loop.
pub fn build_nav_table() -> OpTable {
    [
        // Index 0 — Forward
        Some(OpDescriptor {
            id: NavOp::Forward,
            name: "forward",
            on_enter: None,
            on_exit: Some(forward_exit),
            on_update: forward_update,
        }),
        // Index 1 — Backward
        Some(OpDescriptor {
            id: NavOp::Backward,
            name: "backward",
            on_enter: None,
            on_exit: None,
            on_update: backward_update,
        }),
        // Index 2, 3 — manual spins are not navigation ops
        None,
        None,
        // Index 4 — Stop
        Some(OpDescriptor {
            id: NavOp::Stop,
            name: "stop",
            on_enter: None,
            on_exit: None,
            on_update: stop_update,
        }),
        // Index 5 — Pause
        Some(OpDescriptor {
            id: NavOp::Pause,
            name: "pause",
            on_enter: None,
            on_exit: None,
            on_update: pause_update,
        }),
        // Index 6 — Turn
        Some(OpDescriptor {
            id: NavOp::Turn,
            name: "turn",
            on_enter: None,
            on_exit: None,
            on_update: turn_update,
        }),
        // Index 7 — Scan
        Some(OpDescriptor {
            id: NavOp::Scan,
            name: "scan",
            on_enter: None,
            on_exit: None,
            on_update: scan_update,
        }),
    ]
}

/// Op table of the speech-driving loop.
pub fn build_speech_table() -> OpTable {
    [
        Some(OpDescriptor {
            id: NavOp::Forward,
            name: "forward",
            on_enter: None,
            on_exit: Some(speech_forward_exit),
            on_update: speech_forward_update,
        }),
        Some(OpDescriptor {
            id: NavOp::Backward,
            name: "backward",
            on_enter: None,
            on_exit: None,
            on_update: speech_backward_update,
        }),
        Some(OpDescriptor {
            id: NavOp::Left,
            name: "left",
            on_enter: None,
            on_exit: None,
            on_update: speech_left_update,
        }),
        Some(OpDescriptor {
            id: NavOp::Right,
            name: "right",
            on_enter: None,
            on_exit: None,
            on_update: speech_right_update,
        }),
        Some(OpDescriptor {
            id: NavOp::Stop,
            name: "stop",
            on_enter: None,
            on_exit: None,
            on_update: speech_stop_update,
        }),
        None,
        None,
        None,
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  Navigation loop
// ═══════════════════════════════════════════════════════════════════════════

fn forward_update(ctx: &mut NavContext) -> Option<NavOp> {
    if !ctx.moving {
        ctx.hw.motor.forward();
        ctx.moving = true;
        // The last episode's claimant may still be steering.
        if let Some(prev) = ctx.watchers.take() {
            prev.retire_and_join();
        }
        let set = watchers::spawn(ctx);
        if set.is_empty() {
            warn!("Driving forward with nothing watching the road");
        }
        ctx.watchers = Some(set);
    }
    delay_ms(ctx.config.forward_poll_ms);
    None
}

fn forward_exit(ctx: &mut NavContext) {
    if let Some(set) = &ctx.watchers {
        set.cancel();
    }
    if ctx.moving {
        ctx.hw.motor.stop();
        ctx.moving = false;
    }
}

fn backward_update(ctx: &mut NavContext) -> Option<NavOp> {
    ctx.hw.motor.stop();
    delay_ms(ctx.config.brake_pause_ms);
    ctx.hw.motor.backward();
    delay_ms(ctx.config.backward_ms);
    Some(NavOp::Stop)
}

fn stop_update(ctx: &mut NavContext) -> Option<NavOp> {
    ctx.hw.motor.stop();
    delay_ms(ctx.config.brake_pause_ms);
    Some(NavOp::Scan)
}

fn scan_update(ctx: &mut NavContext) -> Option<NavOp> {
    let result = ctx.scanner.sweep();
    info!(
        "SCAN: min={:.0}cm @ {}, max={:.0}cm @ {}",
        result.min_dist, result.min_angle, result.max_dist, result.max_angle
    );
    ctx.last_scan = result;
    ctx.emit(&AppEvent::Scanned(result));

    let (next, retry) = after_scan(&result, ctx.retry, &ctx.config);
    ctx.retry = retry;
    Some(next)
}

fn turn_update(ctx: &mut NavContext) -> Option<NavOp> {
    ctx.turner.turn(ctx.last_scan.max_angle);
    delay_ms(ctx.config.turn_settle_ms);
    Some(NavOp::Forward)
}

fn pause_update(ctx: &mut NavContext) -> Option<NavOp> {
    delay_ms(ctx.config.pause_ms);
    None
}

/// Decide what follows a sweep: back off from something too close in
/// front, otherwise turn toward the open side.  Returns the next op and
/// the updated back-off counter.
pub fn after_scan(scan: &ScanResult, retry: u8, config: &VehicleConfig) -> (NavOp, u8) {
    let blocked = scan.is_valid()
        && scan.min_dist < config.near_cm
        && scan.min_angle.abs() != SERVO_LIMIT;
    if blocked && retry < config.max_backoff_retries {
        (NavOp::Backward, retry + 1)
    } else {
        (NavOp::Turn, 0)
    }
}

/// Tear-down once the navigation loop's predicate is false.
pub fn finish_navigation(ctx: &mut NavContext) {
    if let Some(set) = ctx.watchers.take() {
        set.retire_and_join();
    }
    ctx.moving = false;
    ctx.hw.motor.stop();
    delay_ms(ctx.config.loop_settle_ms);
}

// ═══════════════════════════════════════════════════════════════════════════
//  Speech-driving loop
// ═══════════════════════════════════════════════════════════════════════════

fn speech_forward_update(ctx: &mut NavContext) -> Option<NavOp> {
    if !ctx.moving {
        ctx.hw.motor.forward();
        ctx.moving = true;
    }
    delay_ms(ctx.config.forward_poll_ms);
    None
}

fn speech_forward_exit(ctx: &mut NavContext) {
    ctx.moving = false;
}

fn speech_backward_update(ctx: &mut NavContext) -> Option<NavOp> {
    ctx.hw.motor.stop();
    delay_ms(ctx.config.brake_pause_ms);
    ctx.hw.motor.backward();
    delay_ms(ctx.config.speech.backward_ms);
    Some(NavOp::Stop)
}

fn speech_left_update(ctx: &mut NavContext) -> Option<NavOp> {
    speech_turn(ctx, -SERVO_LIMIT)
}

fn speech_right_update(ctx: &mut NavContext) -> Option<NavOp> {
    speech_turn(ctx, SERVO_LIMIT)
}

fn speech_turn(ctx: &mut NavContext, angle: i32) -> Option<NavOp> {
    ctx.hw.motor.stop();
    delay_ms(ctx.config.speech.turn_pause_ms);
    ctx.turner.turn(angle);
    delay_ms(ctx.config.speech.turn_pause_ms);
    Some(NavOp::Forward)
}

fn speech_stop_update(ctx: &mut NavContext) -> Option<NavOp> {
    ctx.hw.motor.stop();
    debug!("speech: idle");
    delay_ms(ctx.config.speech.stop_idle_ms);
    None
}

/// Tear-down once speech driving ends.
pub fn finish_speech(ctx: &mut NavContext) {
    ctx.moving = false;
    ctx.hw.motor.stop();
}
