//! Visual target follower.
//!
//! Phase 1 races the other watchers: poll the tracker until the target
//! shows up, then claim the episode and park the loop in `pause`.
//! Phase 2 steers the car directly, outside the mailbox, until the target
//! is lost for a full circle (post `scan`) or the episode is retired.
//!
//! The camera image is mirrored, so a target on the image's left side is
//! physically to the car's right.

use std::sync::Arc;

use log::{debug, info};

use super::{Episode, WatchContext, WatcherKind};
use crate::app::events::AppEvent;
use crate::config::TrackingConfig;
use crate::fsm::NavOp;
use crate::fsm::context::TrackerSlot;
use crate::task::{delay_ms, detach};

/// Steering decision for a centroid x coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Steer {
    Left,
    Right,
    Ahead,
}

pub fn steer(x: i32, cfg: &TrackingConfig) -> Steer {
    if x < cfg.left_x {
        Steer::Right
    } else if x > cfg.right_x {
        Steer::Left
    } else {
        Steer::Ahead
    }
}

pub fn run(w: &WatchContext, episode: &Episode, slot: &Arc<TrackerSlot>) {
    loop {
        if !episode.is_open() || !w.running() {
            return;
        }
        match slot.with(|t| t.locate()) {
            None => return,
            Some(Some(_)) => break,
            Some(None) => delay_ms(w.config.tracking.poll_ms),
        }
    }

    if !w.claim_and_post(episode, NavOp::Pause, WatcherKind::Tracking) {
        return;
    }
    w.hw.motor.stop();
    info!("Target in sight");
    w.sink.emit(&AppEvent::TargetAcquired);
    follow(w, episode, slot);
}

fn follow(w: &WatchContext, episode: &Episode, slot: &TrackerSlot) {
    let cfg = &w.config.tracking;
    let motor = &w.hw.motor;
    let mut searched = 0;
    let mut fresh = true;

    while w.running() && !episode.is_retired() {
        let Some(frame) = slot.with(|t| t.locate().map(|rect| (rect, t.middle_xy(&rect)))) else {
            // Tracker closed under us.
            return;
        };

        let Some((rect, (x, y))) = frame else {
            fresh = true;
            if searched < cfg.search_limit_deg {
                debug!("target lost, searching ({}° so far)", searched);
                w.turner.turn(cfg.search_step_deg);
                searched += cfg.search_step_deg;
                delay_ms(cfg.search_settle_ms);
                continue;
            }
            info!("Target lost after a full search");
            w.sink.emit(&AppEvent::TargetLost);
            w.mailbox.post(NavOp::Scan);
            return;
        };
        searched = 0;

        if rect.max_y > cfg.near_y {
            motor.stop();
            w.hw.beep(1, 300);
            delay_ms(cfg.pulse_ms);
            continue;
        }

        if fresh {
            fresh = false;
            if let Some(horn) = w.hw.horn.clone() {
                detach("greet-beep", move || horn.beep(2, 100));
            }
        }

        debug!("target at ({}, {})", x, y);
        match steer(x, cfg) {
            Steer::Right => motor.right(),
            Steer::Left => motor.left(),
            Steer::Ahead => motor.forward(),
        }
        delay_ms(cfg.pulse_ms);
        motor.stop();
    }
}
