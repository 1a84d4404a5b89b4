//! Forward-looking distance watcher.
//!
//! Wiggles the servo over a short pattern around dead ahead and reads the
//! range finder at each position.

use log::debug;

use super::{Episode, WatchContext, WatcherKind};
use crate::fsm::NavOp;
use crate::task::delay_ms;

/// Map one reading to an override: too near backs off, within caution
/// stops.  Invalid (negative) readings never trigger.
pub fn classify_distance(dist: f32, near_cm: f32, caution_cm: f32) -> Option<NavOp> {
    if dist < 0.0 {
        None
    } else if dist < near_cm {
        Some(NavOp::Backward)
    } else if dist < caution_cm {
        Some(NavOp::Stop)
    } else {
        None
    }
}

pub fn run(w: &WatchContext, episode: &Episode) {
    let Some(distance) = w.hw.distance.as_deref() else {
        return;
    };
    let cfg = &w.config;

    while w.running() {
        for &angle in &cfg.obstacle_pattern {
            if !episode.is_open() {
                return;
            }
            w.look(angle);
            delay_ms(cfg.obstacle_settle_ms);
            let d = distance.measure_cm();
            debug!("ahead {}° = {:.0}cm", angle, d);
            if let Some(op) = classify_distance(d, cfg.near_cm, cfg.caution_cm) {
                w.claim_and_post(episode, op, WatcherKind::Obstacle);
                return;
            }
        }
    }
}
