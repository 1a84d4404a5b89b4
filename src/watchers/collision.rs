//! Bumper switch watcher.

use log::warn;

use super::{Episode, WatchContext, WatcherKind};
use crate::fsm::NavOp;
use crate::task::delay_ms;

/// Poll the switches until one trips or the episode closes.
pub fn run(w: &WatchContext, episode: &Episode) {
    while episode.is_open() && w.running() {
        if w.hw.any_collision() {
            if w.claim_and_post(episode, NavOp::Backward, WatcherKind::Collision) {
                warn!("Collision");
                w.hw.beep(1, 100);
            }
            return;
        }
        delay_ms(w.config.collision_poll_ms);
    }
}
