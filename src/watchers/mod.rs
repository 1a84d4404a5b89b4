//! Concurrent observers that race to override the forward op.
//!
//! Each entry into `forward` spawns a fresh set of watcher threads sharing
//! one [`Episode`]:
//!
//! ```text
//!            ┌──────────────┐
//!            │   Episode    │  claimed ─┐ first claim wins, every other
//!            │              │  retired ─┤ watcher sees the episode closed
//!            └──────┬───────┘           │ and returns
//!       ┌───────────┼────────────┐      │
//!       ▼           ▼            ▼      │
//!   collision    obstacle    tracking   │
//!       └───────────┴────────────┴──▶ Mailbox (one override)
//! ```
//!
//! Only the claimant posts.  The loop cancels an episode when it leaves
//! `forward` (no further claims) and retires it before the next episode
//! or at loop end (the claimant stops too).

pub mod collision;
pub mod obstacle;
pub mod tracking;

use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use log::info;

use crate::app::events::AppEvent;
use crate::app::ports::{EventSink, Peripherals};
use crate::config::VehicleConfig;
use crate::control::turn::TurnCalibrator;
use crate::fsm::context::{Lease, Mode, NavContext, VehicleState};
use crate::fsm::{Mailbox, NavOp};
use crate::task::{join_quietly, spawn_named};

/// Which watcher produced an override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatcherKind {
    Collision,
    Obstacle,
    Tracking,
}

// ---------------------------------------------------------------------------
// Episode
// ---------------------------------------------------------------------------

/// Cancellation token plus single override claim for one forward run.
#[derive(Debug, Default)]
pub struct Episode {
    claimed: AtomicBool,
    retired: AtomicBool,
}

impl Episode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the right to post.  Succeeds for exactly one caller and only
    /// while the episode is open.
    pub fn claim(&self) -> bool {
        !self.retired.load(Ordering::Acquire)
            && self
                .claimed
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
    }

    /// Neither claimed nor cancelled.
    pub fn is_open(&self) -> bool {
        !self.claimed.load(Ordering::Acquire) && !self.retired.load(Ordering::Acquire)
    }

    /// Close the episode to further claims.
    pub fn cancel(&self) {
        self.claimed.store(true, Ordering::Release);
    }

    /// Close the episode and stop its claimant as well.
    pub fn retire(&self) {
        self.cancel();
        self.retired.store(true, Ordering::Release);
    }

    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }
}

// ---------------------------------------------------------------------------
// Watcher context
// ---------------------------------------------------------------------------

/// What every watcher thread needs, detached from the loop's context.
#[derive(Clone)]
pub struct WatchContext {
    pub hw: Peripherals,
    pub state: Arc<VehicleState>,
    pub config: Arc<VehicleConfig>,
    pub sink: Arc<dyn EventSink>,
    pub mailbox: Arc<Mailbox>,
    pub turner: TurnCalibrator,
    lease: Lease,
}

impl WatchContext {
    pub fn from_nav(ctx: &NavContext) -> Self {
        Self {
            hw: ctx.hw.clone(),
            state: Arc::clone(&ctx.state),
            config: Arc::clone(&ctx.config),
            sink: Arc::clone(&ctx.sink),
            mailbox: Arc::clone(&ctx.mailbox),
            turner: ctx.turner.clone(),
            lease: ctx.lease,
        }
    }

    /// The owning loop's mode is still up.
    pub fn running(&self) -> bool {
        self.state.holds(self.lease)
    }

    /// Claim `episode` and, if won, post `op`.
    pub fn claim_and_post(&self, episode: &Episode, op: NavOp, by: WatcherKind) -> bool {
        if !episode.claim() {
            return false;
        }
        info!("{:?} watcher: override -> {}", by, op.name());
        self.mailbox.post(op);
        self.sink.emit(&AppEvent::Override { op, by });
        true
    }

    /// Point the servo (and the recorded angle) at `angle`.
    pub fn look(&self, angle: i32) {
        let angle = self.state.set_servo_angle(angle);
        self.hw.servo_to(angle);
    }
}

// ---------------------------------------------------------------------------
// Watcher set
// ---------------------------------------------------------------------------

/// The threads of one episode.
pub struct WatcherSet {
    episode: Arc<Episode>,
    handles: Vec<JoinHandle<()>>,
}

impl WatcherSet {
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn cancel(&self) {
        self.episode.cancel();
    }

    /// Stop every watcher, the claimant included, and wait for them.
    pub fn retire_and_join(self) {
        self.episode.retire();
        for handle in self.handles {
            join_quietly(handle);
        }
    }
}

/// Spawn the watchers the hardware and current mode allow.
pub fn spawn(ctx: &NavContext) -> WatcherSet {
    let episode = Arc::new(Episode::new());
    let w = WatchContext::from_nav(ctx);
    let mut handles = Vec::with_capacity(3);

    if !ctx.hw.switches.is_empty() {
        let (w, ep) = (w.clone(), Arc::clone(&episode));
        handles.extend(spawn_named("collision-watch", move || collision::run(&w, &ep)));
    }

    if ctx.hw.distance.is_some() {
        let (w, ep) = (w.clone(), Arc::clone(&episode));
        handles.extend(spawn_named("obstacle-watch", move || obstacle::run(&w, &ep)));
    }

    if ctx.lease.mode == Mode::SelfTracking {
        if let Some(slot) = &ctx.tracker {
            let (w, ep, slot) = (w.clone(), Arc::clone(&episode), Arc::clone(slot));
            handles.extend(spawn_named("tracking-watch", move || tracking::run(&w, &ep, &slot)));
        }
    }

    let set = WatcherSet { episode, handles };
    info!("Forward episode: {} watcher(s)", set.len());
    set
}
