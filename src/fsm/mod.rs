//! Function-pointer op machine driving the mode loops.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  OpTable                                                 │
//! │  ┌──────────┬───────────┬──────────┬──────────────────┐  │
//! │  │ NavOp    │ on_enter  │ on_exit  │ on_update        │  │
//! │  ├──────────┼───────────┼──────────┼──────────────────┤  │
//! │  │ Forward  │ fn(ctx)   │ fn(ctx)  │ fn(ctx)->Option<>│  │
//! │  │ Backward │ -         │ -        │ fn(ctx)->Option<>│  │
//! │  │ ...      │           │          │                  │  │
//! │  └──────────┴───────────┴──────────┴──────────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Unlike a timer-ticked machine, the next op is never returned straight
//! to the engine.  Each step:
//!
//! 1. takes whatever sits in the [`Mailbox`] (watchers and the operator
//!    post there too; only the freshest value survives),
//! 2. transitions if it differs from the current op,
//! 3. runs the current op's `on_update`, which blocks for the op's own
//!    delays and may post a follow-up op back into the mailbox.
//!
//! An override posted while an op is running therefore replaces that op's
//! own follow-up.

pub mod context;
pub mod states;

use context::NavContext;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use log::{debug, info, warn};

use crate::app::events::AppEvent;

// ---------------------------------------------------------------------------
// Op identity
// ---------------------------------------------------------------------------

/// Every op a mode loop can be in.
/// Must stay in sync with the tables built in [`states`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NavOp {
    Forward = 0,
    Backward = 1,
    Left = 2,
    Right = 3,
    Stop = 4,
    Pause = 5,
    Turn = 6,
    Scan = 7,
}

impl NavOp {
    /// Total number of ops, used to size the tables.
    pub const COUNT: usize = 8;

    /// Convert an index back to `NavOp`.  Out-of-range falls back to
    /// `Stop` (debug builds assert).
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Forward,
            1 => Self::Backward,
            2 => Self::Left,
            3 => Self::Right,
            4 => Self::Stop,
            5 => Self::Pause,
            6 => Self::Turn,
            7 => Self::Scan,
            _ => {
                debug_assert!(false, "invalid op index: {idx}");
                Self::Stop
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Backward => "backward",
            Self::Left => "left",
            Self::Right => "right",
            Self::Stop => "stop",
            Self::Pause => "pause",
            Self::Turn => "turn",
            Self::Scan => "scan",
        }
    }
}

// ---------------------------------------------------------------------------
// Override mailbox
// ---------------------------------------------------------------------------

/// Single-slot overwrite mailbox feeding a mode loop.
///
/// Posting never blocks and replaces any value not yet taken.
pub struct Mailbox(Signal<CriticalSectionRawMutex, NavOp>);

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Mailbox {
    pub const fn new() -> Self {
        Self(Signal::new())
    }

    pub fn post(&self, op: NavOp) {
        self.0.signal(op);
    }

    /// Non-blocking take of the freshest posted op.
    pub fn take(&self) -> Option<NavOp> {
        self.0.try_take()
    }

    pub fn is_empty(&self) -> bool {
        !self.0.signaled()
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
pub type OpActionFn = fn(&mut NavContext);

/// Signature for the per-step handler.  Returns the op to post next, if any.
pub type OpUpdateFn = fn(&mut NavContext) -> Option<NavOp>;

// ---------------------------------------------------------------------------
// Op descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Static descriptor for a single op.
pub struct OpDescriptor {
    pub id: NavOp,
    pub name: &'static str,
    pub on_enter: Option<OpActionFn>,
    pub on_exit: Option<OpActionFn>,
    pub on_update: OpUpdateFn,
}

/// A loop's op table, indexed by `NavOp as usize`.  `None` rows are ops
/// the loop does not handle; posting one is logged and ignored.
pub type OpTable = [Option<OpDescriptor>; NavOp::COUNT];

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// The op machine.  Owns its table; the [`NavContext`] is passed in.
pub struct Fsm {
    table: OpTable,
    current: usize,
    steps: u64,
}

impl Fsm {
    /// Construct a machine starting in `initial`, which must have a row.
    pub fn new(table: OpTable, initial: NavOp) -> Self {
        debug_assert!(table[initial as usize].is_some(), "initial op has no row");
        Self {
            table,
            current: initial as usize,
            steps: 0,
        }
    }

    /// Publish the initial op and run its `on_enter`.
    pub fn start(&mut self, ctx: &mut NavContext) {
        let op = self.current_op();
        info!("Op machine starting in: {}", op.name());
        ctx.state.set_op(op);
        if let Some(enter) = self.row(self.current).and_then(|r| r.on_enter) {
            enter(ctx);
        }
    }

    /// One iteration: take the pending override, transition, run the op.
    pub fn step(&mut self, ctx: &mut NavContext) {
        self.steps = self.steps.wrapping_add(1);

        if let Some(next) = ctx.mailbox.take() {
            if next as usize != self.current {
                if self.row(next as usize).is_some() {
                    self.transition(next, ctx);
                } else {
                    warn!("Op {} not handled by this loop, ignored", next.name());
                }
            }
        }

        let Some(update) = self.row(self.current).map(|r| r.on_update) else {
            return;
        };
        if let Some(follow_up) = update(ctx) {
            debug!("{} -> post {}", self.current_op().name(), follow_up.name());
            ctx.mailbox.post(follow_up);
        }
    }

    /// Step until the context's run predicate turns false, then run the
    /// current op's `on_exit`.
    pub fn run(&mut self, ctx: &mut NavContext) {
        self.start(ctx);
        while ctx.running() {
            self.step(ctx);
        }
        if let Some(exit) = self.row(self.current).and_then(|r| r.on_exit) {
            exit(ctx);
        }
        info!("Op machine stopped after {} steps", self.steps);
    }

    pub fn current_op(&self) -> NavOp {
        NavOp::from_index(self.current)
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn row(&self, idx: usize) -> Option<&OpDescriptor> {
        self.table.get(idx).and_then(Option::as_ref)
    }

    fn transition(&mut self, next: NavOp, ctx: &mut NavContext) {
        let from = self.current_op();
        let next_idx = next as usize;

        info!(
            "Op transition: {} -> {}",
            self.row(self.current).map_or("?", |r| r.name),
            self.row(next_idx).map_or("?", |r| r.name)
        );

        if let Some(exit) = self.row(self.current).and_then(|r| r.on_exit) {
            exit(ctx);
        }

        self.current = next_idx;
        ctx.state.set_op(next);
        ctx.emit(&AppEvent::OpChanged { from, to: next });

        if let Some(enter) = self.row(self.current).and_then(|r| r.on_enter) {
            enter(ctx);
        }
    }
}
