//! Thread spawning and blocking delays.
//!
//! Every concurrent activity in the controller (mode loops, watchers, the
//! speech bridge, side effects) is a named OS thread.  The names show up
//! in log output and debuggers.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, warn};

/// Block the calling thread for `ms` milliseconds.
pub fn delay_ms(ms: u64) {
    if ms > 0 {
        thread::sleep(Duration::from_millis(ms));
    }
}

/// Spawn a named thread.  Returns `None` (and logs) if the OS refuses.
pub fn spawn_named(
    name: &'static str,
    f: impl FnOnce() + Send + 'static,
) -> Option<JoinHandle<()>> {
    debug!("Spawning '{}'", name);
    match thread::Builder::new().name(name.into()).spawn(f) {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Failed to spawn '{}': {}", name, e);
            None
        }
    }
}

/// Spawn a named thread nobody joins.
pub fn detach(name: &'static str, f: impl FnOnce() + Send + 'static) {
    drop(spawn_named(name, f));
}

/// Join `handle`, logging a panic instead of propagating it.
pub fn join_quietly(handle: JoinHandle<()>) {
    let name = handle.thread().name().unwrap_or("?").to_owned();
    if handle.join().is_err() {
        warn!("Thread '{}' panicked", name);
    }
}
