//! Operator command queue.
//!
//! The single entry point for operator input.  Tokens are parsed on the
//! caller's side, buffered in a bounded channel (senders block when it is
//! full) and dispatched in order by one consumer thread.
//!
//! ```text
//!  submit("scan") ──▶ parse ──▶ [ bounded channel ] ──▶ dispatch thread ──▶ Vehicle
//!                       │
//!                       └── unknown: log + CommandDropped
//! ```
//!
//! Shutdown closes the channel; the consumer drains what is already
//! buffered, then clears every mode and stops the motor.

use std::sync::mpsc::{self, SyncSender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use log::{info, warn};

use super::commands::Command;
use super::events::AppEvent;
use super::service::Vehicle;
use crate::task::{join_quietly, spawn_named};

pub struct CommandQueue {
    vehicle: Arc<Vehicle>,
    tx: Mutex<Option<SyncSender<Command>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl CommandQueue {
    /// Start the dispatch thread.  `capacity` comes from the config.
    pub fn spawn(vehicle: Arc<Vehicle>) -> Self {
        let capacity = vehicle.config().command_queue_capacity.max(1);
        let (tx, rx) = mpsc::sync_channel::<Command>(capacity);

        let consumer = Arc::clone(&vehicle);
        let worker = spawn_named("dispatch", move || {
            for cmd in rx {
                consumer.dispatch(cmd);
            }
            info!("Command queue drained");
            consumer.shutdown();
        });
        if worker.is_none() {
            warn!("Dispatch thread unavailable, commands will be dropped");
        }

        Self {
            vehicle,
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(worker),
        }
    }

    /// Parse `token` and enqueue it.  Blocks while the queue is full.
    /// Unknown tokens and submissions after shutdown are logged and
    /// dropped.
    pub fn submit(&self, token: &str) {
        match token.parse::<Command>() {
            Ok(cmd) => self.submit_command(cmd),
            Err(_) => {
                warn!("Unknown command '{}', dropped", token.trim());
                self.vehicle
                    .sink()
                    .emit(&AppEvent::CommandDropped(token.trim().to_owned()));
            }
        }
    }

    pub fn submit_command(&self, cmd: Command) {
        // Clone the sender so a full queue never blocks shutdown().
        let tx = self.tx.lock().unwrap_or_else(PoisonError::into_inner).clone();
        let Some(tx) = tx else {
            warn!("Queue closed, '{}' dropped", cmd);
            return;
        };
        if tx.send(cmd).is_err() {
            warn!("Dispatch thread gone, '{}' dropped", cmd);
        }
    }

    /// Close the queue and wait until buffered commands are dispatched and
    /// the vehicle is stopped.  Idempotent.
    pub fn shutdown(&self) {
        drop(self.tx.lock().unwrap_or_else(PoisonError::into_inner).take());
        let worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
        match worker {
            Some(handle) => join_quietly(handle),
            None => {
                if self.vehicle.is_running() {
                    self.vehicle.shutdown();
                }
            }
        }
    }

    pub fn vehicle(&self) -> &Arc<Vehicle> {
        &self.vehicle
    }
}

impl Drop for CommandQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}
