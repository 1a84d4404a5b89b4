//! Video recording daemon controlled through shell commands.
//!
//! The car records video with an external daemon that owns the camera.
//! Self-tracking needs the camera, so the daemon is stopped while it runs.

use std::process::Command;

use log::{info, warn};

use crate::app::ports::VideoPort;
use crate::config::VideoConfig;
use crate::error::ServiceError;

pub struct ProcessVideoService {
    start_cmd: String,
    stop_cmd: String,
}

impl ProcessVideoService {
    pub fn new(config: &VideoConfig) -> Self {
        Self {
            start_cmd: config.start_cmd.clone(),
            stop_cmd: config.stop_cmd.clone(),
        }
    }

    fn run(cmd: &str) -> Result<(), ServiceError> {
        let mut words = cmd.split_whitespace();
        let Some(program) = words.next() else {
            return Err(ServiceError::Unavailable);
        };
        info!("video: {}", cmd);
        let status = Command::new(program).args(words).status().map_err(|e| {
            warn!("video: cannot run '{}': {}", program, e);
            ServiceError::Unavailable
        })?;
        if status.success() {
            Ok(())
        } else {
            warn!("video: '{}' exited with {}", cmd, status);
            Err(ServiceError::BadResponse)
        }
    }
}

impl VideoPort for ProcessVideoService {
    fn start(&self) -> Result<(), ServiceError> {
        Self::run(&self.start_cmd)
    }

    fn stop(&self) -> Result<(), ServiceError> {
        Self::run(&self.stop_cmd)
    }
}
