//! Unified error types for the vehicle controller.
//!
//! Nothing in the control path propagates an error to the operator: every
//! failure ends as a log line and a skipped cycle.  These types exist so the
//! places that *do* fail (cloud services, tracker setup, config loading) can
//! say precisely which stage broke.  All variants are `Copy` so they can be
//! passed around the watcher threads without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the controller funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Audio capture for a voice command failed.
    Record(ServiceError),
    /// Speech-to-text conversion failed.
    Transcribe(ServiceError),
    /// Photo capture failed.
    Camera(ServiceError),
    /// Image recognition failed.
    Recognize(ServiceError),
    /// Text-to-speech synthesis failed.
    Synthesize(ServiceError),
    /// Audio playback failed.
    Playback(ServiceError),
    /// The visual tracker could not be opened.
    Tracker(ServiceError),
    /// A required collaborator was not provisioned.
    Missing(&'static str),
    /// Configuration is invalid.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Record(e) => write!(f, "record: {e}"),
            Self::Transcribe(e) => write!(f, "speech-to-text: {e}"),
            Self::Camera(e) => write!(f, "camera: {e}"),
            Self::Recognize(e) => write!(f, "image recognition: {e}"),
            Self::Synthesize(e) => write!(f, "text-to-speech: {e}"),
            Self::Playback(e) => write!(f, "playback: {e}"),
            Self::Tracker(e) => write!(f, "tracker: {e}"),
            Self::Missing(what) => write!(f, "missing {what}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// External service errors
// ---------------------------------------------------------------------------

/// Failure reported by an external collaborator (cloud API, subprocess,
/// camera pipeline).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceError {
    /// The service is not reachable or not installed.
    Unavailable,
    /// The call did not complete in time.
    Timeout,
    /// Local I/O (file, device, pipe) failed.
    Io,
    /// The service answered but the answer was unusable.
    BadResponse,
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => write!(f, "service unavailable"),
            Self::Timeout => write!(f, "timed out"),
            Self::Io => write!(f, "I/O error"),
            Self::BadResponse => write!(f, "bad response"),
        }
    }
}

impl std::error::Error for ServiceError {}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
