//! Inbound operator commands.
//!
//! Tokens arrive as plain text (web buttons, console lines) and are parsed
//! into [`Command`] before they reach the queue.  Parsing ignores case and
//! surrounding whitespace.

use core::fmt;
use core::str::FromStr;

/// Every action an operator can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    // Motion (run on the dispatch thread)
    Forward,
    Backward,
    Left,
    Right,
    Stop,

    // Navigation ops (forwarded to a running navigation loop)
    Pause,
    Turn,
    Scan,

    // Peripheral side effects
    Beep,
    Blink,
    ServoLeft,
    ServoRight,
    ServoAhead,
    LightOn,
    LightOff,

    // Modes
    SelfDrivingOn,
    SelfDrivingOff,
    SelfTrackingOn,
    SelfTrackingOff,
    SpeechDrivingOn,
    SpeechDrivingOff,
}

impl Command {
    /// All commands with their wire tokens.
    pub const ALL: [(&'static str, Command); 21] = [
        ("forward", Self::Forward),
        ("backward", Self::Backward),
        ("left", Self::Left),
        ("right", Self::Right),
        ("stop", Self::Stop),
        ("pause", Self::Pause),
        ("turn", Self::Turn),
        ("scan", Self::Scan),
        ("beep", Self::Beep),
        ("blink", Self::Blink),
        ("servoleft", Self::ServoLeft),
        ("servoright", Self::ServoRight),
        ("servoahead", Self::ServoAhead),
        ("lighton", Self::LightOn),
        ("lightoff", Self::LightOff),
        ("selfdrivingon", Self::SelfDrivingOn),
        ("selfdrivingoff", Self::SelfDrivingOff),
        ("selftrackingon", Self::SelfTrackingOn),
        ("selftrackingoff", Self::SelfTrackingOff),
        ("speechdrivingon", Self::SpeechDrivingOn),
        ("speechdrivingoff", Self::SpeechDrivingOff),
    ];

    /// The canonical token for this command.
    pub fn token(self) -> &'static str {
        Self::ALL
            .iter()
            .find(|(_, c)| *c == self)
            .map_or("?", |(t, _)| t)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// The token did not name a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownCommand;

impl fmt::Display for UnknownCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unknown command")
    }
}

impl std::error::Error for UnknownCommand {}

impl FromStr for Command {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        Self::ALL
            .iter()
            .find(|(t, _)| t.eq_ignore_ascii_case(token))
            .map(|&(_, c)| c)
            .ok_or(UnknownCommand)
    }
}
