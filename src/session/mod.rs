use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod clock;
pub mod registry;
pub mod session;
#[cfg(test)]
mod tests;
pub use clock::TimerClock;
pub use registry::SessionRegistry;
pub use session::{CallSession, CallSessionBuilder, CallSessionSnapshot};

/// State-machine state of a call session.
///
/// `Ended` is terminal: once a session reaches it, only `visible` may still
/// change (the adapter hides the widget as a separate step).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallMode {
    Incoming,
    Outgoing,
    Active,
    Ended,
}

impl std::fmt::Display for CallMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallMode::Incoming => write!(f, "incoming"),
            CallMode::Outgoing => write!(f, "outgoing"),
            CallMode::Active => write!(f, "active"),
            CallMode::Ended => write!(f, "ended"),
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    /// Malformed or missing identity data at session creation. The call
    /// widget never opens for these.
    #[error("invalid origination: {reason}")]
    InvalidOrigination { reason: String },

    /// An action requested in a mode that does not permit it. Absorbed as a
    /// no-op at the console boundary.
    #[error("{action} is not allowed while {mode}")]
    IllegalTransition {
        action: &'static str,
        mode: CallMode,
    },
}

// Console commands
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum SessionCommand {
    Answer {},
    Decline {},
    Voicemail {},
    EndCall {},
    Minimize {},
    Restore {},
    ToggleMute {},
    ToggleSpeaker {},
}

impl SessionCommand {
    /// Dispatch this command against a session. Illegal transitions come back
    /// as `Err` so callers decide whether to surface or absorb them.
    pub fn apply(&self, session: &CallSession) -> Result<(), SessionError> {
        match self {
            SessionCommand::Answer {} => session.answer(),
            SessionCommand::Decline {} => session.decline(),
            SessionCommand::Voicemail {} => session.voicemail(),
            SessionCommand::EndCall {} => session.end_call(),
            SessionCommand::Minimize {} => session.minimize(),
            SessionCommand::Restore {} => session.restore(),
            SessionCommand::ToggleMute {} => session.toggle_mute(),
            SessionCommand::ToggleSpeaker {} => session.toggle_speaker(),
        }
    }
}
