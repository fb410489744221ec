use crate::session::CallMode;
use serde::{Deserialize, Serialize};

/// SessionEvent represents observable changes of a call session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    tag = "event",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum SessionEvent {
    /// The session moved to a new mode
    ModeChanged { call_id: String, mode: CallMode },

    /// One more second elapsed while the call was outgoing or active
    DurationChanged {
        call_id: String,
        duration_seconds: u64,
    },

    /// Microphone mute flag flipped
    MuteChanged { call_id: String, muted: bool },

    /// Speaker flag flipped
    SpeakerChanged { call_id: String, speaker_on: bool },

    /// The presentation surface was shown or hidden
    VisibilityChanged { call_id: String, visible: bool },

    /// The console should move to another route
    Navigate { route: String },
}

impl SessionEvent {
    /// The session this event belongs to, if any. `Navigate` is a
    /// console-wide instruction and carries no call id.
    pub fn call_id(&self) -> Option<&str> {
        match self {
            SessionEvent::ModeChanged { call_id, .. } => Some(call_id),
            SessionEvent::DurationChanged { call_id, .. } => Some(call_id),
            SessionEvent::MuteChanged { call_id, .. } => Some(call_id),
            SessionEvent::SpeakerChanged { call_id, .. } => Some(call_id),
            SessionEvent::VisibilityChanged { call_id, .. } => Some(call_id),
            SessionEvent::Navigate { .. } => None,
        }
    }
}

/// Type alias for the event sender
pub type EventSender = tokio::sync::broadcast::Sender<SessionEvent>;

/// Type alias for the event receiver
pub type EventReceiver = tokio::sync::broadcast::Receiver<SessionEvent>;
