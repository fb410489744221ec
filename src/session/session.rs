use super::clock::TimerClock;
use super::{CallMode, SessionError};
use crate::event::{EventReceiver, EventSender, SessionEvent};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

/// Point-in-time view of a call session, as served to the console.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallSessionSnapshot {
    pub call_id: String,
    pub phone_number: String,
    pub caller_name: Option<String>,
    pub mode: CallMode,
    pub started_at: Option<DateTime<Utc>>,
    pub duration_seconds: u64,
    pub muted: bool,
    pub speaker_on: bool,
    pub visible: bool,
}

struct CallSessionInner {
    state: RwLock<CallSessionSnapshot>,
    /// At most one running clock per session. `answer`/`connect` go through
    /// `start_clock`, which refuses to replace a live clock, so duplicate
    /// transitions cannot double the tick rate.
    clock: Mutex<Option<TimerClock>>,
    /// Cancellation token of the surface binding currently drawing this
    /// session. Replaced wholesale on re-attach.
    surface: Mutex<Option<CancellationToken>>,
    events: EventSender,
}

/// One live call the operator is handling.
///
/// Cloning yields another handle to the same session; all mutation goes
/// through the guarded transition methods. Time only ever advances
/// `duration_seconds`, never `mode`.
#[derive(Clone)]
pub struct CallSession {
    inner: Arc<CallSessionInner>,
}

pub struct CallSessionBuilder {
    mode: CallMode,
    phone_number: String,
    call_id: Option<String>,
    caller_name: Option<String>,
    seed_duration: u64,
    events: Option<EventSender>,
}

impl CallSessionBuilder {
    fn new(mode: CallMode, phone_number: impl Into<String>) -> Self {
        Self {
            mode,
            phone_number: phone_number.into(),
            call_id: None,
            caller_name: None,
            seed_duration: 0,
            events: None,
        }
    }

    pub fn with_call_id(mut self, call_id: impl Into<String>) -> Self {
        self.call_id = Some(call_id.into());
        self
    }

    pub fn with_caller_name(mut self, caller_name: Option<String>) -> Self {
        self.caller_name = caller_name;
        self
    }

    /// Seed value for `duration_seconds`, e.g. a backend-reported duration on
    /// an escalation row. The internal clock is authoritative afterwards.
    pub fn with_seed_duration(mut self, seconds: u64) -> Self {
        self.seed_duration = seconds;
        self
    }

    pub fn with_event_sender(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    pub fn build(self) -> Result<CallSession, SessionError> {
        let phone_number = self.phone_number.trim().to_string();
        if phone_number.is_empty() {
            return Err(SessionError::InvalidOrigination {
                reason: "phone number is required".to_string(),
            });
        }
        let call_id = self
            .call_id
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let events = self
            .events
            .unwrap_or_else(|| tokio::sync::broadcast::channel(64).0);
        let outgoing = self.mode == CallMode::Outgoing;
        let session = CallSession {
            inner: Arc::new(CallSessionInner {
                state: RwLock::new(CallSessionSnapshot {
                    call_id,
                    phone_number,
                    caller_name: self.caller_name,
                    mode: self.mode,
                    started_at: outgoing.then(Utc::now),
                    duration_seconds: self.seed_duration,
                    muted: false,
                    speaker_on: false,
                    visible: true,
                }),
                clock: Mutex::new(None),
                surface: Mutex::new(None),
                events,
            }),
        };
        if outgoing {
            // dial time counts toward the call duration
            session.start_clock();
        }
        Ok(session)
    }
}

impl CallSession {
    /// A session for an inbound call that is ringing at the operator.
    pub fn incoming(phone_number: impl Into<String>) -> CallSessionBuilder {
        CallSessionBuilder::new(CallMode::Incoming, phone_number)
    }

    /// A session for an operator-initiated callback. The clock starts
    /// dialing immediately; `connect` flips it to `Active`.
    pub fn outgoing(phone_number: impl Into<String>) -> CallSessionBuilder {
        CallSessionBuilder::new(CallMode::Outgoing, phone_number)
    }

    pub fn snapshot(&self) -> CallSessionSnapshot {
        self.inner.state.read().unwrap().clone()
    }

    pub fn call_id(&self) -> String {
        self.inner.state.read().unwrap().call_id.clone()
    }

    pub fn mode(&self) -> CallMode {
        self.inner.state.read().unwrap().mode
    }

    pub fn duration_seconds(&self) -> u64 {
        self.inner.state.read().unwrap().duration_seconds
    }

    pub fn is_clock_running(&self) -> bool {
        self.inner
            .clock
            .lock()
            .unwrap()
            .as_ref()
            .map(|clock| !clock.is_stopped())
            .unwrap_or(false)
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.inner.events.subscribe()
    }

    pub fn event_sender(&self) -> EventSender {
        self.inner.events.clone()
    }

    /// Claim exclusive rendering ownership of this session. Any previous
    /// binding is cancelled; the returned token stays live until the next
    /// attach or until the binding drops it.
    pub fn bind_surface(&self) -> CancellationToken {
        let mut slot = self.inner.surface.lock().unwrap();
        if let Some(previous) = slot.take() {
            previous.cancel();
        }
        let token = CancellationToken::new();
        *slot = Some(token.clone());
        token
    }

    /// Accept an incoming call: `Incoming -> Active`, clock starts.
    pub fn answer(&self) -> Result<(), SessionError> {
        let event = {
            let mut state = self.inner.state.write().unwrap();
            match state.mode {
                CallMode::Incoming => {
                    state.mode = CallMode::Active;
                    state.started_at = Some(Utc::now());
                    SessionEvent::ModeChanged {
                        call_id: state.call_id.clone(),
                        mode: state.mode,
                    }
                }
                mode => {
                    return Err(SessionError::IllegalTransition {
                        action: "answer",
                        mode,
                    })
                }
            }
        };
        self.start_clock();
        info!(call_id = %self.call_id(), "call answered");
        self.emit(event);
        Ok(())
    }

    /// Reject an incoming call without connecting.
    pub fn decline(&self) -> Result<(), SessionError> {
        self.terminate("decline", &[CallMode::Incoming])
    }

    /// Send an incoming call to voicemail.
    pub fn voicemail(&self) -> Result<(), SessionError> {
        self.terminate("voicemail", &[CallMode::Incoming])
    }

    /// The dialed party picked up: `Outgoing -> Active`. The dial clock keeps
    /// running; `started_at` is preserved when already set.
    pub fn connect(&self) -> Result<(), SessionError> {
        let event = {
            let mut state = self.inner.state.write().unwrap();
            match state.mode {
                CallMode::Outgoing => {
                    state.mode = CallMode::Active;
                    if state.started_at.is_none() {
                        state.started_at = Some(Utc::now());
                    }
                    SessionEvent::ModeChanged {
                        call_id: state.call_id.clone(),
                        mode: state.mode,
                    }
                }
                mode => {
                    return Err(SessionError::IllegalTransition {
                        action: "connect",
                        mode,
                    })
                }
            }
        };
        self.start_clock();
        self.emit(event);
        Ok(())
    }

    /// Hang up. Ending an already ended call is a no-op, not an error.
    pub fn end_call(&self) -> Result<(), SessionError> {
        if self.mode() == CallMode::Ended {
            return Ok(());
        }
        self.terminate("endCall", &[CallMode::Outgoing, CallMode::Active])
    }

    /// Collapse the full-screen view to the floating widget. The session and
    /// its clock keep running.
    pub fn minimize(&self) -> Result<(), SessionError> {
        let event = {
            let mut state = self.inner.state.write().unwrap();
            if state.mode != CallMode::Active {
                return Err(SessionError::IllegalTransition {
                    action: "minimize",
                    mode: state.mode,
                });
            }
            if !state.visible {
                return Ok(());
            }
            state.visible = false;
            SessionEvent::VisibilityChanged {
                call_id: state.call_id.clone(),
                visible: false,
            }
        };
        self.emit(event);
        Ok(())
    }

    /// Bring a minimized call back to the foreground. The remounting surface
    /// reads the current duration; nothing is reset.
    pub fn restore(&self) -> Result<(), SessionError> {
        let event = {
            let mut state = self.inner.state.write().unwrap();
            if state.mode != CallMode::Active {
                return Err(SessionError::IllegalTransition {
                    action: "restore",
                    mode: state.mode,
                });
            }
            if state.visible {
                return Ok(());
            }
            state.visible = true;
            SessionEvent::VisibilityChanged {
                call_id: state.call_id.clone(),
                visible: true,
            }
        };
        self.emit(event);
        Ok(())
    }

    pub fn toggle_mute(&self) -> Result<(), SessionError> {
        let event = {
            let mut state = self.inner.state.write().unwrap();
            if state.mode != CallMode::Active {
                return Err(SessionError::IllegalTransition {
                    action: "toggleMute",
                    mode: state.mode,
                });
            }
            state.muted = !state.muted;
            SessionEvent::MuteChanged {
                call_id: state.call_id.clone(),
                muted: state.muted,
            }
        };
        self.emit(event);
        Ok(())
    }

    pub fn toggle_speaker(&self) -> Result<(), SessionError> {
        let event = {
            let mut state = self.inner.state.write().unwrap();
            if state.mode != CallMode::Active {
                return Err(SessionError::IllegalTransition {
                    action: "toggleSpeaker",
                    mode: state.mode,
                });
            }
            state.speaker_on = !state.speaker_on;
            SessionEvent::SpeakerChanged {
                call_id: state.call_id.clone(),
                speaker_on: state.speaker_on,
            }
        };
        self.emit(event);
        Ok(())
    }

    /// Stop drawing the widget. The adapter-driven teardown step after
    /// `end_call`; unlike the user commands it is legal in every mode,
    /// including `Ended`.
    pub fn hide(&self) {
        let event = {
            let mut state = self.inner.state.write().unwrap();
            if !state.visible {
                return;
            }
            state.visible = false;
            SessionEvent::VisibilityChanged {
                call_id: state.call_id.clone(),
                visible: false,
            }
        };
        self.emit(event);
    }

    /// One elapsed second, delivered by the owned clock. Only outgoing and
    /// active calls accumulate duration; a tick racing a terminal transition
    /// is absorbed here.
    pub(crate) fn apply_tick(&self) {
        let event = {
            let mut state = self.inner.state.write().unwrap();
            match state.mode {
                CallMode::Outgoing | CallMode::Active => {
                    state.duration_seconds += 1;
                    Some(SessionEvent::DurationChanged {
                        call_id: state.call_id.clone(),
                        duration_seconds: state.duration_seconds,
                    })
                }
                _ => None,
            }
        };
        if let Some(event) = event {
            self.emit(event);
        }
    }

    fn start_clock(&self) {
        let mut slot = self.inner.clock.lock().unwrap();
        if slot.is_some() {
            return;
        }
        let clock = TimerClock::new();
        let weak = Arc::downgrade(&self.inner);
        clock.start(move || {
            if let Some(inner) = weak.upgrade() {
                CallSession { inner }.apply_tick();
            }
        });
        *slot = Some(clock);
    }

    fn stop_clock(&self) {
        if let Some(clock) = self.inner.clock.lock().unwrap().take() {
            clock.stop();
        }
    }

    fn terminate(&self, action: &'static str, allowed: &[CallMode]) -> Result<(), SessionError> {
        let mode = self.mode();
        if !allowed.contains(&mode) {
            return Err(SessionError::IllegalTransition { action, mode });
        }
        // the clock must be cancelled before the session reads Ended
        self.stop_clock();
        let event = {
            let mut state = self.inner.state.write().unwrap();
            state.mode = CallMode::Ended;
            SessionEvent::ModeChanged {
                call_id: state.call_id.clone(),
                mode: CallMode::Ended,
            }
        };
        info!(call_id = %self.call_id(), action, "call ended");
        self.emit(event);
        Ok(())
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.inner.events.send(event);
    }
}
