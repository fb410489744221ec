use crate::event::SessionEvent;
use crate::session::{CallMode, CallSession, CallSessionSnapshot, SessionCommand};
use serde::Serialize;
use tokio::sync::{broadcast::error::RecvError, watch};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Which of the three visual layouts the console should draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceLayout {
    /// Ringing prompt for an inbound call
    IncomingPrompt,
    /// Floating overlay: dialing, minimized, or just-ended calls
    FloatingWidget,
    /// Full-screen live-call view
    FullScreen,
}

/// A control the current layout offers to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceControl {
    Answer,
    Decline,
    Voicemail,
    EndCall,
    Mute,
    Unmute,
    SpeakerOn,
    SpeakerOff,
    Minimize,
    Restore,
}

/// Pure projection of a session the console renders verbatim.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceView {
    pub call_id: String,
    pub layout: SurfaceLayout,
    pub title: String,
    pub status_line: String,
    pub duration_text: String,
    pub controls: Vec<SurfaceControl>,
}

/// `mm:ss` with zero-padded fields; minutes are unbounded past the hour
/// (`125:07`), never wrapped.
pub fn format_duration(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Project a session snapshot into a view. Pure: the layout is chosen solely
/// by `mode` and the `minimized` flag, and the controls are exactly the
/// commands legal in that mode.
pub fn render(snapshot: &CallSessionSnapshot, minimized: bool) -> SurfaceView {
    let title = snapshot
        .caller_name
        .clone()
        .unwrap_or_else(|| snapshot.phone_number.clone());
    let (layout, status_line, controls) = match snapshot.mode {
        CallMode::Incoming => (
            SurfaceLayout::IncomingPrompt,
            format!("Incoming call from {}", snapshot.phone_number),
            vec![
                SurfaceControl::Answer,
                SurfaceControl::Decline,
                SurfaceControl::Voicemail,
            ],
        ),
        CallMode::Outgoing => (
            SurfaceLayout::FloatingWidget,
            format!("Dialing {}", snapshot.phone_number),
            vec![SurfaceControl::EndCall],
        ),
        CallMode::Active => {
            let mut controls = vec![SurfaceControl::EndCall];
            controls.push(if snapshot.muted {
                SurfaceControl::Unmute
            } else {
                SurfaceControl::Mute
            });
            controls.push(if snapshot.speaker_on {
                SurfaceControl::SpeakerOff
            } else {
                SurfaceControl::SpeakerOn
            });
            if minimized {
                controls.push(SurfaceControl::Restore);
                (SurfaceLayout::FloatingWidget, "On call".to_string(), controls)
            } else {
                controls.push(SurfaceControl::Minimize);
                (SurfaceLayout::FullScreen, "On call".to_string(), controls)
            }
        }
        CallMode::Ended => (
            SurfaceLayout::FloatingWidget,
            "Call ended".to_string(),
            Vec::new(),
        ),
    };
    SurfaceView {
        call_id: snapshot.call_id.clone(),
        layout,
        title,
        status_line,
        duration_text: format_duration(snapshot.duration_seconds),
        controls,
    }
}

/// Rendering subscription for one session.
///
/// Attaching claims exclusive ownership of the session's rendering (a
/// previous binding is cancelled) and republishes a freshly rendered view on
/// every session event. Dropping a binding only ends the subscription; the
/// session and its clock are untouched, which is what keeps a minimized call
/// counting in the background.
pub struct SurfaceBinding {
    session: CallSession,
    token: CancellationToken,
    views: watch::Receiver<SurfaceView>,
}

impl SurfaceBinding {
    pub fn attach(session: CallSession) -> Self {
        let token = session.bind_surface();
        let snapshot = session.snapshot();
        let (view_tx, views) = watch::channel(render(&snapshot, !snapshot.visible));
        let mut events = session.subscribe();
        let call_id = snapshot.call_id.clone();
        let reader = session.clone();
        let loop_token = token.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = loop_token.cancelled() => break,
                    event = events.recv() => {
                        match event {
                            Ok(event) => {
                                if event.call_id().map(|id| id != call_id).unwrap_or(true) {
                                    continue;
                                }
                            }
                            Err(RecvError::Lagged(missed)) => {
                                debug!(call_id, missed, "surface binding lagged, resyncing");
                            }
                            Err(RecvError::Closed) => break,
                        }
                        let snapshot = reader.snapshot();
                        if view_tx.send(render(&snapshot, !snapshot.visible)).is_err() {
                            break;
                        }
                    }
                }
            }
        });
        Self {
            session,
            token,
            views,
        }
    }

    /// Issue an operator command. Illegal transitions are absorbed here with
    /// a debug log; they never reach the operator as errors.
    pub fn command(&self, command: &SessionCommand) {
        if let Err(err) = command.apply(&self.session) {
            debug!(call_id = %self.session.call_id(), %err, "command ignored");
        }
    }

    pub fn view(&self) -> SurfaceView {
        self.views.borrow().clone()
    }

    /// Watch side of the rendered views, for streaming to a console client.
    pub fn views(&self) -> watch::Receiver<SurfaceView> {
        self.views.clone()
    }

    pub fn session(&self) -> &CallSession {
        &self.session
    }

    pub fn is_attached(&self) -> bool {
        !self.token.is_cancelled()
    }

    /// Unmount. Equivalent to dropping the binding.
    pub fn detach(self) {}
}

impl Drop for SurfaceBinding {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::CallSession;
    use std::time::Duration;

    fn active_session() -> CallSession {
        let session = CallSession::incoming("+256700123456")
            .with_call_id("surface-test")
            .with_caller_name(Some("Jane Doe".to_string()))
            .build()
            .unwrap();
        session.answer().unwrap();
        session
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "00:00");
        assert_eq!(format_duration(5), "00:05");
        assert_eq!(format_duration(65), "01:05");
        assert_eq!(format_duration(600), "10:00");
        // minutes run past the hour unbounded
        assert_eq!(format_duration(125 * 60 + 7), "125:07");
    }

    #[test]
    fn test_render_incoming_prompt() {
        let session = CallSession::incoming("+256700123456")
            .with_caller_name(Some("Jane Doe".to_string()))
            .build()
            .unwrap();
        let view = render(&session.snapshot(), false);
        assert_eq!(view.layout, SurfaceLayout::IncomingPrompt);
        assert_eq!(view.title, "Jane Doe");
        assert_eq!(
            view.controls,
            vec![
                SurfaceControl::Answer,
                SurfaceControl::Decline,
                SurfaceControl::Voicemail
            ]
        );
        assert_eq!(view.duration_text, "00:00");
    }

    #[tokio::test(start_paused = true)]
    async fn test_render_active_layouts() {
        let session = active_session();
        let full = render(&session.snapshot(), false);
        assert_eq!(full.layout, SurfaceLayout::FullScreen);
        assert!(full.controls.contains(&SurfaceControl::Minimize));
        assert!(full.controls.contains(&SurfaceControl::Mute));

        let floating = render(&session.snapshot(), true);
        assert_eq!(floating.layout, SurfaceLayout::FloatingWidget);
        assert!(floating.controls.contains(&SurfaceControl::Restore));

        session.toggle_mute().unwrap();
        let muted = render(&session.snapshot(), false);
        assert!(muted.controls.contains(&SurfaceControl::Unmute));
    }

    #[tokio::test(start_paused = true)]
    async fn test_render_ended_has_no_controls() {
        let session = active_session();
        session.end_call().unwrap();
        let view = render(&session.snapshot(), false);
        assert_eq!(view.layout, SurfaceLayout::FloatingWidget);
        assert!(view.controls.is_empty());
        assert_eq!(view.status_line, "Call ended");
    }

    #[tokio::test(start_paused = true)]
    async fn test_binding_rerenders_on_events() {
        let session = active_session();
        let binding = SurfaceBinding::attach(session.clone());
        let mut views = binding.views();

        session.toggle_mute().unwrap();
        tokio::time::timeout(Duration::from_secs(1), views.changed())
            .await
            .expect("view update")
            .unwrap();
        assert!(views.borrow().controls.contains(&SurfaceControl::Unmute));
    }

    #[tokio::test(start_paused = true)]
    async fn test_attach_is_exclusive() {
        let session = active_session();
        let first = SurfaceBinding::attach(session.clone());
        assert!(first.is_attached());
        let second = SurfaceBinding::attach(session.clone());
        assert!(!first.is_attached());
        assert!(second.is_attached());
    }

    #[tokio::test(start_paused = true)]
    async fn test_detach_keeps_clock_running() {
        let session = active_session();
        let binding = SurfaceBinding::attach(session.clone());
        binding.detach();
        assert!(session.is_clock_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_binding_absorbs_illegal_commands() {
        let session = CallSession::incoming("+256700123456").build().unwrap();
        let binding = SurfaceBinding::attach(session.clone());
        // muting a ringing call is nonsense and must change nothing
        binding.command(&SessionCommand::ToggleMute {});
        assert_eq!(session.mode(), CallMode::Incoming);
        assert!(!session.snapshot().muted);
    }
}
