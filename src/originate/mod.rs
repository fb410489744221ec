use crate::config::{ConnectConfig, ConsoleConfig};
use crate::event::{EventSender, SessionEvent};
use crate::session::{CallMode, CallSession, SessionError, SessionRegistry};
use crate::surface::{SurfaceBinding, SurfaceView};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

#[cfg(test)]
mod tests;

/// Minimal identity a list row must expose to start a call from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginationSource {
    pub id: String,
    pub phone_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Backend-reported duration, only ever used to seed the session
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u64>,
}

/// Row of the missed-calls list.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissedCallRow {
    pub id: String,
    pub caller_id: String,
    pub caller_name: Option<String>,
    pub missed_at: Option<DateTime<Utc>>,
}

impl From<MissedCallRow> for OriginationSource {
    fn from(row: MissedCallRow) -> Self {
        Self {
            id: row.id,
            phone_number: row.caller_id,
            display_name: row.caller_name,
            duration_seconds: None,
        }
    }
}

/// Row of the escalations list. Escalations carry the duration the backend
/// has already attributed to the interaction.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscalationRow {
    pub id: String,
    pub phone_number: String,
    pub agent_name: Option<String>,
    pub duration_seconds: Option<u64>,
    pub escalated_at: Option<DateTime<Utc>>,
}

impl From<EscalationRow> for OriginationSource {
    fn from(row: EscalationRow) -> Self {
        Self {
            id: row.id,
            phone_number: row.phone_number,
            display_name: row.agent_name,
            duration_seconds: row.duration_seconds,
        }
    }
}

/// Telephony-side confirmation that a dialed call was picked up. The real
/// provider lives outside this engine; the default stands in with a fixed
/// short delay.
#[async_trait]
pub trait ConnectSignal: Send + Sync {
    async fn connect(&self, call_id: &str) -> Result<()>;
}

/// Stub provider: resolves after a fixed delay.
pub struct FixedDelayConnect {
    delay: Duration,
}

impl FixedDelayConnect {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for FixedDelayConnect {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(1500),
        }
    }
}

#[async_trait]
impl ConnectSignal for FixedDelayConnect {
    async fn connect(&self, _call_id: &str) -> Result<()> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}

/// Provider backed by a telephony gateway webhook.
pub struct WebhookConnect {
    url: String,
    method: Option<String>,
    headers: Option<HashMap<String, String>>,
    client: reqwest::Client,
}

impl WebhookConnect {
    pub fn new(
        url: String,
        method: Option<String>,
        headers: Option<HashMap<String, String>>,
    ) -> Self {
        Self {
            url,
            method,
            headers,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ConnectSignal for WebhookConnect {
    async fn connect(&self, call_id: &str) -> Result<()> {
        let method = self.method.as_deref().unwrap_or("POST");
        let mut request = self
            .client
            .request(reqwest::Method::from_bytes(method.as_bytes())?, &self.url);
        if let Some(headers) = &self.headers {
            for (key, value) in headers {
                request = request.header(key, value);
            }
        }
        let payload = json!({
            "callId": call_id,
            "event": "connect",
            "requestedAt": Utc::now().to_rfc3339(),
        });
        let response = request.json(&payload).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("connect webhook returned {}", response.status());
        }
        Ok(())
    }
}

pub fn connect_signal_from_config(config: Option<&ConnectConfig>) -> Arc<dyn ConnectSignal> {
    match config {
        None => Arc::new(FixedDelayConnect::default()),
        Some(ConnectConfig::Delay { ms }) => {
            Arc::new(FixedDelayConnect::new(Duration::from_millis(*ms)))
        }
        Some(ConnectConfig::Webhook {
            url,
            method,
            headers,
        }) => Arc::new(WebhookConnect::new(
            url.clone(),
            method.clone(),
            headers.clone(),
        )),
    }
}

/// Route changes the adapter requests from the console.
pub trait Navigator: Send + Sync {
    fn navigate_to(&self, route: &str);
}

/// Default navigator: pushes a `Navigate` event onto the console event bus.
pub struct EventNavigator {
    events: EventSender,
}

impl EventNavigator {
    pub fn new(events: EventSender) -> Self {
        Self { events }
    }
}

impl Navigator for EventNavigator {
    fn navigate_to(&self, route: &str) {
        let _ = self.events.send(SessionEvent::Navigate {
            route: route.to_string(),
        });
    }
}

/// Binds list rows to call sessions: mints the session, mounts its surface,
/// drives the connect-then-navigate flow, and tears the widget down again.
pub struct OriginationAdapter {
    registry: Arc<SessionRegistry>,
    connect: Arc<dyn ConnectSignal>,
    navigator: Arc<dyn Navigator>,
    events: EventSender,
    console: ConsoleConfig,
    bindings: Mutex<HashMap<String, SurfaceBinding>>,
}

impl OriginationAdapter {
    pub fn new(
        registry: Arc<SessionRegistry>,
        connect: Arc<dyn ConnectSignal>,
        navigator: Arc<dyn Navigator>,
        events: EventSender,
        console: ConsoleConfig,
    ) -> Self {
        Self {
            registry,
            connect,
            navigator,
            events,
            console,
            bindings: Mutex::new(HashMap::new()),
        }
    }

    /// "Call back" on a list row: mint an `Outgoing` session, mount its
    /// widget, and kick off the connect flow. A blank phone number is refused
    /// before any session exists, so no widget ever opens with an empty
    /// identity.
    pub fn call_back(&self, source: OriginationSource) -> Result<CallSession, SessionError> {
        let session = CallSession::outgoing(source.phone_number)
            .with_caller_name(source.display_name)
            .with_seed_duration(source.duration_seconds.unwrap_or(0))
            .with_event_sender(self.events.clone())
            .build()?;
        self.registry.insert(session.clone());
        self.mount(session.clone());
        self.spawn_connect(session.clone());
        Ok(session)
    }

    /// A live inbound call: mint an `Incoming` session and mount the ringing
    /// prompt. No clock runs until the operator answers.
    pub fn ring_in(&self, source: OriginationSource) -> Result<CallSession, SessionError> {
        let session = CallSession::incoming(source.phone_number)
            .with_caller_name(source.display_name)
            .with_event_sender(self.events.clone())
            .build()?;
        self.registry.insert(session.clone());
        self.mount(session.clone());
        Ok(session)
    }

    /// Hang up and tear down the widget. Navigation back to the list fires
    /// only when this call actually ended the session, so a repeated finish
    /// stays silent.
    pub fn finish(&self, call_id: &str) -> Result<(), SessionError> {
        let session = match self.registry.get(call_id) {
            Some(session) => session,
            None => return Ok(()),
        };
        let was_live = session.mode() != CallMode::Ended;
        session.end_call()?;
        session.hide();
        self.bindings.lock().unwrap().remove(call_id);
        if was_live {
            self.navigator.navigate_to(&self.console.return_route);
        }
        self.registry.reap_ended();
        Ok(())
    }

    pub fn surface_view(&self, call_id: &str) -> Option<SurfaceView> {
        self.bindings
            .lock()
            .unwrap()
            .get(call_id)
            .map(|binding| binding.view())
    }

    fn mount(&self, session: CallSession) {
        let binding = SurfaceBinding::attach(session);
        let call_id = binding.session().call_id();
        self.bindings.lock().unwrap().insert(call_id, binding);
    }

    fn spawn_connect(&self, session: CallSession) {
        let connect = self.connect.clone();
        let navigator = self.navigator.clone();
        let call_id = session.call_id();
        let route = format!(
            "{}/{}",
            self.console.live_call_route.trim_end_matches('/'),
            call_id
        );
        tokio::spawn(async move {
            match connect.connect(&call_id).await {
                Ok(()) => match session.connect() {
                    // navigation fires exactly once, on the successful connect
                    Ok(()) => navigator.navigate_to(&route),
                    Err(err) => {
                        // operator hung up while the call was still dialing
                        debug!(call_id, %err, "connect arrived for a finished session");
                    }
                },
                Err(err) => {
                    warn!(call_id, %err, "connect signal failed, ending call");
                    let _ = session.end_call();
                }
            }
        });
    }
}
