use crate::config::ConsoleConfig;
use crate::originate::{
    ConnectSignal, EscalationRow, FixedDelayConnect, MissedCallRow, Navigator, OriginationAdapter,
    OriginationSource,
};
use crate::session::{CallMode, SessionError, SessionRegistry};
use crate::surface::SurfaceLayout;
use anyhow::Result;
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct RecordingNavigator {
    routes: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            routes: Mutex::new(Vec::new()),
        })
    }

    fn routes(&self) -> Vec<String> {
        self.routes.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate_to(&self, route: &str) {
        self.routes.lock().unwrap().push(route.to_string());
    }
}

struct FailingConnect;

#[async_trait::async_trait]
impl ConnectSignal for FailingConnect {
    async fn connect(&self, _call_id: &str) -> Result<()> {
        anyhow::bail!("gateway unreachable")
    }
}

fn test_adapter(
    connect: Arc<dyn ConnectSignal>,
    navigator: Arc<RecordingNavigator>,
) -> (OriginationAdapter, Arc<SessionRegistry>) {
    let registry = Arc::new(SessionRegistry::new());
    let (events, _) = tokio::sync::broadcast::channel(64);
    let adapter = OriginationAdapter::new(
        registry.clone(),
        connect,
        navigator,
        events,
        ConsoleConfig::default(),
    );
    (adapter, registry)
}

fn source(phone: &str) -> OriginationSource {
    OriginationSource {
        id: "row-1".to_string(),
        phone_number: phone.to_string(),
        display_name: Some("Alice".to_string()),
        duration_seconds: None,
    }
}

#[tokio::test(start_paused = true)]
async fn test_scenario_e_blank_phone_refused() {
    let navigator = RecordingNavigator::new();
    let (adapter, registry) = test_adapter(Arc::new(FixedDelayConnect::default()), navigator);

    let result = adapter.call_back(source(""));
    assert!(matches!(
        result,
        Err(SessionError::InvalidOrigination { .. })
    ));
    // no session, no widget
    assert!(registry.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_call_back_connects_then_navigates_once() {
    let navigator = RecordingNavigator::new();
    let (adapter, _registry) = test_adapter(
        Arc::new(FixedDelayConnect::new(Duration::from_millis(50))),
        navigator.clone(),
    );

    let session = adapter.call_back(source("+256700123456")).unwrap();
    assert_eq!(session.mode(), CallMode::Outgoing);
    assert!(navigator.routes().is_empty());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(session.mode(), CallMode::Active);
    assert_eq!(
        navigator.routes(),
        vec![format!("/live-calls/{}", session.call_id())]
    );
}

#[tokio::test(start_paused = true)]
async fn test_failed_connect_ends_the_session() {
    let navigator = RecordingNavigator::new();
    let (adapter, _registry) = test_adapter(Arc::new(FailingConnect), navigator.clone());

    let session = adapter.call_back(source("+256700123456")).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(session.mode(), CallMode::Ended);
    assert!(navigator.routes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_hangup_while_dialing_skips_navigation() {
    let navigator = RecordingNavigator::new();
    let (adapter, _registry) = test_adapter(
        Arc::new(FixedDelayConnect::new(Duration::from_millis(50))),
        navigator.clone(),
    );

    let session = adapter.call_back(source("+256700123456")).unwrap();
    session.end_call().unwrap();

    // the connect signal arrives for a call that is already over
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(session.mode(), CallMode::Ended);
    assert!(navigator.routes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_finish_tears_down_and_navigates_once() {
    let navigator = RecordingNavigator::new();
    let (adapter, registry) = test_adapter(
        Arc::new(FixedDelayConnect::new(Duration::from_millis(10))),
        navigator.clone(),
    );

    let session = adapter.call_back(source("+256700123456")).unwrap();
    let call_id = session.call_id();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(session.mode(), CallMode::Active);

    adapter.finish(&call_id).unwrap();
    assert_eq!(session.mode(), CallMode::Ended);
    assert!(!session.snapshot().visible);
    assert!(registry.get(&call_id).is_none());

    // a second finish is harmless and stays silent
    adapter.finish(&call_id).unwrap();
    let routes = navigator.routes();
    assert_eq!(routes.len(), 2);
    assert_eq!(routes[1], "/missed-calls");
}

#[tokio::test(start_paused = true)]
async fn test_ring_in_creates_incoming_session() {
    let navigator = RecordingNavigator::new();
    let (adapter, registry) = test_adapter(Arc::new(FixedDelayConnect::default()), navigator);

    let session = adapter.ring_in(source("+256700123456")).unwrap();
    assert_eq!(session.mode(), CallMode::Incoming);
    assert!(!session.is_clock_running());
    assert!(registry.get(&session.call_id()).is_some());
}

#[tokio::test(start_paused = true)]
async fn test_mounted_widget_renders_dialing() {
    let navigator = RecordingNavigator::new();
    let (adapter, _registry) = test_adapter(
        Arc::new(FixedDelayConnect::new(Duration::from_millis(50))),
        navigator,
    );

    let session = adapter.call_back(source("+256700123456")).unwrap();
    let view = adapter.surface_view(&session.call_id()).unwrap();
    assert_eq!(view.layout, SurfaceLayout::FloatingWidget);
    assert_eq!(view.title, "Alice");
}

#[tokio::test(start_paused = true)]
async fn test_escalation_row_seeds_duration() {
    let navigator = RecordingNavigator::new();
    let (adapter, _registry) = test_adapter(
        Arc::new(FixedDelayConnect::new(Duration::from_millis(50))),
        navigator,
    );

    let row = EscalationRow {
        id: "esc-7".to_string(),
        phone_number: "+256700999888".to_string(),
        agent_name: Some("Bob".to_string()),
        duration_seconds: Some(120),
        escalated_at: None,
    };
    let session = adapter.call_back(row.into()).unwrap();
    assert_eq!(session.duration_seconds(), 120);
}

#[test]
fn test_missed_call_row_maps_to_source() {
    let row = MissedCallRow {
        id: "mc-3".to_string(),
        caller_id: "+256700111222".to_string(),
        caller_name: None,
        missed_at: None,
    };
    let source: OriginationSource = row.into();
    assert_eq!(source.phone_number, "+256700111222");
    assert!(source.display_name.is_none());
    assert!(source.duration_seconds.is_none());
}
