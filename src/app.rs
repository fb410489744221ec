use crate::config::Config;
use crate::event::EventSender;
use crate::originate::{
    connect_signal_from_config, ConnectSignal, EventNavigator, Navigator, OriginationAdapter,
};
use crate::session::SessionRegistry;
use anyhow::Result;
use axum::Router;
use chrono::{DateTime, Utc};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::select;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::info;

pub struct AppStateInner {
    pub config: Arc<Config>,
    pub token: CancellationToken,
    pub registry: Arc<SessionRegistry>,
    pub events: EventSender,
    pub adapter: Arc<OriginationAdapter>,
    pub uptime: DateTime<Utc>,
}

pub type AppState = Arc<AppStateInner>;

pub struct AppBuilder {
    pub config: Option<Config>,
    pub connect: Option<Arc<dyn ConnectSignal>>,
    pub navigator: Option<Arc<dyn Navigator>>,
    pub token: Option<CancellationToken>,
}

impl AppBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            connect: None,
            navigator: None,
            token: None,
        }
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Override the connect-signal provider, e.g. with a recording double.
    pub fn with_connect_signal(mut self, connect: Arc<dyn ConnectSignal>) -> Self {
        self.connect = Some(connect);
        self
    }

    pub fn with_navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = Some(token);
        self
    }

    pub fn build(self) -> Result<AppState> {
        let config = Arc::new(self.config.unwrap_or_default());
        let token = self.token.unwrap_or_default();
        let console = config.console.clone().unwrap_or_default();
        let (events, _) = tokio::sync::broadcast::channel(console.event_buffer.max(16));
        let registry = Arc::new(SessionRegistry::new());
        let connect = self
            .connect
            .unwrap_or_else(|| connect_signal_from_config(config.connect.as_ref()));
        let navigator: Arc<dyn Navigator> = self
            .navigator
            .unwrap_or_else(|| Arc::new(EventNavigator::new(events.clone())));
        let adapter = Arc::new(OriginationAdapter::new(
            registry.clone(),
            connect,
            navigator,
            events.clone(),
            console,
        ));
        Ok(Arc::new(AppStateInner {
            config,
            token,
            registry,
            events,
            adapter,
            uptime: Utc::now(),
        }))
    }
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub async fn run(state: AppState) -> Result<()> {
    let token = state.token.clone();

    let app = create_router(state.clone());
    let addr: SocketAddr = state.config.http_addr.parse()?;
    let listener = match TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Failed to bind to {}: {}", addr, e);
            return Err(anyhow::anyhow!("Failed to bind to {}: {}", addr, e));
        }
    };

    let server = axum::serve(listener, app.into_make_service());

    select! {
        http_result = async move { server.await } => {
            match http_result {
                Ok(_) => info!("Server shut down gracefully"),
                Err(e) => {
                    tracing::error!("Server error: {}", e);
                    return Err(anyhow::anyhow!("Server error: {}", e));
                }
            }
        }
        _ = token.cancelled() => {
            info!("Application shutting down due to cancellation");
        }
    }
    token.cancel();
    Ok(())
}

fn create_router(state: AppState) -> Router {
    // CORS configuration to allow cross-origin requests from the console
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
            axum::http::header::ACCEPT,
            axum::http::header::ORIGIN,
        ]);

    let session_routes = crate::handler::router().with_state(state);

    Router::new().merge(session_routes).layer(cors)
}
