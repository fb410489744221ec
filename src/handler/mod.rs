use crate::app::AppState;
use crate::originate::OriginationSource;
use crate::session::{CallSession, SessionCommand, SessionError};
use crate::surface::{render, SurfaceBinding};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, Query, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::{debug, info, warn};


pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sessions", get(list_sessions))
        .route("/sessions/{id}", get(get_session))
        .route("/sessions/{id}/view", get(get_view))
        .route("/sessions/{id}/command", post(post_command))
        .route("/sessions/{id}/events", get(ws_events))
        .route("/originate", post(originate_call))
        .route("/incoming", post(incoming_call))
}

async fn list_sessions(State(state): State<AppState>) -> Response {
    let sessions = serde_json::json!({
        "uptime": state.uptime.to_rfc3339(),
        "sessions": state.registry.snapshots(),
    });
    Json(sessions).into_response()
}

async fn get_session(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.registry.get(&id) {
        Some(session) => Json(session.snapshot()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct ViewParams {
    minimized: Option<bool>,
}

async fn get_view(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<ViewParams>,
) -> Response {
    match state.registry.get(&id) {
        Some(session) => {
            let view = render(&session.snapshot(), params.minimized.unwrap_or(false));
            Json(view).into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn post_command(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(command): Json<SessionCommand>,
) -> Response {
    let session = match state.registry.get(&id) {
        Some(session) => session,
        None => return StatusCode::NOT_FOUND.into_response(),
    };
    // hangups go through the adapter so widget teardown and the return
    // navigation happen with them
    let result = match &command {
        SessionCommand::EndCall {} => state.adapter.finish(&id),
        other => other.apply(&session),
    };
    match result {
        Ok(()) => Json(session.snapshot()).into_response(),
        Err(err @ SessionError::IllegalTransition { .. }) => {
            debug!(call_id = id, %err, "command ignored");
            Json(session.snapshot()).into_response()
        }
        Err(err) => (StatusCode::BAD_REQUEST, err.to_string()).into_response(),
    }
}

async fn originate_call(
    State(state): State<AppState>,
    Json(source): Json<OriginationSource>,
) -> Response {
    match state.adapter.call_back(source) {
        Ok(session) => {
            info!(call_id = %session.call_id(), "originated callback");
            Json(session.snapshot()).into_response()
        }
        Err(err) => {
            warn!(%err, "origination refused");
            (StatusCode::UNPROCESSABLE_ENTITY, err.to_string()).into_response()
        }
    }
}

async fn incoming_call(
    State(state): State<AppState>,
    Json(source): Json<OriginationSource>,
) -> Response {
    match state.adapter.ring_in(source) {
        Ok(session) => {
            info!(call_id = %session.call_id(), "incoming call ringing");
            Json(session.snapshot()).into_response()
        }
        Err(err) => {
            warn!(%err, "incoming call refused");
            (StatusCode::UNPROCESSABLE_ENTITY, err.to_string()).into_response()
        }
    }
}

async fn ws_events(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    match state.registry.get(&id) {
        Some(session) => ws.on_upgrade(move |socket| handle_events(socket, state, session)),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Stream rendered views to one console client. The socket owns a surface
/// binding, so closing it only drops the rendering subscription; the session
/// and its clock keep running.
async fn handle_events(mut socket: WebSocket, state: AppState, session: CallSession) {
    let binding = SurfaceBinding::attach(session);
    let mut views = binding.views();
    let token = state.token.clone();

    let initial = match serde_json::to_string(&binding.view()) {
        Ok(text) => text,
        Err(_) => return,
    };
    if socket.send(Message::Text(initial.into())).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = views.borrow_and_update().clone();
                let text = match serde_json::to_string(&view) {
                    Ok(text) => text,
                    Err(_) => break,
                };
                if socket.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(_)) => {}
                    _ => break,
                }
            }
        }
    }
}
