use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::response::Response;
use serde::Deserialize;
use uuid::Uuid;

use crate::backend::error::{BackendError, BackendResult};
use crate::backend::gateway::actor::run_connection;
use crate::backend::gateway::session::SessionKind;
use crate::backend::server::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

/// `GET /api/messages?userId=<id>` - upgrade to a user session
pub async fn messages_socket(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
    ws: WebSocketUpgrade,
) -> BackendResult<Response> {
    let raw = query
        .user_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| BackendError::validation("userId query parameter is required"))?;
    let user_id = Uuid::parse_str(raw.trim())
        .map_err(|_| BackendError::validation(format!("userId {} is not a valid id", raw)))?;

    if state.store.find_user(user_id).await?.is_none() {
        return Err(BackendError::not_found(format!("user {} does not exist", user_id)));
    }

    tracing::debug!(user_id = %user_id, "[Gateway] Upgrading user session");
    Ok(ws.on_upgrade(move |socket| run_connection(socket, state, SessionKind::User(user_id))))
}

/// `GET /api/statuses` - upgrade to a watch-only presence connection
pub async fn statuses_socket(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_connection(socket, state, SessionKind::Watcher))
}
