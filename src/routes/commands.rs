//! Session-backed command surface: message polling and command dispatch.
//!
//! DESIGN
//! ======
//! Every request here carries an `Authorization: <token>` header. Resolving
//! the session resets its idle deadline before anything else happens.
//! `GET /messages` drains the outbox; any other path is a command whose
//! name is the first path segment and whose arguments arrive as a JSON
//! array body. Requests with WebSocket upgrade headers are elevated
//! instead, before any token check — sockets authenticate in-band.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::{State, WebSocketUpgrade};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Json, Response};
use tracing::warn;

use super::{command_response, result_headers, unauthorized, ws};
use crate::client::codes;
use crate::session::Session;
use crate::state::AppState;

/// Resolve the request's session and reset its idle deadline.
pub(crate) async fn resolve_session(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Arc<Session>, Response> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if token.is_empty() {
        return Err(unauthorized());
    }
    match state.sessions.get(token).await {
        Some(session) => {
            session.reset_timeout();
            Ok(session)
        }
        None => Err(unauthorized()),
    }
}

/// `GET /messages` — drain the session outbox as a JSON array.
pub async fn messages(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let session = match resolve_session(&state, &headers).await {
        Ok(session) => session,
        Err(resp) => return resp,
    };
    let pending = session.drain_outbox();
    (
        StatusCode::OK,
        result_headers(true, codes::OK),
        Json(pending),
    )
        .into_response()
}

/// Fallback: WebSocket elevation, then command dispatch by path segment.
/// Commands only travel as POST; anything else is 405 with code 60.
pub async fn dispatch(
    State(state): State<AppState>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Ok(upgrade) = upgrade {
        return ws::upgrade(upgrade, state);
    }

    let session = match resolve_session(&state, &headers).await {
        Ok(session) => session,
        Err(resp) => return resp,
    };

    if method != Method::POST {
        let mut resp = crate::client::Response::fail(
            codes::UNSUPPORTED_METHOD,
            "Unsupported Method: Use POST.",
        );
        resp.data = Some(serde_json::Value::String("POST".to_owned()));
        return command_response(&resp, false);
    }

    let Some(command_name) = uri.path().split('/').find(|s| !s.is_empty()) else {
        return StatusCode::OK.into_response();
    };

    // A missing or malformed body just means no arguments.
    let args: Vec<String> = serde_json::from_slice(&body).unwrap_or_default();
    let mut command = vec![command_name.to_owned()];
    command.extend(args);

    let Some(client) = session.client() else {
        warn!("session without client");
        return (StatusCode::INTERNAL_SERVER_ERROR, result_headers(false, codes::SERVER_ERROR))
            .into_response();
    };

    let resp = client.execute(&command).await;
    let simple = headers
        .get("data")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("simple"));
    command_response(&resp, simple)
}

#[cfg(test)]
#[path = "commands_test.rs"]
mod tests;
