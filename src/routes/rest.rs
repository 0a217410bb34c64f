//! REST room endpoints — stateless posting and history dumps.
//!
//! DESIGN
//! ======
//! No session, no `Client`: `POST /rest/<room>` stamps server time on the
//! posted message and hands it straight to the room's fan-out; `GET`
//! serialises the room's recent-message buffer. Unknown rooms are 404 —
//! posting never creates a room.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use chrono::Local;
use serde::Deserialize;
use tracing::warn;

use crate::message::Message;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RestPost {
    pub name: String,
    pub text: String,
}

/// `GET /rest/{room}` — rendered recent messages.
pub async fn get_messages(
    State(state): State<AppState>,
    Path(room): Path<String>,
) -> Response {
    let Some(room) = state.rooms.find_room(&room) else {
        warn!(%room, "rest: room not found");
        return StatusCode::NOT_FOUND.into_response();
    };
    Json(room.recent_messages()).into_response()
}

/// `POST /rest/{room}` — append one message to the room.
pub async fn post_message(
    State(state): State<AppState>,
    Path(room): Path<String>,
    Json(post): Json<RestPost>,
) -> Response {
    let Some(room) = state.rooms.find_room(&room) else {
        warn!(%room, "rest: room not found");
        return StatusCode::NOT_FOUND.into_response();
    };

    let msg = Message::rest(post.name, post.text, Local::now());
    state.chatlog.log(&msg.to_string());
    room.send(msg).await;
    StatusCode::OK.into_response()
}

#[cfg(test)]
#[path = "rest_test.rs"]
mod tests;
