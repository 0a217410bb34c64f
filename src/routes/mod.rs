//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! Binds the HTTP surface: login/register, the session-backed command
//! dispatch with message polling, the stateless REST room endpoints, and
//! WebSocket elevation for any request carrying upgrade headers. CORS is
//! configured once with the deployment origin and exposes the `Success`
//! and `Code` result headers to browsers.

pub mod auth;
pub mod commands;
pub mod rest;
pub mod ws;

use std::time::Duration;

use axum::Router;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{any, get, post};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};

use crate::client;
use crate::client::codes;
use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.origin);

    Router::new()
        .route("/login", post(auth::login))
        .route("/register", any(auth::register))
        .route("/messages", get(commands::messages))
        .route("/rest/{room}", get(rest::get_messages).post(rest::post_message))
        .fallback(commands::dispatch)
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            HeaderName::from_static("data"),
        ])
        .expose_headers([
            HeaderName::from_static("success"),
            HeaderName::from_static("code"),
        ])
        .max_age(Duration::from_secs(1_728_000));

    if origin == "*" {
        cors.allow_origin(Any)
    } else {
        let origin = origin
            .parse::<HeaderValue>()
            .expect("ORIGIN is not a valid header value");
        cors.allow_origin(origin)
    }
}

// =============================================================================
// RESULT RENDERING
// =============================================================================

/// `Success`/`Code` result headers attached to every command response.
pub(crate) fn result_headers(success: bool, code: u16) -> [(HeaderName, String); 2] {
    [
        (HeaderName::from_static("success"), success.to_string()),
        (HeaderName::from_static("code"), code.to_string()),
    ]
}

/// Structured command-response envelope.
#[derive(Serialize)]
struct CommandBody {
    #[serde(rename = "Data")]
    data: serde_json::Value,
    #[serde(rename = "String")]
    string: String,
}

/// Map a semantic result code onto the HTTP status line.
pub(crate) fn code_status(code: u16) -> StatusCode {
    match code {
        codes::INVALID_COMMAND => StatusCode::NOT_FOUND,
        codes::UNSUPPORTED_METHOD => StatusCode::METHOD_NOT_ALLOWED,
        codes::SERVER_ERROR => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::OK,
    }
}

/// Render a command `Response` for the HTTP wire: result headers, status
/// mapping, and either the structured payload or just the pretty string
/// (`Data: simple` requests, and every failure).
pub(crate) fn command_response(resp: &client::Response, simple: bool) -> Response {
    let headers = result_headers(resp.success, resp.code);
    let status = code_status(resp.code);
    if status != StatusCode::OK {
        // Method rejections name the allowed method, carried in the data slot.
        if resp.code == codes::UNSUPPORTED_METHOD {
            let allow = resp
                .data
                .as_ref()
                .and_then(|d| d.as_str())
                .unwrap_or("POST")
                .to_owned();
            return (status, headers, [(HeaderName::from_static("allow"), allow)]).into_response();
        }
        return (status, headers).into_response();
    }

    if simple || !resp.success {
        return (status, headers, Json(resp.message.clone())).into_response();
    }

    let body = CommandBody {
        data: resp.data.clone().unwrap_or(serde_json::Value::Null),
        string: resp.message.clone(),
    };
    (status, headers, Json(body)).into_response()
}

/// 401 challenge for requests without a live session token.
pub(crate) fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(HeaderName::from_static("www-authenticate"), "token")],
    )
        .into_response()
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
