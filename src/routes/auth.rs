//! Auth routes — login and registration.
//!
//! DESIGN
//! ======
//! Both endpoints take a two-element JSON array `["name", "password"]`.
//! Login mints a session token (the response body) after enforcing the
//! single-session rule; registration creates the account and surfaces
//! semantic failures through the `Code` header.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderName, Method, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use tracing::{error, info};

use super::result_headers;
use crate::client::{Client, Connection, codes};
use crate::data::{DataError, validate_name};
use crate::session::Session;
use crate::state::AppState;

fn failure(code: u16, message: &str) -> Response {
    (StatusCode::OK, result_headers(false, code), Json(message.to_owned())).into_response()
}

fn server_error() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, result_headers(false, codes::SERVER_ERROR)).into_response()
}

/// `POST /login` — authenticate and mint a session token.
pub async fn login(State(state): State<AppState>, Json(body): Json<Vec<String>>) -> Response {
    let name = body.first().cloned().unwrap_or_default();
    let password = body.get(1).cloned().unwrap_or_default();

    if !validate_name(&name) {
        return failure(
            codes::INVALID_NAME,
            "Invalid name.  Name can only contain alpha numeric characters",
        );
    }

    let data = state.data.create(&name);
    match data.authenticate(&password).await {
        Ok(true) => {}
        Ok(false) => return failure(codes::AUTH_FAILED, "User name and password don't match."),
        Err(e) => {
            error!(error = %e, "login authentication failed");
            return server_error();
        }
    }

    // One active session per account.
    if state.rooms.get_client(&name).is_some() {
        return failure(codes::AUTH_FAILED, "That user is already logged in.");
    }

    let session = Session::start(state.sessions.clone());
    let client = Client::new(
        &name,
        Arc::clone(&state.rooms),
        state.chatlog.clone(),
        data,
        Arc::clone(&session) as Arc<dyn Connection>,
    )
    .await;
    session.attach_client(client);

    if !state.sessions.add(Arc::clone(&session)).await {
        // A token collision would be astronomical; treat it as server error.
        session.close().await;
        return server_error();
    }

    info!(client = %name, "http login");
    let token = session.token().to_owned();
    (StatusCode::OK, result_headers(true, codes::OK), Json(token)).into_response()
}

/// `POST /register` — create an account. Other methods get 405 with code 60.
pub async fn register(State(state): State<AppState>, method: Method, body: Bytes) -> Response {
    if method != Method::POST {
        return (
            StatusCode::METHOD_NOT_ALLOWED,
            result_headers(false, codes::UNSUPPORTED_METHOD),
            [(HeaderName::from_static("allow"), "POST")],
            Json("Unsupported Method: Use POST to register.".to_owned()),
        )
            .into_response();
    }

    // A malformed body just reads as missing arguments.
    let args: Vec<String> = serde_json::from_slice(&body).unwrap_or_default();
    let name = args.first().cloned().unwrap_or_default();
    let password = args.get(1).cloned().unwrap_or_default();

    if !validate_name(&name) {
        return failure(
            codes::INVALID_NAME,
            "Invalid name.  Name can only contain alpha numeric characters",
        );
    }

    let data = state.data.create(&name);
    match data.new_client(&password).await {
        Ok(()) => {
            info!(client = %name, "account registered");
            (StatusCode::OK, result_headers(true, codes::OK)).into_response()
        }
        Err(DataError::ClientExists) => {
            failure(codes::CLIENT_EXISTS, "A client with that name already exists.")
        }
        // Advisory failure: not the caller's fault, no error code.
        Err(DataError::AccountCreationDisabled) => {
            failure(codes::OK, "Account creation has been disabled.")
        }
        Err(e) => {
            error!(error = %e, "registration failed");
            server_error()
        }
    }
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
