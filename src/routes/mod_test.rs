use axum::body::to_bytes;

use super::*;
use crate::client::Response as CommandResult;

async fn body_string(resp: Response) -> String {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn header<'a>(resp: &'a Response, name: &str) -> &'a str {
    resp.headers().get(name).unwrap().to_str().unwrap()
}

#[test]
fn code_status_mapping() {
    assert_eq!(code_status(codes::OK), StatusCode::OK);
    assert_eq!(code_status(codes::NOT_IN_ROOM), StatusCode::OK);
    assert_eq!(code_status(codes::INVALID_COMMAND), StatusCode::NOT_FOUND);
    assert_eq!(code_status(codes::UNSUPPORTED_METHOD), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(code_status(codes::SERVER_ERROR), StatusCode::INTERNAL_SERVER_ERROR);
}

#[test]
fn result_headers_render_flag_and_code() {
    let [(success_name, success), (code_name, code)] = result_headers(true, 42);
    assert_eq!(success_name.as_str(), "success");
    assert_eq!(success, "true");
    assert_eq!(code_name.as_str(), "code");
    assert_eq!(code, "42");
}

#[tokio::test]
async fn structured_body_carries_data_and_string() {
    let resp = CommandResult::ok_with("Rooms:\r\nLobby", vec!["Lobby"]);
    let rendered = command_response(&resp, false);

    assert_eq!(rendered.status(), StatusCode::OK);
    assert_eq!(header(&rendered, "success"), "true");
    assert_eq!(header(&rendered, "code"), "0");

    let body: serde_json::Value = serde_json::from_str(&body_string(rendered).await).unwrap();
    assert_eq!(body["Data"], serde_json::json!(["Lobby"]));
    assert_eq!(body["String"], "Rooms:\r\nLobby");
}

#[tokio::test]
async fn simple_requests_get_just_the_string() {
    let resp = CommandResult::ok_with("Rooms:\r\nLobby", vec!["Lobby"]);
    let rendered = command_response(&resp, true);

    let body: serde_json::Value = serde_json::from_str(&body_string(rendered).await).unwrap();
    assert_eq!(body, serde_json::json!("Rooms:\r\nLobby"));
}

#[tokio::test]
async fn failures_get_just_the_string() {
    let resp = CommandResult::fail(codes::NOT_IN_ROOM, "You are not in a room.");
    let rendered = command_response(&resp, false);

    assert_eq!(rendered.status(), StatusCode::OK);
    assert_eq!(header(&rendered, "success"), "false");
    assert_eq!(header(&rendered, "code"), "40");

    let body: serde_json::Value = serde_json::from_str(&body_string(rendered).await).unwrap();
    assert_eq!(body, serde_json::json!("You are not in a room."));
}

#[tokio::test]
async fn invalid_command_maps_to_404_with_no_body() {
    let resp = CommandResult::fail(codes::INVALID_COMMAND, "Invalid Command");
    let rendered = command_response(&resp, false);

    assert_eq!(rendered.status(), StatusCode::NOT_FOUND);
    assert_eq!(header(&rendered, "code"), "70");
    assert!(body_string(rendered).await.is_empty());
}

#[tokio::test]
async fn unsupported_method_carries_allow_header() {
    let mut resp = CommandResult::fail(codes::UNSUPPORTED_METHOD, "Unsupported Method: Use POST.");
    resp.data = Some(serde_json::json!("POST"));
    let rendered = command_response(&resp, false);

    assert_eq!(rendered.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(header(&rendered, "code"), "60");
    assert_eq!(header(&rendered, "allow"), "POST");
    assert!(body_string(rendered).await.is_empty());
}

#[test]
fn unauthorized_carries_challenge() {
    let resp = unauthorized();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(header(&resp, "www-authenticate"), "token");
}
