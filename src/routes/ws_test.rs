use super::*;
use crate::client::Response as CommandResult;
use crate::state::test_helpers::{register, test_app_state};

// =============================================================================
// Frame shapes
// =============================================================================

#[test]
fn command_frame_deserializes_pascal_case() {
    let cmd: WsCommand =
        serde_json::from_str(r#"{"Command":"join","Args":["R"]}"#).unwrap();
    assert_eq!(cmd.command, "join");
    assert_eq!(cmd.args, vec!["R"]);
}

#[test]
fn command_frame_defaults_missing_fields() {
    let cmd: WsCommand = serde_json::from_str(r#"{"Command":"list"}"#).unwrap();
    assert_eq!(cmd.command, "list");
    assert!(cmd.args.is_empty());

    let cmd: WsCommand = serde_json::from_str("{}").unwrap();
    assert!(cmd.command.is_empty());
}

#[test]
fn response_frame_serializes_wire_keys() {
    let frame = WsFrame::status("Login", true, 0, "Welcome");
    let json = serde_json::to_value(&frame).unwrap();
    assert_eq!(json["Type"], "Login");
    assert_eq!(json["Success"], true);
    assert_eq!(json["Code"], 0);
    assert_eq!(json["String"], "Welcome");
    assert_eq!(json["Data"], "Welcome");
}

#[test]
fn failed_responses_carry_the_string_as_data() {
    let resp = CommandResult::fail(codes::NOT_IN_ROOM, "You are not in a room.");
    let frame = WsFrame::from_response("send", &resp);
    let json = serde_json::to_value(&frame).unwrap();
    assert_eq!(json["Type"], "send");
    assert_eq!(json["Success"], false);
    assert_eq!(json["Code"], 40);
    assert_eq!(json["Data"], "You are not in a room.");
}

#[test]
fn successful_responses_carry_structured_data() {
    let resp = CommandResult::ok_with("Rooms:\r\nLobby", vec!["Lobby"]);
    let frame = WsFrame::from_response("list", &resp);
    let json = serde_json::to_value(&frame).unwrap();
    assert_eq!(json["Data"], serde_json::json!(["Lobby"]));
}

#[test]
fn pushed_messages_use_the_messages_type() {
    let frame = WsFrame::pushed(&Message::server("notice"));
    let json = serde_json::to_value(&frame).unwrap();
    assert_eq!(json["Type"], "Messages");
    assert_eq!(json["Data"][0]["type"], "Server");
}

// =============================================================================
// Handshake logic
// =============================================================================

fn args(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_owned()).collect()
}

#[tokio::test]
async fn login_succeeds_with_valid_credentials() {
    let state = test_app_state();
    register(&state, "Alice", "secret").await;

    let (name, _data) = try_login(&state, &args(&["Alice", "secret"])).await.unwrap();
    assert_eq!(name, "Alice");
}

#[tokio::test]
async fn login_rejects_bad_credentials_and_arity() {
    let state = test_app_state();
    register(&state, "Alice", "secret").await;

    let frame = try_login(&state, &args(&["Alice", "wrong"])).await.unwrap_err();
    assert_eq!(frame.code, codes::AUTH_FAILED);

    let frame = try_login(&state, &args(&["Alice"])).await.unwrap_err();
    assert_eq!(frame.code, codes::AUTH_FAILED);

    let frame = try_login(&state, &args(&["bad name", "pw"])).await.unwrap_err();
    assert_eq!(frame.code, codes::INVALID_NAME);
}

#[tokio::test]
async fn login_rejects_an_account_already_in_a_room() {
    let state = test_app_state();
    register(&state, "Alice", "secret").await;

    let session = crate::state::test_helpers::login_session(&state, "Alice").await;
    let client = std::sync::Arc::clone(session.client().unwrap());
    client.execute(&args(&["join", "Lobby"])).await;

    let frame = try_login(&state, &args(&["Alice", "secret"])).await.unwrap_err();
    assert_eq!(frame.code, codes::AUTH_FAILED);
    assert_eq!(frame.string, "That user is already logged in.");
}

#[tokio::test]
async fn register_creates_account_and_rejects_duplicates() {
    let state = test_app_state();

    let frame = try_register(&state, &args(&["Bob", "pw"])).await;
    assert!(frame.success, "{}", frame.string);
    assert_eq!(frame.string, "Account Created");

    let frame = try_register(&state, &args(&["Bob", "pw"])).await;
    assert_eq!(frame.code, codes::CLIENT_EXISTS);
}

#[tokio::test]
async fn register_validates_names() {
    let state = test_app_state();
    let frame = try_register(&state, &args(&["no spaces allowed", "pw"])).await;
    assert_eq!(frame.code, codes::INVALID_NAME);
}
