use std::time::Duration;

use tokio::io::AsyncReadExt;

use super::*;
use crate::state::test_helpers::{register, test_app_state};

// =============================================================================
// Line parsing
// =============================================================================

#[test]
fn slash_lines_are_tokenised_commands() {
    assert_eq!(parse_line("/join R"), vec!["join", "R"]);
    assert_eq!(parse_line("/who"), vec!["who"]);
    assert_eq!(parse_line("/tell Bob hello"), vec!["tell", "Bob", "hello"]);
    assert!(parse_line("/").is_empty());
}

#[test]
fn plain_lines_send_the_whole_line() {
    assert_eq!(parse_line("hello world"), vec!["send", "hello world"]);
    assert_eq!(parse_line(""), vec!["send", ""]);
}

#[test]
fn backspaces_erase_previous_characters() {
    assert_eq!(process_backspaces("abc"), "abc");
    assert_eq!(process_backspaces("abc\u{8}d"), "abd");
    assert_eq!(process_backspaces("ab\u{8}\u{8}cd"), "cd");
    assert_eq!(process_backspaces("\u{8}\u{8}a"), "a");
    assert_eq!(process_backspaces("ab\u{8}\u{8}\u{8}"), "");
}

// =============================================================================
// End-to-end over TCP
// =============================================================================

async fn read_until(stream: &mut TcpStream, pattern: &str) -> String {
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        let mut seen = String::new();
        let mut buf = [0u8; 512];
        loop {
            if seen.contains(pattern) {
                return seen;
            }
            let n = stream.read(&mut buf).await.expect("read");
            assert!(n > 0, "connection closed while waiting for {pattern:?}; got {seen:?}");
            seen.push_str(&String::from_utf8_lossy(&buf[..n]));
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {pattern:?}"))
}

async fn write_line(stream: &mut TcpStream, line: &str) {
    use tokio::io::AsyncWriteExt;
    stream.write_all(format!("{line}\r\n").as_bytes()).await.expect("write");
}

async fn start_server(state: AppState) -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(run(listener, state));
    addr
}

#[tokio::test]
async fn login_join_send_quit() {
    let state = test_app_state();
    register(&state, "Alice", "secret").await;
    let addr = start_server(state).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    read_until(&mut stream, "Enter Name or /new to create a new account.").await;

    write_line(&mut stream, "Alice").await;
    read_until(&mut stream, "Enter Password.").await;

    write_line(&mut stream, "secret").await;
    read_until(&mut stream, "Welcome").await;

    write_line(&mut stream, "/join R").await;
    read_until(&mut stream, "Alice has joined the room.").await;

    write_line(&mut stream, "hello world").await;
    read_until(&mut stream, "[Alice]: hello world").await;

    write_line(&mut stream, "/quit").await;
    let mut rest = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut rest))
        .await
        .expect("server should close the connection")
        .expect("read");
}

#[tokio::test]
async fn wrong_password_reprompts() {
    let state = test_app_state();
    register(&state, "Alice", "secret").await;
    let addr = start_server(state).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    read_until(&mut stream, "Enter Name").await;
    write_line(&mut stream, "Alice").await;
    read_until(&mut stream, "Enter Password.").await;
    write_line(&mut stream, "nope").await;
    read_until(&mut stream, "User name and Password do not match.").await;
    read_until(&mut stream, "Enter Name or /new to create a new account.").await;
}

#[tokio::test]
async fn register_flow_creates_account() {
    let state = test_app_state();
    let addr = start_server(state).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    read_until(&mut stream, "Enter Name or /new to create a new account.").await;
    write_line(&mut stream, "/new").await;
    read_until(&mut stream, "Enter Name.").await;
    write_line(&mut stream, "Carol").await;
    read_until(&mut stream, "Enter Password.").await;
    write_line(&mut stream, "pw1").await;
    read_until(&mut stream, "Please enter Password again.").await;
    write_line(&mut stream, "pw1").await;
    read_until(&mut stream, "Account Created.").await;

    // Back at the login prompt, the fresh account works.
    read_until(&mut stream, "Enter Name or /new to create a new account.").await;
    write_line(&mut stream, "Carol").await;
    read_until(&mut stream, "Enter Password.").await;
    write_line(&mut stream, "pw1").await;
    read_until(&mut stream, "Welcome").await;
}

#[tokio::test]
async fn second_login_for_active_account_is_rejected() {
    let state = test_app_state();
    register(&state, "Alice", "secret").await;
    let addr = start_server(state).await;

    let mut first = TcpStream::connect(addr).await.unwrap();
    read_until(&mut first, "Enter Name").await;
    write_line(&mut first, "Alice").await;
    read_until(&mut first, "Enter Password.").await;
    write_line(&mut first, "secret").await;
    read_until(&mut first, "Welcome").await;
    // Presence is defined by room membership.
    write_line(&mut first, "/join Lobby").await;
    read_until(&mut first, "Alice has joined the room.").await;

    let mut second = TcpStream::connect(addr).await.unwrap();
    read_until(&mut second, "Enter Name").await;
    write_line(&mut second, "Alice").await;
    read_until(&mut second, "Enter Password.").await;
    write_line(&mut second, "secret").await;
    read_until(&mut second, "That user is already logged in.").await;
}

#[tokio::test]
async fn invalid_login_name_is_rejected() {
    let state = test_app_state();
    let addr = start_server(state).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    read_until(&mut stream, "Enter Name").await;
    write_line(&mut stream, "not a name").await;
    read_until(&mut stream, "Invalid name.  Name must be alphanumeric characters only.").await;
}
