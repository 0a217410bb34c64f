//! WebSocket adapter — JSON command frames over one socket.
//!
//! DESIGN
//! ======
//! Command frames are `{"Command": "...", "Args": [...]}`; every reply is
//! `{"Type", "Success", "Code", "String", "Data"}`. The socket starts
//! anonymous and accepts only `login`, `register` and `quit`; a successful
//! login builds the full `Client` and enters the serving loop.
//!
//! A single task owns the socket and `select!`s between inbound frames and
//! messages pushed by room fan-out through a bounded per-session channel,
//! which serialises all writes and preserves per-session order. A saturated
//! channel disconnects the session rather than stalling the room.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → anonymous handshake loop
//! 2. `login` → `Client` built → serving loop
//! 3. Read/write error, `quit`, or connection close → leave room → done

use std::sync::{Arc, Mutex, Weak};

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use serde::{Deserialize, Serialize};
use tokio::sync::{Notify, mpsc};
use tracing::{info, warn};
use uuid::Uuid;

use async_trait::async_trait;

use crate::client::{Client, Connection, codes};
use crate::data::{ClientData, DataError, validate_name};
use crate::message::Message;
use crate::state::AppState;

const PUSH_QUEUE: usize = 256;

// =============================================================================
// FRAMES
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct WsCommand {
    pub command: String,
    pub args: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct WsFrame {
    pub r#type: String,
    pub success: bool,
    pub code: u16,
    pub string: String,
    pub data: serde_json::Value,
}

impl WsFrame {
    fn status(r#type: &str, success: bool, code: u16, text: &str) -> Self {
        Self {
            r#type: r#type.to_owned(),
            success,
            code,
            string: text.to_owned(),
            data: serde_json::Value::String(text.to_owned()),
        }
    }

    /// Render a command response. Failures carry the pretty string as data.
    fn from_response(r#type: &str, resp: &crate::client::Response) -> Self {
        let data = if resp.success {
            resp.data.clone().unwrap_or(serde_json::Value::Null)
        } else {
            serde_json::Value::String(resp.message.clone())
        };
        Self {
            r#type: r#type.to_owned(),
            success: resp.success,
            code: resp.code,
            string: resp.message.clone(),
            data,
        }
    }

    /// Wrap one pushed message, type `"Messages"`.
    fn pushed(msg: &Message) -> Self {
        Self {
            r#type: "Messages".to_owned(),
            success: true,
            code: codes::OK,
            string: String::new(),
            data: serde_json::to_value(vec![msg]).unwrap_or_default(),
        }
    }
}

async fn send_frame(socket: &mut WebSocket, frame: &WsFrame) -> Result<(), ()> {
    let json = match serde_json::to_string(frame) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "ws: frame serialize failed");
            return Err(());
        }
    };
    socket.send(WsMessage::Text(json.into())).await.map_err(|_| ())
}

// =============================================================================
// CONNECTION
// =============================================================================

struct WsConnection {
    tx: mpsc::Sender<Message>,
    shutdown: Arc<Notify>,
    client: Mutex<Weak<Client>>,
}

#[async_trait]
impl Connection for WsConnection {
    async fn send_message(&self, msg: Message) {
        // Called from inside a room fan-out; the quit runs on its own task.
        if self.tx.try_send(msg).is_err() {
            let client = self.client.lock().unwrap().upgrade();
            if let Some(client) = client {
                warn!(client = %client.name(), "ws: push queue saturated, disconnecting");
                tokio::spawn(async move { client.quit().await });
            }
        }
    }

    async fn close(&self) {
        self.shutdown.notify_one();
    }
}

// =============================================================================
// HANDSHAKE
// =============================================================================

pub fn upgrade(upgrade: WebSocketUpgrade, state: AppState) -> Response {
    upgrade.on_upgrade(move |socket| serve(socket, state))
}

async fn serve(mut socket: WebSocket, state: AppState) {
    let conn_id = Uuid::new_v4();

    // Anonymous until a successful login.
    let (name, data) = loop {
        let Some(Ok(msg)) = socket.recv().await else { return };
        let text = match msg {
            WsMessage::Text(text) => text,
            WsMessage::Close(_) => return,
            _ => continue,
        };
        let cmd: WsCommand = serde_json::from_str(&text).unwrap_or_default();

        match cmd.command.as_str() {
            "login" => match try_login(&state, &cmd.args).await {
                Ok(logged_in) => {
                    let welcome = WsFrame::status("Login", true, codes::OK, "Welcome");
                    if send_frame(&mut socket, &welcome).await.is_err() {
                        return;
                    }
                    break logged_in;
                }
                Err(frame) => {
                    if send_frame(&mut socket, &frame).await.is_err() {
                        return;
                    }
                }
            },
            "register" => {
                let frame = try_register(&state, &cmd.args).await;
                let _ = send_frame(&mut socket, &frame).await;
                return;
            }
            "quit" => return,
            _ => {}
        }
    };

    // Logged in: wire the client and serve.
    let (tx, mut rx) = mpsc::channel::<Message>(PUSH_QUEUE);
    let shutdown = Arc::new(Notify::new());
    let connection = Arc::new(WsConnection {
        tx,
        shutdown: Arc::clone(&shutdown),
        client: Mutex::new(Weak::new()),
    });
    let client = Client::new(
        name,
        Arc::clone(&state.rooms),
        state.chatlog.clone(),
        data,
        Arc::clone(&connection) as Arc<dyn Connection>,
    )
    .await;
    *connection.client.lock().unwrap() = Arc::downgrade(&client);

    info!(%conn_id, client = %client.name(), "ws: logged in");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    WsMessage::Text(text) => {
                        let cmd: WsCommand = serde_json::from_str(&text).unwrap_or_default();
                        let mut command = vec![cmd.command.clone()];
                        command.extend(cmd.args);
                        let resp = client.execute(&command).await;
                        let frame = WsFrame::from_response(&cmd.command, &resp);
                        if send_frame(&mut socket, &frame).await.is_err() {
                            break;
                        }
                    }
                    WsMessage::Close(_) => break,
                    _ => {}
                }
            }
            pushed = rx.recv() => {
                let Some(msg) = pushed else { break };
                if send_frame(&mut socket, &WsFrame::pushed(&msg)).await.is_err() {
                    break;
                }
            }
            () = shutdown.notified() => break,
        }
    }

    client.leave_room().await;
    info!(%conn_id, client = %client.name(), "ws: disconnected");
}

// =============================================================================
// LOGIN / REGISTER
// =============================================================================

type LoggedIn = (String, Arc<dyn ClientData>);

async fn try_login(state: &AppState, args: &[String]) -> Result<LoggedIn, WsFrame> {
    let [name, password, ..] = args else {
        return Err(WsFrame::status(
            "Login",
            false,
            codes::AUTH_FAILED,
            "Must enter user name and password.",
        ));
    };
    if !validate_name(name) {
        return Err(WsFrame::status(
            "Login",
            false,
            codes::INVALID_NAME,
            "Invalid name.  Name can only contain alpha numeric characters.",
        ));
    }

    let data = state.data.create(name);
    match data.authenticate(password).await {
        Ok(true) => {}
        Ok(false) => {
            return Err(WsFrame::status(
                "Login",
                false,
                codes::AUTH_FAILED,
                "User name and password do not match.",
            ));
        }
        Err(e) => {
            warn!(error = %e, "ws: authentication failed");
            return Err(WsFrame::status(
                "Login",
                false,
                codes::SERVER_ERROR,
                "Server error please try again.",
            ));
        }
    }

    if state.rooms.get_client(name).is_some() {
        return Err(WsFrame::status(
            "Login",
            false,
            codes::AUTH_FAILED,
            "That user is already logged in.",
        ));
    }

    Ok((name.clone(), data))
}

async fn try_register(state: &AppState, args: &[String]) -> WsFrame {
    let [name, password, ..] = args else {
        return WsFrame::status(
            "Register",
            false,
            codes::AUTH_FAILED,
            "Must enter user name and password.",
        );
    };
    if !validate_name(name) {
        return WsFrame::status(
            "Register",
            false,
            codes::INVALID_NAME,
            "Invalid name.  Name can only contain alpha numeric characters.",
        );
    }

    let data = state.data.create(name);
    match data.new_client(password).await {
        Ok(()) => WsFrame::status("Register", true, codes::OK, "Account Created"),
        Err(DataError::ClientExists) => WsFrame::status(
            "Register",
            false,
            codes::CLIENT_EXISTS,
            "A client with that name already exists.",
        ),
        Err(DataError::AccountCreationDisabled) => WsFrame::status(
            "Register",
            false,
            codes::OK,
            "Account creation has been disabled.",
        ),
        Err(e) => {
            warn!(error = %e, "ws: registration failed");
            WsFrame::status(
                "Register",
                false,
                codes::SERVER_ERROR,
                "Server error please try again.",
            )
        }
    }
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
