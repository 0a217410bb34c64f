//! Client — the command engine behind every transport.
//!
//! ARCHITECTURE
//! ============
//! Each logged-in session owns one `Client`. Transports decode their wire
//! format into a token list, hand it to `execute`, and render the returned
//! `Response`. Messages flow the other way through `receive`, which applies
//! block filtering and forwards to the session's `Connection`.
//!
//! DESIGN
//! ======
//! The client holds its current room behind a mutex written only from its
//! own session task; rooms hold the client as an `Arc<dyn Member>`. The
//! connection slot is cleared at teardown so the client↔transport cycle
//! breaks before the transport closes.

use std::sync::{Arc, Mutex, Weak};

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tracing::{error, warn};

use crate::chatlog::ChatLog;
use crate::data::{ClientData, DataError, validate_name};
use crate::message::Message;
use crate::room::{Member, Room};
use crate::roomlist::{LOBBY, RoomList};

// =============================================================================
// RESPONSE CODES
// =============================================================================

/// Numeric result codes carried in every `Response` and mirrored into the
/// HTTP `Code` header. The values are the wire contract.
pub mod codes {
    pub const OK: u16 = 0;
    pub const CLIENT_EXISTS: u16 = 10;
    pub const INVALID_NAME: u16 = 20;
    pub const AUTH_FAILED: u16 = 21;
    pub const NO_ARGUMENT: u16 = 22;
    pub const ALREADY_BLOCKING: u16 = 30;
    pub const NOT_BLOCKING: u16 = 31;
    pub const BLOCK_SELF: u16 = 32;
    pub const ALREADY_FRIEND: u16 = 35;
    pub const NOT_FRIEND: u16 = 36;
    pub const FRIEND_SELF: u16 = 37;
    pub const NOT_IN_ROOM: u16 = 40;
    pub const ROOM_NOT_FOUND: u16 = 41;
    pub const CLIENT_NOT_FOUND: u16 = 42;
    pub const BLOCKED_BY_TARGET: u16 = 43;
    pub const SERVER_ERROR: u16 = 50;
    pub const UNSUPPORTED_METHOD: u16 = 60;
    pub const INVALID_COMMAND: u16 = 70;
}

// =============================================================================
// CONNECTION
// =============================================================================

/// Transport half of a session: push a message to the user, or tear the
/// session down.
#[async_trait]
pub trait Connection: Send + Sync {
    async fn send_message(&self, msg: Message);
    async fn close(&self);
}

// =============================================================================
// RESPONSE
// =============================================================================

/// Result of one command: success flag, numeric code, pretty string, and an
/// optional structured payload.
#[derive(Debug, Clone)]
pub struct Response {
    pub success: bool,
    pub code: u16,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

impl Response {
    pub fn ok(message: impl Into<String>) -> Self {
        Self { success: true, code: codes::OK, message: message.into(), data: None }
    }

    pub fn ok_with(message: impl Into<String>, data: impl Serialize) -> Self {
        Self {
            success: true,
            code: codes::OK,
            message: message.into(),
            data: serde_json::to_value(data).ok(),
        }
    }

    pub fn fail(code: u16, message: impl Into<String>) -> Self {
        Self { success: false, code, message: message.into(), data: None }
    }
}

/// Structured payload for `who`.
#[derive(Debug, Clone, Serialize)]
pub struct WhoData {
    pub room: String,
    pub clients: Vec<String>,
}

/// One friend-list entry: the friend's current room, or a last-online
/// description when offline.
#[derive(Debug, Clone, Serialize)]
pub struct FriendInfo {
    pub name: String,
    pub room: String,
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct Client {
    name: String,
    /// Self-handle so `join` can insert this client into room memberships.
    me: Weak<Client>,
    room: Mutex<Option<Arc<Room>>>,
    rooms: Arc<RoomList>,
    chatlog: ChatLog,
    data: Arc<dyn ClientData>,
    connection: Mutex<Option<Arc<dyn Connection>>>,
}

impl Client {
    /// Build a client for a logged-in session and stamp its last-online
    /// time. The client starts roomless; Lobby membership happens only via
    /// an explicit `join`.
    pub async fn new(
        name: impl Into<String>,
        rooms: Arc<RoomList>,
        chatlog: ChatLog,
        data: Arc<dyn ClientData>,
        connection: Arc<dyn Connection>,
    ) -> Arc<Self> {
        let client = Arc::new_cyclic(|me| Self {
            name: name.into(),
            me: me.clone(),
            room: Mutex::new(None),
            rooms,
            chatlog,
            data,
            connection: Mutex::new(Some(connection)),
        });
        if let Err(e) = client.data.update_online(Utc::now()).await {
            warn!(client = %client.name, error = %e, "last-online update failed");
        }
        client
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parse and run one command. The first token selects the operation;
    /// missing argument slots read as empty strings.
    pub async fn execute(&self, command: &[String]) -> Response {
        match arg(command, 0) {
            "send" => self.send(arg(command, 1)).await,
            "join" => self.join(arg(command, 1)).await,
            "leave" => self.join(LOBBY).await,
            "quit" => self.quit().await,
            "who" => self.who(arg(command, 1)).await,
            "list" => self.list(),
            "block" => self.block(arg(command, 1)).await,
            "unblock" => self.unblock(arg(command, 1)).await,
            "blocklist" => self.block_list().await,
            "friend" => self.friend(arg(command, 1)).await,
            "unfriend" => self.unfriend(arg(command, 1)).await,
            "friendlist" => self.friend_list().await,
            "tell" => self.tell(arg(command, 1), arg(command, 2)).await,
            _ => Response::fail(codes::INVALID_COMMAND, "Invalid Command"),
        }
    }

    /// Remove the client from its current room, if any, then announce the
    /// departure to the former members and echo it to the leaver. Removing
    /// first keeps the leaver from seeing the announcement twice.
    pub async fn leave_room(&self) {
        let old = self.room.lock().unwrap().take();
        if let Some(room) = old {
            room.remove(self);
            room.send(Message::leave(&self.name)).await;
            self.receive(Message::leave(&self.name)).await;
        }
    }

    async fn send(&self, text: &str) -> Response {
        let current = self.room.lock().unwrap().clone();
        let Some(room) = current else {
            return Response::fail(codes::NOT_IN_ROOM, "You are not in a room.");
        };
        let msg = Message::send(text, &self.name);
        self.chatlog.log(&msg.to_string());
        room.send(msg).await;
        Response::ok("")
    }

    async fn join(&self, room_name: &str) -> Response {
        if room_name.is_empty() {
            return Response::fail(codes::NO_ARGUMENT, "You must enter a room to join.");
        }
        if !validate_name(room_name) {
            return Response::fail(
                codes::INVALID_NAME,
                "Invalid room name.  Name may only contain alphanumeric characters.",
            );
        }
        self.leave_room().await;

        let room = match self.rooms.find_room(room_name) {
            Some(room) => room,
            None => {
                let room = Arc::new(Room::new(room_name));
                match self.rooms.add(Arc::clone(&room)) {
                    Ok(()) => room,
                    // Lost a creation race: someone registered the name first.
                    Err(crate::roomlist::RoomError::RoomExists) => {
                        match self.rooms.find_room(room_name) {
                            Some(existing) => existing,
                            None => return Response::fail(codes::SERVER_ERROR, ""),
                        }
                    }
                    Err(e) => return Response::fail(codes::SERVER_ERROR, e.to_string()),
                }
            }
        };

        let Some(me) = self.me.upgrade() else {
            return Response::fail(codes::SERVER_ERROR, "");
        };
        *self.room.lock().unwrap() = Some(Arc::clone(&room));
        room.add(me as Arc<dyn Member>);
        room.send(Message::join(&self.name)).await;
        Response::ok("")
    }

    /// Leave the current room, then tear the transport down. Taking the
    /// connection out first makes a nested quit a no-op.
    pub async fn quit(&self) -> Response {
        self.leave_room().await;
        let connection = self.connection.lock().unwrap().take();
        if let Some(connection) = connection {
            connection.close().await;
        }
        Response::ok("")
    }

    async fn who(&self, room_name: &str) -> Response {
        let current = self.room.lock().unwrap().clone();
        let room_name = if room_name.is_empty() {
            match &current {
                Some(room) => room.name().to_owned(),
                None => return Response::fail(codes::NOT_IN_ROOM, "You are not in a room."),
            }
        } else {
            room_name.to_owned()
        };

        let Some(room) = self.rooms.find_room(&room_name) else {
            return Response::fail(codes::ROOM_NOT_FOUND, "That room was not found.");
        };
        let clients = room.who();
        let mut pretty = format!("Room: {room_name}");
        for name in &clients {
            pretty.push_str("\r\n");
            pretty.push_str(name);
        }
        Response::ok_with(pretty, WhoData { room: room_name, clients })
    }

    fn list(&self) -> Response {
        let rooms = self.rooms.who();
        let mut pretty = String::from("Rooms:");
        for name in &rooms {
            pretty.push_str("\r\n");
            pretty.push_str(name);
        }
        Response::ok_with(pretty, rooms)
    }

    async fn block(&self, name: &str) -> Response {
        if name.is_empty() {
            return Response::fail(codes::NO_ARGUMENT, "You must enter a user to block.");
        }
        if !validate_name(name) {
            return Response::fail(
                codes::INVALID_NAME,
                "Invalid name.  Name must be alphanumeric characters only.",
            );
        }
        if self.name == name {
            return Response::fail(codes::BLOCK_SELF, "You can't block yourself.");
        }
        match self.data.block(name).await {
            Ok(()) => Response::ok(format!("Now blocking {name}.")),
            Err(DataError::AlreadyBlocking) => Response::fail(
                codes::ALREADY_BLOCKING,
                format!("You are already blocking {name}."),
            ),
            Err(e) => {
                error!(client = %self.name, error = %e, "block failed");
                Response::fail(codes::SERVER_ERROR, "")
            }
        }
    }

    async fn unblock(&self, name: &str) -> Response {
        if name.is_empty() {
            return Response::fail(codes::NO_ARGUMENT, "You must enter user to unblock.");
        }
        if !validate_name(name) {
            return Response::fail(
                codes::INVALID_NAME,
                "Invalid name.  Name must be alphanumeric characters only.",
            );
        }
        match self.data.unblock(name).await {
            Ok(()) => Response::ok(format!("No longer blocking {name}.")),
            Err(DataError::NotBlocking) => {
                Response::fail(codes::NOT_BLOCKING, format!("You are not blocking {name}."))
            }
            Err(e) => {
                error!(client = %self.name, error = %e, "unblock failed");
                Response::fail(codes::SERVER_ERROR, "")
            }
        }
    }

    async fn block_list(&self) -> Response {
        match self.data.block_list().await {
            Ok(list) => {
                let mut pretty = String::from("Block List:");
                for name in &list {
                    pretty.push_str("\r\n");
                    pretty.push_str(name);
                }
                Response::ok_with(pretty, list)
            }
            Err(e) => {
                error!(client = %self.name, error = %e, "block list failed");
                Response::fail(codes::SERVER_ERROR, "")
            }
        }
    }

    async fn friend(&self, name: &str) -> Response {
        if name.is_empty() {
            return Response::fail(codes::NO_ARGUMENT, "You must enter a user to friend.");
        }
        if !validate_name(name) {
            return Response::fail(
                codes::INVALID_NAME,
                "Invalid name.  Name must be alphanumeric characters only.",
            );
        }
        if self.name == name {
            return Response::fail(codes::FRIEND_SELF, "You can't friend yourself.");
        }
        match self.data.friend(name).await {
            Ok(()) => Response::ok(format!("{name} is now on your friends list.")),
            Err(DataError::AlreadyFriend) => Response::fail(
                codes::ALREADY_FRIEND,
                format!("{name} is already on your friends list."),
            ),
            Err(e) => {
                error!(client = %self.name, error = %e, "friend failed");
                Response::fail(codes::SERVER_ERROR, "")
            }
        }
    }

    async fn unfriend(&self, name: &str) -> Response {
        if name.is_empty() {
            return Response::fail(codes::NO_ARGUMENT, "You must enter a user to unfriend.");
        }
        if !validate_name(name) {
            return Response::fail(
                codes::INVALID_NAME,
                "Invalid name.  Name must be alphanumeric characters only.",
            );
        }
        match self.data.unfriend(name).await {
            Ok(()) => Response::ok(format!("{name} is no longer on your friends list.")),
            Err(DataError::NotFriend) => Response::fail(
                codes::NOT_FRIEND,
                format!("{name} is not on your friends list."),
            ),
            Err(e) => {
                error!(client = %self.name, error = %e, "unfriend failed");
                Response::fail(codes::SERVER_ERROR, "")
            }
        }
    }

    async fn friend_list(&self) -> Response {
        let list = match self.data.friend_list().await {
            Ok(list) => list,
            Err(e) => {
                error!(client = %self.name, error = %e, "friend list failed");
                return Response::fail(codes::SERVER_ERROR, "");
            }
        };

        let mut friends = Vec::with_capacity(list.len());
        for name in list {
            let room = match self.rooms.find_client_room(&name) {
                Some(room) => room,
                None => match self.data.last_online(&name).await {
                    Ok(t) => last_online_string(Utc::now() - t),
                    Err(DataError::ClientNotFound) => "Not Found".to_owned(),
                    Err(e) => {
                        warn!(client = %self.name, friend = %name, error = %e, "last-online lookup failed");
                        "Not Found".to_owned()
                    }
                },
            };
            friends.push(FriendInfo { name, room });
        }

        let mut pretty = String::from("Friend \t\t Room/Last Online");
        for friend in &friends {
            pretty.push_str("\r\n");
            pretty.push_str(&friend.name);
            pretty.push_str("\t\t");
            pretty.push_str(&friend.room);
        }
        Response::ok_with(pretty, friends)
    }

    async fn tell(&self, name: &str, text: &str) -> Response {
        if name.is_empty() {
            return Response::fail(codes::CLIENT_NOT_FOUND, "You must enter a name and a message.");
        }
        let Some(other) = self.rooms.get_client(name) else {
            return Response::fail(
                codes::CLIENT_NOT_FOUND,
                "Could not find a client with that name.",
            );
        };
        if other.blocks(&self.name).await {
            return Response::fail(
                codes::BLOCKED_BY_TARGET,
                format!("{} is blocking you.", other.name()),
            );
        }
        other
            .receive(Message::tell(text, &self.name, other.name(), true))
            .await;
        self.receive(Message::tell(text, &self.name, other.name(), false))
            .await;
        Response::ok("")
    }
}

#[async_trait]
impl Member for Client {
    fn name(&self) -> &str {
        &self.name
    }

    /// Forward a message to the transport unless the account blocks its
    /// sender. A failing block check delivers rather than drops.
    async fn receive(&self, msg: Message) {
        if let Some(sender) = msg.sender() {
            match self.data.is_blocked(sender).await {
                Ok(true) => return,
                Ok(false) => {}
                Err(e) => warn!(client = %self.name, error = %e, "block check failed"),
            }
        }
        let connection = self.connection.lock().unwrap().clone();
        if let Some(connection) = connection {
            connection.send_message(msg).await;
        }
    }

    async fn blocks(&self, name: &str) -> bool {
        self.data.is_blocked(name).await.unwrap_or(false)
    }
}

/// Pick argument `i`, reading past-the-end slots as empty.
fn arg(command: &[String], i: usize) -> &str {
    command.get(i).map(String::as_str).unwrap_or("")
}

/// Render how long ago `d` was as the coarsest sensible unit.
fn last_online_string(d: chrono::Duration) -> String {
    const MINUTE: i64 = 60;
    const HOUR: i64 = 60 * MINUTE;
    const DAY: i64 = 24 * HOUR;
    const WEEK: i64 = 7 * DAY;
    const YEAR: i64 = 365 * DAY;

    let secs = d.num_seconds();
    if secs > YEAR {
        format!("{} Years ago", secs / YEAR)
    } else if secs > WEEK {
        format!("{} Weeks ago", secs / WEEK)
    } else if secs > DAY {
        format!("{} Days ago", secs / DAY)
    } else if secs > HOUR {
        format!("{} Hours ago", secs / HOUR)
    } else if secs > MINUTE {
        format!("{} Minutes ago", secs / MINUTE)
    } else {
        format!("{} Seconds ago", secs.max(0))
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
pub(crate) mod test_helpers {
    use super::*;
    use crate::data::DataFactory;

    /// Connection double that records pushed messages.
    #[derive(Default)]
    pub struct RecordingConnection {
        pub sent: Mutex<Vec<Message>>,
        pub closed: std::sync::atomic::AtomicBool,
    }

    impl RecordingConnection {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn sent(&self) -> Vec<Message> {
            self.sent.lock().unwrap().clone()
        }

        pub fn rendered(&self) -> Vec<String> {
            self.sent().iter().map(ToString::to_string).collect()
        }

        pub fn is_closed(&self) -> bool {
            self.closed.load(std::sync::atomic::Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Connection for RecordingConnection {
        async fn send_message(&self, msg: Message) {
            self.sent.lock().unwrap().push(msg);
        }

        async fn close(&self) {
            self.closed.store(true, std::sync::atomic::Ordering::SeqCst);
        }
    }

    /// Register an account and build its logged-in client.
    pub async fn logged_in(
        factory: &DataFactory,
        rooms: &Arc<RoomList>,
        name: &str,
    ) -> (Arc<Client>, Arc<RecordingConnection>) {
        let data = factory.create(name);
        data.new_client("password").await.unwrap();
        let connection = RecordingConnection::new();
        let client = Client::new(
            name,
            Arc::clone(rooms),
            ChatLog::disabled(),
            data,
            connection.clone() as Arc<dyn Connection>,
        )
        .await;
        (client, connection)
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
