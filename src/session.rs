//! HTTP sessions — token registry and inactivity timeout.
//!
//! ARCHITECTURE
//! ============
//! HTTP clients are stateless on the wire but stateful in the server: login
//! mints a session holding the `Client`, a pending-message outbox drained by
//! `GET /messages`, and a 5-minute idle deadline pushed forward by every
//! request that presents the session's token.
//!
//! DESIGN
//! ======
//! The token→session map is owned by a single serving task; every operation
//! is a command on a channel with a oneshot reply. That gives mutations a
//! total order with no mutex, and makes the map safe to call from any task.

use std::collections::HashMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use rand::RngCore;
use tokio::sync::{mpsc, oneshot};
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::client::{Client, Connection};
use crate::message::{Message, MessageList};

/// Idle time after which a session is closed.
pub const SESSION_TIMEOUT: Duration = Duration::from_secs(5 * 60);

const TOKEN_BYTES: usize = 256;

pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// Generate a cryptographically random 256-byte hex token (512 hex chars).
#[must_use]
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    bytes_to_hex(&bytes)
}

// =============================================================================
// SESSION
// =============================================================================

pub struct Session {
    token: String,
    outbox: MessageList,
    client: OnceLock<Arc<Client>>,
    map: ClientMap,
    deadline: Mutex<Instant>,
    closed: AtomicBool,
    timer: Mutex<Option<AbortHandle>>,
}

impl Session {
    /// Mint a session with a fresh token and arm its idle timer.
    pub fn start(map: ClientMap) -> Arc<Self> {
        let session = Arc::new(Self {
            token: generate_token(),
            outbox: MessageList::new(),
            client: OnceLock::new(),
            map,
            deadline: Mutex::new(Instant::now() + SESSION_TIMEOUT),
            closed: AtomicBool::new(false),
            timer: Mutex::new(None),
        });

        let handle = tokio::spawn(idle_timer(Arc::clone(&session)));
        *session.timer.lock().unwrap() = Some(handle.abort_handle());
        session
    }

    /// Bind the logged-in client. Called exactly once, right after login.
    pub fn attach_client(&self, client: Arc<Client>) {
        if self.client.set(client).is_err() {
            warn!(token = %&self.token[..8], "session client attached twice");
        }
    }

    pub fn client(&self) -> Option<&Arc<Client>> {
        self.client.get()
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Push the idle deadline another timeout window out.
    pub fn reset_timeout(&self) {
        *self.deadline.lock().unwrap() = Instant::now() + SESSION_TIMEOUT;
    }

    /// Take all pending messages for this session.
    pub fn drain_outbox(&self) -> Vec<Message> {
        self.outbox.drain()
    }

    /// Tear the session down: leave the room, delete the token, stop the
    /// timer. Idempotent; safe to call from the timer itself because the
    /// abort happens last.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(client) = self.client.get() {
            client.leave_room().await;
        }
        self.map.delete(&self.token).await;
        if let Some(timer) = self.timer.lock().unwrap().take() {
            timer.abort();
        }
    }
}

#[async_trait]
impl Connection for Session {
    /// Queue for the next `GET /messages` poll.
    async fn send_message(&self, msg: Message) {
        self.outbox.push(msg);
    }

    async fn close(&self) {
        Session::close(self).await;
    }
}

async fn idle_timer(session: Arc<Session>) {
    loop {
        let deadline = *session.deadline.lock().unwrap();
        if Instant::now() >= deadline {
            info!("http session idle timeout");
            session.close().await;
            break;
        }
        tokio::time::sleep_until(deadline).await;
    }
}

// =============================================================================
// CLIENT MAP
// =============================================================================

enum MapCommand {
    Add {
        session: Arc<Session>,
        reply: oneshot::Sender<bool>,
    },
    Get {
        token: String,
        reply: oneshot::Sender<Option<Arc<Session>>>,
    },
    Delete {
        token: String,
        reply: oneshot::Sender<bool>,
    },
}

/// Handle to the token→session registry. Cloning shares the serving task.
#[derive(Clone)]
pub struct ClientMap {
    tx: mpsc::Sender<MapCommand>,
}

impl ClientMap {
    /// Start the serving task. Requires a tokio runtime.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(1);
        tokio::spawn(serve(rx));
        Self { tx }
    }

    /// Register a session. Rejects a token already present.
    pub async fn add(&self, session: Arc<Session>) -> bool {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(MapCommand::Add { session, reply }).await.is_err() {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    pub async fn get(&self, token: &str) -> Option<Arc<Session>> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(MapCommand::Get { token: token.to_owned(), reply })
            .await
            .ok()?;
        rx.await.ok().flatten()
    }

    pub async fn check(&self, token: &str) -> bool {
        self.get(token).await.is_some()
    }

    pub async fn delete(&self, token: &str) -> bool {
        let (reply, rx) = oneshot::channel();
        if self
            .tx
            .send(MapCommand::Delete { token: token.to_owned(), reply })
            .await
            .is_err()
        {
            return false;
        }
        rx.await.unwrap_or(false)
    }
}

impl Default for ClientMap {
    fn default() -> Self {
        Self::new()
    }
}

async fn serve(mut rx: mpsc::Receiver<MapCommand>) {
    let mut sessions: HashMap<String, Arc<Session>> = HashMap::new();
    while let Some(cmd) = rx.recv().await {
        match cmd {
            MapCommand::Add { session, reply } => {
                let token = session.token().to_owned();
                let added = if sessions.contains_key(&token) {
                    false
                } else {
                    sessions.insert(token, session);
                    true
                };
                let _ = reply.send(added);
            }
            MapCommand::Get { token, reply } => {
                let _ = reply.send(sessions.get(&token).cloned());
            }
            MapCommand::Delete { token, reply } => {
                let _ = reply.send(sessions.remove(&token).is_some());
            }
        }
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
