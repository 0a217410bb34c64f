//! Telnet transport — line-oriented TCP sessions.
//!
//! DESIGN
//! ======
//! One task per connection reads lines; a sibling writer task owns the
//! write half and drains a bounded channel, so room fan-out never blocks on
//! a slow socket. `/`-prefixed lines are whitespace-tokenised commands;
//! anything else is a `send` of the whole line. Output is CRLF-terminated
//! for windows telnet clients.
//!
//! LIFECYCLE
//! =========
//! 1. Accept → greet → login/register prompt loop
//! 2. Login → `Welcome` → command loop
//! 3. Read error/EOF → leave room, tasks end
//! 4. `quit` → connection close → writer shutdown

use std::sync::{Arc, Mutex, Weak};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Notify, mpsc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::client::{Client, Connection};
use crate::data::{ClientData, DataError, validate_name};
use crate::message::Message;
use crate::state::AppState;

const WRITE_QUEUE: usize = 256;

/// Accept loop. One task per connection.
pub async fn run(listener: TcpListener, state: AppState) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!(%addr, "telnet: connection accepted");
                tokio::spawn(handle_connection(stream, state.clone()));
            }
            Err(e) => warn!(error = %e, "telnet: accept failed"),
        }
    }
}

// =============================================================================
// CONNECTION
// =============================================================================

struct TelnetConnection {
    tx: mpsc::Sender<String>,
    shutdown: Arc<Notify>,
    /// Back-reference for quitting on write failure. Weak, so teardown
    /// breaks the client↔transport cycle.
    client: Mutex<Weak<Client>>,
}

#[async_trait]
impl Connection for TelnetConnection {
    async fn send_message(&self, msg: Message) {
        // A full queue means the socket stalled; disconnect rather than
        // stall the room. The quit runs on its own task because this is
        // called from inside a room fan-out.
        if self.tx.try_send(format!("{msg}\r\n")).is_err() {
            let client = self.client.lock().unwrap().upgrade();
            if let Some(client) = client {
                warn!(client = %client.name(), "telnet: write queue saturated, disconnecting");
                tokio::spawn(async move { client.quit().await });
            }
        }
    }

    async fn close(&self) {
        self.shutdown.notify_one();
    }
}

async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut rx: mpsc::Receiver<String>,
    shutdown: Arc<Notify>,
) {
    loop {
        tokio::select! {
            line = rx.recv() => {
                let Some(line) = line else { break };
                if let Err(e) = writer.write_all(line.as_bytes()).await {
                    warn!(error = %e, "telnet: write failed");
                    break;
                }
            }
            () = shutdown.notified() => break,
        }
    }
}

// =============================================================================
// SESSION
// =============================================================================

async fn handle_connection(stream: TcpStream, state: AppState) {
    let conn_id = Uuid::new_v4();
    let (read_half, write_half) = stream.into_split();
    let (tx, rx) = mpsc::channel::<String>(WRITE_QUEUE);
    let shutdown = Arc::new(Notify::new());
    tokio::spawn(write_loop(write_half, rx, Arc::clone(&shutdown)));

    let mut reader = BufReader::new(read_half);

    if let Some((name, data)) = login(&mut reader, &tx, &state).await {
        let connection = Arc::new(TelnetConnection {
            tx: tx.clone(),
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

        let _ = tx.send("Welcome\r\n".to_owned()).await;
        info!(%conn_id, client = %client.name(), "telnet: logged in");

        input_loop(&mut reader, &client, &tx).await;
        info!(%conn_id, client = %client.name(), "telnet: session ended");
    }

    shutdown.notify_one();
}

/// Prompt loop until a successful login. `None` when the peer disconnects.
async fn login(
    reader: &mut BufReader<OwnedReadHalf>,
    tx: &mpsc::Sender<String>,
    state: &AppState,
) -> Option<(String, Arc<dyn ClientData>)> {
    loop {
        let name = prompt(reader, tx, "Enter Name or /new to create a new account.").await?;
        if name == "/new" {
            register(reader, tx, state).await?;
            continue;
        }
        if !validate_name(&name) {
            send_line(tx, "Invalid name.  Name must be alphanumeric characters only.").await;
            continue;
        }

        let data = state.data.create(&name);
        let password = prompt(reader, tx, "Enter Password.").await?;
        match data.authenticate(&password).await {
            Ok(true) => {
                if state.rooms.get_client(&name).is_some() {
                    send_line(tx, "That user is already logged in.").await;
                    continue;
                }
                return Some((name, data));
            }
            Ok(false) => send_line(tx, "User name and Password do not match.").await,
            Err(e) => {
                warn!(error = %e, "telnet: authentication failed");
                send_line(tx, "Server error please try again.").await;
            }
        }
    }
}

/// Account-creation prompt loop. `None` when the peer disconnects.
async fn register(
    reader: &mut BufReader<OwnedReadHalf>,
    tx: &mpsc::Sender<String>,
    state: &AppState,
) -> Option<()> {
    loop {
        let name = prompt(reader, tx, "Enter Name.").await?;
        if !validate_name(&name) {
            send_line(tx, "Invalid Name.  Name must be alphanumeric characters only.").await;
            continue;
        }

        let data = state.data.create(&name);
        match data.client_exists(&name).await {
            Ok(true) => {
                send_line(tx, "A client with that name already exists.").await;
                continue;
            }
            Ok(false) => {}
            Err(e) => {
                warn!(error = %e, "telnet: register lookup failed");
                send_line(tx, "Server error please try again.").await;
                continue;
            }
        }

        let mut first = prompt(reader, tx, "Enter Password.").await?;
        let mut second = prompt(reader, tx, "Please enter Password again.").await?;
        while first != second {
            first = prompt(reader, tx, "Passwords don't match. Enter Password.").await?;
            second = prompt(reader, tx, "Please enter Password again.").await?;
        }

        match data.new_client(&first).await {
            Ok(()) => send_line(tx, "Account Created.").await,
            Err(DataError::AccountCreationDisabled) => {
                send_line(tx, "New account creation has been disabled.").await;
            }
            Err(e) => {
                warn!(error = %e, "telnet: account creation failed");
                send_line(tx, "Error creating account.").await;
            }
        }
        return Some(());
    }
}

async fn input_loop(
    reader: &mut BufReader<OwnedReadHalf>,
    client: &Arc<Client>,
    tx: &mpsc::Sender<String>,
) {
    loop {
        let Some(line) = read_line(reader).await else {
            client.leave_room().await;
            return;
        };

        let command = parse_line(&line);
        let is_quit = command.first().map(String::as_str) == Some("quit");

        let resp = client.execute(&command).await;
        if !resp.message.is_empty() && !is_quit {
            if tx.send(format!("{}\r\n", resp.message)).await.is_err() {
                client.leave_room().await;
                return;
            }
        }
        if is_quit {
            return;
        }
    }
}

// =============================================================================
// LINE HANDLING
// =============================================================================

/// Turn one input line into a command token list: `/`-prefixed lines are
/// whitespace-tokenised with the slash stripped, anything else is a `send`
/// of the entire line.
pub(crate) fn parse_line(line: &str) -> Vec<String> {
    match line.strip_prefix('/') {
        Some(rest) => rest.split_whitespace().map(str::to_owned).collect(),
        None => vec!["send".to_owned(), line.to_owned()],
    }
}

/// Apply backspace editing: each 0x08 erases the previous kept character;
/// stray leading backspaces are dropped.
pub(crate) fn process_backspaces(line: &str) -> String {
    let mut kept: Vec<char> = Vec::with_capacity(line.len());
    for c in line.chars() {
        if c == '\u{8}' {
            kept.pop();
        } else {
            kept.push(c);
        }
    }
    kept.into_iter().collect()
}

/// Read one line, stripping the terminator and applying backspace editing.
/// `None` on EOF or read error.
async fn read_line(reader: &mut BufReader<OwnedReadHalf>) -> Option<String> {
    let mut line = String::new();
    match reader.read_line(&mut line).await {
        Ok(0) => None,
        Ok(_) => {
            let line = line.trim_end_matches('\n').trim_end_matches('\r');
            Some(process_backspaces(line))
        }
        Err(e) => {
            warn!(error = %e, "telnet: read failed");
            None
        }
    }
}

async fn send_line(tx: &mpsc::Sender<String>, text: &str) {
    let _ = tx.send(format!("{text}\r\n")).await;
}

async fn prompt(
    reader: &mut BufReader<OwnedReadHalf>,
    tx: &mpsc::Sender<String>,
    text: &str,
) -> Option<String> {
    send_line(tx, text).await;
    read_line(reader).await
}

#[cfg(test)]
#[path = "telnet_test.rs"]
mod tests;
