//! Message — the universal chat payload.
//!
//! DESIGN
//! ======
//! Every piece of traffic a user can see is a `Message`. Transports render
//! messages with `to_string()` for text wires (telnet, REST history) and
//! serialize them as tagged JSON for structured wires (HTTP outbox drain,
//! WebSocket push). Variants that carry a sender name participate in block
//! filtering; server and presence notices do not.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Clock layout shared by every time-prefixed rendering, e.g. `3:04pm`.
const CLOCK_FORMAT: &str = "%-I:%M%P";

// =============================================================================
// MESSAGE
// =============================================================================

/// A single chat message, tagged by origin.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    /// Server-originated text. Renders as the bare text.
    Server { text: String },
    /// User chat sent to a room.
    Send {
        text: String,
        time: DateTime<Local>,
        sender: String,
    },
    /// Direct message between two users. `to_receiver` selects which side of
    /// the exchange this copy renders as.
    Tell {
        text: String,
        time: DateTime<Local>,
        sender: String,
        receiver: String,
        to_receiver: bool,
    },
    /// Presence notice: someone entered a room.
    Join { name: String },
    /// Presence notice: someone left a room.
    Leave { name: String },
    /// Message posted through the REST endpoint, no client behind it.
    Rest {
        name: String,
        text: String,
        time: DateTime<Local>,
    },
}

impl Message {
    pub fn server(text: impl Into<String>) -> Self {
        Self::Server { text: text.into() }
    }

    pub fn send(text: impl Into<String>, sender: impl Into<String>) -> Self {
        Self::Send { text: text.into(), time: Local::now(), sender: sender.into() }
    }

    pub fn tell(
        text: impl Into<String>,
        sender: impl Into<String>,
        receiver: impl Into<String>,
        to_receiver: bool,
    ) -> Self {
        Self::Tell {
            text: text.into(),
            time: Local::now(),
            sender: sender.into(),
            receiver: receiver.into(),
            to_receiver,
        }
    }

    pub fn join(name: impl Into<String>) -> Self {
        Self::Join { name: name.into() }
    }

    pub fn leave(name: impl Into<String>) -> Self {
        Self::Leave { name: name.into() }
    }

    pub fn rest(name: impl Into<String>, text: impl Into<String>, time: DateTime<Local>) -> Self {
        Self::Rest { name: name.into(), text: text.into(), time }
    }

    /// Sender name for variants subject to block filtering.
    ///
    /// `Server`, `Join`, `Leave` and `Rest` cannot be blocked and return
    /// `None`.
    #[must_use]
    pub fn sender(&self) -> Option<&str> {
        match self {
            Self::Send { sender, .. } | Self::Tell { sender, .. } => Some(sender),
            _ => None,
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server { text } => write!(f, "{text}"),
            Self::Send { text, time, sender } => {
                write!(f, "{} [{}]: {}", time.format(CLOCK_FORMAT), sender, text)
            }
            Self::Tell { text, time, sender, receiver, to_receiver } => {
                if *to_receiver {
                    write!(f, "{} [From {}]>>>: {}", time.format(CLOCK_FORMAT), sender, text)
                } else {
                    write!(f, "{} <<<[To {}]: {}", time.format(CLOCK_FORMAT), receiver, text)
                }
            }
            Self::Join { name } => write!(f, "{name} has joined the room."),
            Self::Leave { name } => write!(f, "{name} leaves the room."),
            Self::Rest { name, text, time } => {
                write!(f, "{} [{}]: {}", time.format(CLOCK_FORMAT), name, text)
            }
        }
    }
}

// =============================================================================
// MESSAGE LIST
// =============================================================================

/// Default bound for both room history buffers and session outboxes.
pub const DEFAULT_CAPACITY: usize = 100;

/// Bounded FIFO of messages behind a mutex. Oldest entries drop on overflow.
#[derive(Debug)]
pub struct MessageList {
    capacity: usize,
    messages: Mutex<VecDeque<Message>>,
}

impl MessageList {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self { capacity, messages: Mutex::new(VecDeque::new()) }
    }

    /// Append a message, dropping the oldest entry when full.
    pub fn push(&self, msg: Message) {
        let mut messages = self.messages.lock().unwrap();
        while messages.len() >= self.capacity {
            messages.pop_front();
        }
        messages.push_back(msg);
    }

    /// Take every pending message, leaving the list empty.
    pub fn drain(&self) -> Vec<Message> {
        self.messages.lock().unwrap().drain(..).collect()
    }

    /// Render the current contents without consuming them.
    pub fn render(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().unwrap().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MessageList {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "message_test.rs"]
mod tests;
