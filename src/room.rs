//! Room — membership plus fan-out delivery.
//!
//! DESIGN
//! ======
//! A room is a name, a mutex-guarded member list, and a bounded buffer of
//! recent traffic kept only for the REST polling endpoint (live clients do
//! not replay history on join). Fan-out snapshots the membership under the
//! lock, releases it, then delivers to each member in membership order —
//! a member whose transport is slow must never stall the room.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::message::{Message, MessageList};

// =============================================================================
// MEMBER
// =============================================================================

/// Capability surface a room needs from its occupants.
///
/// Member equality is by name throughout.
#[async_trait]
pub trait Member: Send + Sync {
    fn name(&self) -> &str;

    /// Deliver a message to this member. Implementations apply their own
    /// block filtering before forwarding to the transport.
    async fn receive(&self, msg: Message);

    /// Whether this member is blocking `name`. Lets `tell` report the
    /// rejection instead of silently dropping.
    async fn blocks(&self, _name: &str) -> bool {
        false
    }
}

// =============================================================================
// CLIENT LIST
// =============================================================================

/// Ordered, mutex-guarded list of room members.
#[derive(Default)]
pub struct ClientList {
    members: Mutex<Vec<Arc<dyn Member>>>,
}

impl ClientList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, member: Arc<dyn Member>) {
        self.members.lock().unwrap().push(member);
    }

    /// Remove every entry whose name equals `member`'s. Returns whether any
    /// entry was removed.
    pub fn remove(&self, member: &dyn Member) -> bool {
        let mut members = self.members.lock().unwrap();
        let before = members.len();
        members.retain(|m| m.name() != member.name());
        members.len() != before
    }

    pub fn present(&self, name: &str) -> bool {
        self.members.lock().unwrap().iter().any(|m| m.name() == name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Member>> {
        self.members
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.name() == name)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.members.lock().unwrap().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted snapshot of member names.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .members
            .lock()
            .unwrap()
            .iter()
            .map(|m| m.name().to_owned())
            .collect();
        names.sort();
        names
    }

    /// Membership snapshot in insertion order, for lock-free fan-out.
    pub fn snapshot(&self) -> Vec<Arc<dyn Member>> {
        self.members.lock().unwrap().clone()
    }
}

// =============================================================================
// ROOM
// =============================================================================

pub struct Room {
    name: String,
    clients: ClientList,
    messages: MessageList,
    /// Serialises fan-outs so every member observes one delivery order.
    delivery: tokio::sync::Mutex<()>,
}

impl Room {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            clients: ClientList::new(),
            messages: MessageList::new(),
            delivery: tokio::sync::Mutex::new(()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add(&self, member: Arc<dyn Member>) {
        self.clients.add(member);
    }

    pub fn remove(&self, member: &dyn Member) -> bool {
        self.clients.remove(member)
    }

    pub fn present(&self, name: &str) -> bool {
        self.clients.present(name)
    }

    pub fn get_client(&self, name: &str) -> Option<Arc<dyn Member>> {
        self.clients.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Sorted names of the current members.
    pub fn who(&self) -> Vec<String> {
        self.clients.names()
    }

    /// Fan a message out to every current member, then record it in the
    /// recent-messages buffer. The sender, if a member, receives its own
    /// message back (loopback). The membership lock is held for the
    /// snapshot only; the delivery lock is held for the whole fan-out, so
    /// concurrent sends reach all members in one shared order.
    pub async fn send(&self, msg: Message) {
        let _ordered = self.delivery.lock().await;
        let members = self.clients.snapshot();
        for member in members {
            member.receive(msg.clone()).await;
        }
        self.messages.push(msg);
    }

    /// Send a server notice to the room.
    pub async fn tell(&self, text: impl Into<String>) {
        self.send(Message::server(text)).await;
    }

    /// Rendered recent traffic, for REST consumers.
    pub fn recent_messages(&self) -> Vec<String> {
        self.messages.render()
    }
}

impl PartialEq for Room {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

#[cfg(test)]
#[path = "room_test.rs"]
mod tests;
