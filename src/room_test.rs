use std::sync::Mutex;

use super::*;

/// Member double that records everything it receives.
struct Recorder {
    name: String,
    received: Mutex<Vec<Message>>,
    blocking: Vec<String>,
}

impl Recorder {
    fn new(name: &str) -> Arc<Self> {
        Arc::new(Self { name: name.into(), received: Mutex::new(Vec::new()), blocking: Vec::new() })
    }

    fn blocking(name: &str, blocked: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            received: Mutex::new(Vec::new()),
            blocking: blocked.iter().map(|s| (*s).to_owned()).collect(),
        })
    }

    fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().iter().map(ToString::to_string).collect()
    }
}

#[async_trait]
impl Member for Recorder {
    fn name(&self) -> &str {
        &self.name
    }

    async fn receive(&self, msg: Message) {
        if let Some(sender) = msg.sender() {
            if self.blocking.iter().any(|b| b == sender) {
                return;
            }
        }
        self.received.lock().unwrap().push(msg);
    }

    async fn blocks(&self, name: &str) -> bool {
        self.blocking.iter().any(|b| b == name)
    }
}

// =============================================================================
// ClientList
// =============================================================================

#[test]
fn list_add_present_get() {
    let list = ClientList::new();
    list.add(Recorder::new("Alice"));
    assert!(list.present("Alice"));
    assert!(!list.present("Bob"));
    assert_eq!(list.get("Alice").unwrap().name(), "Alice");
    assert!(list.get("Bob").is_none());
    assert_eq!(list.len(), 1);
}

#[test]
fn list_remove_by_name_removes_all_matches() {
    let list = ClientList::new();
    list.add(Recorder::new("Alice"));
    list.add(Recorder::new("Bob"));
    list.add(Recorder::new("Alice"));

    let gone = Recorder::new("Alice");
    assert!(list.remove(gone.as_ref()));
    assert_eq!(list.len(), 1);
    assert!(!list.present("Alice"));

    // A second remove finds nothing.
    assert!(!list.remove(gone.as_ref()));
}

#[test]
fn list_names_are_sorted() {
    let list = ClientList::new();
    list.add(Recorder::new("carol"));
    list.add(Recorder::new("alice"));
    list.add(Recorder::new("bob"));
    assert_eq!(list.names(), vec!["alice", "bob", "carol"]);
}

// =============================================================================
// Room fan-out
// =============================================================================

#[tokio::test]
async fn send_reaches_every_member_including_sender() {
    let room = Room::new("R");
    let alice = Recorder::new("Alice");
    let bob = Recorder::new("Bob");
    room.add(alice.clone());
    room.add(bob.clone());

    room.send(Message::send("hi all", "Alice")).await;

    assert_eq!(alice.received().len(), 1, "sender loopback");
    assert_eq!(bob.received().len(), 1);
}

#[tokio::test]
async fn send_records_history_for_rest() {
    let room = Room::new("R");
    room.send(Message::server("first")).await;
    room.send(Message::server("second")).await;
    assert_eq!(room.recent_messages(), vec!["first", "second"]);
}

#[tokio::test]
async fn blocked_sender_is_filtered_by_member_not_room() {
    let room = Room::new("R");
    let alice = Recorder::blocking("Alice", &["Bob"]);
    let bob = Recorder::new("Bob");
    room.add(alice.clone());
    room.add(bob.clone());

    room.send(Message::send("Hi", "Bob")).await;

    assert!(alice.received().is_empty(), "Alice blocks Bob");
    assert_eq!(bob.received().len(), 1, "Bob sees his own message");
    // History still records the message; blocking is per-recipient.
    assert_eq!(room.recent_messages().len(), 1);
}

#[tokio::test]
async fn presence_notices_bypass_blocks() {
    let room = Room::new("R");
    let alice = Recorder::blocking("Alice", &["Bob"]);
    room.add(alice.clone());

    room.send(Message::join("Bob")).await;
    room.send(Message::leave("Bob")).await;
    room.tell("server notice").await;

    assert_eq!(alice.received().len(), 3);
}

#[tokio::test]
async fn members_see_sends_in_one_order() {
    let room = Room::new("R");
    let alice = Recorder::new("Alice");
    let bob = Recorder::new("Bob");
    room.add(alice.clone());
    room.add(bob.clone());

    for i in 0..5 {
        room.send(Message::server(format!("m{i}"))).await;
    }

    assert_eq!(alice.received(), bob.received());
    assert_eq!(alice.received(), vec!["m0", "m1", "m2", "m3", "m4"]);
}

#[test]
fn room_equality_is_by_name() {
    assert!(Room::new("R") == Room::new("R"));
    assert!(Room::new("R") != Room::new("S"));
}

#[test]
fn empty_room_reports_empty() {
    let room = Room::new("R");
    assert!(room.is_empty());
    room.add(Recorder::new("Alice"));
    assert!(!room.is_empty());
    assert_eq!(room.who(), vec!["Alice"]);
}
