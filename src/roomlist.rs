//! Room directory — creation, lookup, and the empty-room reaper.
//!
//! DESIGN
//! ======
//! The list owns every live room. Creation and the reaper's culls are the
//! only mutators, so the invariants are local: the count never exceeds the
//! configured maximum, "Lobby" is always present, and names are unique.
//! The reaper wakes once a minute and removes rooms with no members;
//! `close` hands it a permit so shutdown is observed on the next wake even
//! if it races a sweep.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::room::{Member, Room};

/// The permanent default room every client can fall back to.
pub const LOBBY: &str = "Lobby";

const REAP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    #[error("can't create room: there are already the maximum number of rooms")]
    MaxRooms,
    #[error("a room with that name already exists")]
    RoomExists,
}

pub struct RoomList {
    max_rooms: usize,
    rooms: Mutex<Vec<Arc<Room>>>,
    shutdown: Notify,
}

impl RoomList {
    /// Create the directory with its Lobby and start the reaper task.
    /// Requires a tokio runtime.
    #[must_use]
    pub fn new(max_rooms: usize) -> Arc<Self> {
        let list = Arc::new(Self {
            max_rooms: max_rooms.max(1),
            rooms: Mutex::new(vec![Arc::new(Room::new(LOBBY))]),
            shutdown: Notify::new(),
        });

        tokio::spawn(reap_loop(Arc::clone(&list)));
        list
    }

    /// Register a room. Fails when the directory is full or the name is
    /// already taken.
    pub fn add(&self, room: Arc<Room>) -> Result<(), RoomError> {
        let mut rooms = self.rooms.lock().unwrap();
        if rooms.len() >= self.max_rooms {
            return Err(RoomError::MaxRooms);
        }
        if rooms.iter().any(|r| r.name() == room.name()) {
            return Err(RoomError::RoomExists);
        }
        rooms.push(room);
        Ok(())
    }

    pub fn find_room(&self, name: &str) -> Option<Arc<Room>> {
        self.rooms
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.name() == name)
            .cloned()
    }

    /// Name of the room a client called `name` currently occupies.
    pub fn find_client_room(&self, name: &str) -> Option<String> {
        self.rooms
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.present(name))
            .map(|r| r.name().to_owned())
    }

    /// First member called `name` in any room.
    pub fn get_client(&self, name: &str) -> Option<Arc<dyn Member>> {
        self.rooms
            .lock()
            .unwrap()
            .iter()
            .find_map(|r| r.get_client(name))
    }

    /// Remove every memberless room except the Lobby.
    pub fn close_empty(&self) {
        let mut rooms = self.rooms.lock().unwrap();
        let before = rooms.len();
        rooms.retain(|r| r.name() == LOBBY || !r.is_empty());
        let culled = before - rooms.len();
        if culled > 0 {
            debug!(culled, "reaped empty rooms");
        }
    }

    /// Sorted names of all rooms.
    pub fn who(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .rooms
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.name().to_owned())
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.rooms.lock().unwrap().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop the reaper. The signal is retained, so a sweep in flight still
    /// observes it.
    pub fn close(&self) {
        self.shutdown.notify_one();
    }
}

async fn reap_loop(list: Arc<RoomList>) {
    let mut ticker = tokio::time::interval(REAP_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker.tick().await; // the first tick completes immediately

    loop {
        tokio::select! {
            _ = list.shutdown.notified() => break,
            _ = ticker.tick() => list.close_empty(),
        }
    }
    info!("room reaper stopped");
}

#[cfg(test)]
#[path = "roomlist_test.rs"]
mod tests;
