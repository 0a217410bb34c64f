use async_trait::async_trait;

use super::*;
use crate::message::Message;

struct Stub(String);

#[async_trait]
impl Member for Stub {
    fn name(&self) -> &str {
        &self.0
    }

    async fn receive(&self, _msg: Message) {}
}

fn occupy(list: &RoomList, room: &str, member: &str) {
    let rm = match list.find_room(room) {
        Some(rm) => rm,
        None => {
            let rm = Arc::new(Room::new(room));
            list.add(rm.clone()).unwrap();
            rm
        }
    };
    rm.add(Arc::new(Stub(member.into())));
}

#[tokio::test]
async fn lobby_exists_from_the_start() {
    let list = RoomList::new(10);
    assert_eq!(list.who(), vec!["Lobby"]);
    assert!(list.find_room(LOBBY).is_some());
}

#[tokio::test]
async fn add_rejects_at_capacity() {
    let list = RoomList::new(2);
    assert!(list.add(Arc::new(Room::new("R1"))).is_ok());
    assert_eq!(list.add(Arc::new(Room::new("R2"))), Err(RoomError::MaxRooms));
    assert_eq!(list.len(), 2);
}

#[tokio::test]
async fn add_rejects_duplicate_names() {
    let list = RoomList::new(10);
    assert!(list.add(Arc::new(Room::new("R"))).is_ok());
    assert_eq!(list.add(Arc::new(Room::new("R"))), Err(RoomError::RoomExists));
}

#[tokio::test]
async fn who_is_sorted() {
    let list = RoomList::new(10);
    list.add(Arc::new(Room::new("zebra"))).unwrap();
    list.add(Arc::new(Room::new("alpha"))).unwrap();
    assert_eq!(list.who(), vec!["Lobby", "alpha", "zebra"]);
}

#[tokio::test]
async fn find_client_room_scans_memberships() {
    let list = RoomList::new(10);
    occupy(&list, "R", "Alice");

    assert_eq!(list.find_client_room("Alice").as_deref(), Some("R"));
    assert!(list.find_client_room("Bob").is_none());
    assert_eq!(list.get_client("Alice").unwrap().name(), "Alice");
}

#[tokio::test]
async fn close_empty_keeps_lobby_and_occupied_rooms() {
    let list = RoomList::new(10);
    occupy(&list, "busy", "Alice");
    list.add(Arc::new(Room::new("deserted"))).unwrap();

    list.close_empty();

    assert_eq!(list.who(), vec!["Lobby", "busy"]);
}

#[tokio::test(start_paused = true)]
async fn reaper_culls_within_a_minute() {
    let list = RoomList::new(10);
    tokio::task::yield_now().await;
    list.add(Arc::new(Room::new("Tmp"))).unwrap();
    assert_eq!(list.who(), vec!["Lobby", "Tmp"]);

    tokio::time::advance(Duration::from_secs(61)).await;
    tokio::task::yield_now().await;

    assert_eq!(list.who(), vec!["Lobby"]);

    // A fresh room with the same name can be created afterwards.
    assert!(list.add(Arc::new(Room::new("Tmp"))).is_ok());
}

#[tokio::test(start_paused = true)]
async fn close_stops_the_reaper() {
    let list = RoomList::new(10);
    list.close();
    tokio::task::yield_now().await;

    // With the reaper gone, empty rooms survive the sweep interval.
    list.add(Arc::new(Room::new("Tmp"))).unwrap();
    tokio::time::advance(Duration::from_secs(120)).await;
    tokio::task::yield_now().await;

    assert_eq!(list.who(), vec!["Lobby", "Tmp"]);
}
