//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor and
//! cloned into the telnet accept loop. It holds the process-wide singletons:
//! the room directory, the HTTP session map, the data-backend factory, the
//! chat log, and the CORS origin.

use std::sync::Arc;

use crate::chatlog::ChatLog;
use crate::data::DataFactory;
use crate::roomlist::RoomList;
use crate::session::ClientMap;

#[derive(Clone)]
pub struct AppState {
    pub rooms: Arc<RoomList>,
    pub sessions: ClientMap,
    pub data: DataFactory,
    pub chatlog: ChatLog,
    pub origin: String,
}

impl AppState {
    #[must_use]
    pub fn new(
        rooms: Arc<RoomList>,
        sessions: ClientMap,
        data: DataFactory,
        chatlog: ChatLog,
        origin: impl Into<String>,
    ) -> Self {
        Self { rooms, sessions, data, chatlog, origin: origin.into() }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
