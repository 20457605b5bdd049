//! Room assignment - routes connecting sessions into rooms
//!
//! Sessions join the first room with a free slot; a new room is spawned on
//! demand and removed from the registry when its task ends.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};
use uuid::Uuid;

use super::room::{GameRoom, Outbound, RoomHandle, RoomInput, RoomRegistry};

/// Room assignment service
pub struct RoomService {
    registry: Arc<RoomRegistry>,
    /// Map of session -> current room
    session_rooms: DashMap<Uuid, Uuid>,
    max_players: usize,
}

impl RoomService {
    pub fn new(registry: Arc<RoomRegistry>, max_players: usize) -> Self {
        Self {
            registry,
            session_rooms: DashMap::new(),
            max_players,
        }
    }

    /// Put a session into a room, creating one if every room is full.
    /// Returns the room id plus the channels for the connection task. The
    /// outbound subscription is taken before the join is enqueued so the
    /// joiner sees its own timestamp message.
    pub async fn join(
        &self,
        session_id: Uuid,
    ) -> (Uuid, mpsc::Sender<RoomInput>, broadcast::Receiver<Outbound>) {
        let handle = match self.registry.find_available_room(self.max_players) {
            Some(handle) => handle,
            None => self.spawn_room(),
        };

        self.session_rooms.insert(session_id, handle.id);
        let outbound_rx = handle.outbound_tx.subscribe();

        if handle
            .input_tx
            .send(RoomInput::Join { session_id })
            .await
            .is_err()
        {
            warn!(session_id = %session_id, room_id = %handle.id, "Room task gone during join");
        }

        (handle.id, handle.input_tx.clone(), outbound_rx)
    }

    /// Remove a session from its room (called when the connection closes).
    pub async fn leave(&self, session_id: Uuid) {
        if let Some((_, room_id)) = self.session_rooms.remove(&session_id) {
            if let Some(handle) = self.registry.get(&room_id) {
                let _ = handle.input_tx.send(RoomInput::Leave { session_id }).await;
            }
            info!(session_id = %session_id, room_id = %room_id, "Session unregistered");
        }
    }

    pub fn room_of(&self, session_id: &Uuid) -> Option<Uuid> {
        self.session_rooms.get(session_id).map(|r| *r)
    }

    pub fn session_count(&self) -> usize {
        self.session_rooms.len()
    }

    fn spawn_room(&self) -> RoomHandle {
        let room_id = Uuid::new_v4();
        let (room, handle) = GameRoom::new(room_id, self.max_players);
        self.registry.insert(handle.clone());

        let registry = self.registry.clone();
        tokio::spawn(async move {
            room.run().await;
            registry.remove(&room_id);
            info!(room_id = %room_id, "Room removed from registry");
        });

        info!(room_id = %room_id, "Created new room");
        handle
    }
}
