//! Room state and authoritative relay loop
//!
//! One task per room. Inbound messages are handled to completion in the
//! order received, the elapsed-time clock ticks between message batches,
//! and everything a client needs to mirror a remote player is relayed as a
//! broadcast with except-sender semantics. There is no acknowledgement or
//! retry; a dropped message is recovered by the next state-changing event.

use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::interval;
use tracing::{info, warn};
use uuid::Uuid;

use crate::util::time::{room_tick_delta, unix_millis, ROOM_TICK_DURATION_MICROS};
use crate::ws::protocol::{locomotion, ClientMsg, NetVec3, PlayerInfo, ServerMsg};

/// Who an outbound message is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryScope {
    All,
    /// Everyone but the original sender
    Except(Uuid),
    /// A single session (join-time messages, pongs, errors)
    Only(Uuid),
}

/// A message leaving the room, tagged with its delivery scope. Each
/// connection's writer filters on the scope.
#[derive(Debug, Clone)]
pub struct Outbound {
    pub scope: DeliveryScope,
    pub msg: ServerMsg,
}

impl Outbound {
    pub fn delivers_to(&self, session: Uuid) -> bool {
        match self.scope {
            DeliveryScope::All => true,
            DeliveryScope::Except(excluded) => excluded != session,
            DeliveryScope::Only(target) => target == session,
        }
    }
}

/// Input delivered to a room task.
#[derive(Debug)]
pub enum RoomInput {
    Join { session_id: Uuid },
    Leave { session_id: Uuid },
    Message { session_id: Uuid, msg: ClientMsg },
}

/// Authoritative per-player state
#[derive(Debug, Clone)]
pub struct RoomPlayer {
    pub session_id: Uuid,
    pub block_index: Option<usize>,
    pub on_block: bool,
    /// Single-use gate for the jump broadcast
    pub try_jump: bool,
    pub locomotion_state: i32,
    pub position: NetVec3,
    pub rotation: NetVec3,
    pub joined_at: u64,
}

impl RoomPlayer {
    fn new(session_id: Uuid, joined_at: u64) -> Self {
        Self {
            session_id,
            block_index: None,
            on_block: false,
            try_jump: false,
            locomotion_state: 0,
            position: NetVec3::default(),
            rotation: NetVec3::default(),
            joined_at,
        }
    }
}

/// Room state (owned by the room task)
pub struct RoomState {
    pub id: Uuid,
    pub players: HashMap<Uuid, RoomPlayer>,
    /// Wall-clock moment the first player joined; the zero point of elapsed
    /// room time
    pub room_start_timestamp: Option<u64>,
    pub elapsed_time: f64,
    pub max_players: usize,
}

impl RoomState {
    fn new(id: Uuid, max_players: usize) -> Self {
        Self {
            id,
            players: HashMap::new(),
            room_start_timestamp: None,
            elapsed_time: 0.0,
            max_players,
        }
    }
}

/// Handle to a running room
#[derive(Clone)]
pub struct RoomHandle {
    pub id: Uuid,
    pub input_tx: mpsc::Sender<RoomInput>,
    pub outbound_tx: broadcast::Sender<Outbound>,
    pub player_count: Arc<std::sync::atomic::AtomicUsize>,
}

impl RoomHandle {
    pub fn player_count(&self) -> usize {
        self.player_count.load(std::sync::atomic::Ordering::Relaxed)
    }
}

/// Registry of all active rooms
pub struct RoomRegistry {
    rooms: DashMap<Uuid, RoomHandle>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<RoomHandle> {
        self.rooms.get(id).map(|r| r.value().clone())
    }

    pub fn insert(&self, handle: RoomHandle) {
        self.rooms.insert(handle.id, handle);
    }

    pub fn remove(&self, id: &Uuid) -> Option<RoomHandle> {
        self.rooms.remove(id).map(|(_, h)| h)
    }

    pub fn active_rooms(&self) -> usize {
        self.rooms.len()
    }

    pub fn total_players(&self) -> usize {
        self.rooms.iter().map(|r| r.value().player_count()).sum()
    }

    /// Find a room with a free slot
    pub fn find_available_room(&self, max_players: usize) -> Option<RoomHandle> {
        for entry in self.rooms.iter() {
            if entry.value().player_count() < max_players {
                return Some(entry.value().clone());
            }
        }
        None
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The authoritative room
pub struct GameRoom {
    state: RoomState,
    input_rx: mpsc::Receiver<RoomInput>,
    outbound_tx: broadcast::Sender<Outbound>,
    player_count: Arc<std::sync::atomic::AtomicUsize>,
}

impl GameRoom {
    pub fn new(id: Uuid, max_players: usize) -> (Self, RoomHandle) {
        let (input_tx, input_rx) = mpsc::channel(256);
        let (outbound_tx, _) = broadcast::channel(128);
        let player_count = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let handle = RoomHandle {
            id,
            input_tx,
            outbound_tx: outbound_tx.clone(),
            player_count: player_count.clone(),
        };

        let room = Self {
            state: RoomState::new(id, max_players),
            input_rx,
            outbound_tx,
            player_count,
        };

        (room, handle)
    }

    pub fn elapsed_time(&self) -> f64 {
        self.state.elapsed_time
    }

    pub fn room_start_timestamp(&self) -> Option<u64> {
        self.state.room_start_timestamp
    }

    pub fn player(&self, session: Uuid) -> Option<&RoomPlayer> {
        self.state.players.get(&session)
    }

    /// Run the room relay loop
    pub async fn run(mut self) {
        info!(room_id = %self.state.id, "Room started");

        let tick_duration = Duration::from_micros(ROOM_TICK_DURATION_MICROS);
        let mut ticker = interval(tick_duration);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            // handle the pending message batch to completion, in order
            self.process_inputs();

            // elapsed room time advances between message batches
            self.tick_clock();

            if self.state.players.is_empty() && self.state.room_start_timestamp.is_some() {
                info!(room_id = %self.state.id, "All players left, closing room");
                break;
            }
        }
    }

    fn process_inputs(&mut self) {
        while let Ok(input) = self.input_rx.try_recv() {
            self.handle_input(input);
        }
    }

    /// Handle one inbound room input to completion.
    pub fn handle_input(&mut self, input: RoomInput) {
        match input {
            RoomInput::Join { session_id } => self.handle_join(session_id),
            RoomInput::Leave { session_id } => self.handle_leave(session_id),
            RoomInput::Message { session_id, msg } => self.handle_message(session_id, msg),
        }
    }

    /// Advance the room clock by one tick once the room has started.
    pub fn tick_clock(&mut self) {
        if self.state.room_start_timestamp.is_some() {
            self.state.elapsed_time += room_tick_delta();
        }
    }

    fn handle_join(&mut self, session_id: Uuid) {
        if self.state.players.contains_key(&session_id) {
            warn!(session_id = %session_id, "Session already in room");
            return;
        }

        if self.state.players.len() >= self.state.max_players {
            self.send(
                DeliveryScope::Only(session_id),
                ServerMsg::Error {
                    code: "room_full".to_string(),
                    message: "Room is full".to_string(),
                },
            );
            return;
        }

        let now = unix_millis();
        // the first join is the zero point of elapsed room time
        let room_start = *self.state.room_start_timestamp.get_or_insert(now);

        // seed the joiner's clock before any platform message matters
        self.send(
            DeliveryScope::Only(session_id),
            ServerMsg::ServerTimestamp {
                room_start_timestamp: room_start,
                join_timestamp: now,
            },
        );

        self.state
            .players
            .insert(session_id, RoomPlayer::new(session_id, now));
        self.player_count
            .store(self.state.players.len(), std::sync::atomic::Ordering::Relaxed);

        // authoritative player list so a late joiner can catch up on riders
        let players: Vec<PlayerInfo> = self
            .state
            .players
            .values()
            .filter(|p| p.session_id != session_id)
            .map(|p| PlayerInfo {
                session_id: p.session_id,
                block_index: p.block_index,
                on_block: p.on_block,
            })
            .collect();
        self.send(
            DeliveryScope::Only(session_id),
            ServerMsg::RoomJoined {
                room_id: self.state.id,
                players,
            },
        );

        info!(
            room_id = %self.state.id,
            session_id = %session_id,
            player_count = self.state.players.len(),
            "Session joined room"
        );
    }

    fn handle_leave(&mut self, session_id: Uuid) {
        if self.state.players.remove(&session_id).is_some() {
            self.player_count
                .store(self.state.players.len(), std::sync::atomic::Ordering::Relaxed);

            self.send(DeliveryScope::All, ServerMsg::LeavePlayer { session_id });

            info!(
                room_id = %self.state.id,
                session_id = %session_id,
                "Session left room"
            );
        }
    }

    fn handle_message(&mut self, session_id: Uuid, msg: ClientMsg) {
        let Some(player) = self.state.players.get_mut(&session_id) else {
            // unknown session: ignore and wait for the next consistent event
            return;
        };

        let reply = match msg {
            ClientMsg::BlockTriggerEnter { block_index } => {
                player.block_index = Some(block_index);
                player.on_block = true;
                Some(Outbound {
                    scope: DeliveryScope::Except(session_id),
                    msg: ServerMsg::BlockTriggerEnter {
                        session_id,
                        block_index,
                    },
                })
            }

            ClientMsg::CharacterLandedBlock {
                block_index,
                relative_pos,
            } => {
                player.block_index = Some(block_index);
                Some(Outbound {
                    scope: DeliveryScope::Except(session_id),
                    msg: ServerMsg::CharacterLandedBlock {
                        session_id,
                        block_index,
                        relative_pos,
                    },
                })
            }

            ClientMsg::CharacterJumpOnBlock {
                block_index,
                relative_pos,
            } => {
                player.block_index = Some(block_index);
                // the single-use gate that prevents duplicate jump broadcasts
                if player.try_jump {
                    player.try_jump = false;
                    Some(Outbound {
                        scope: DeliveryScope::Except(session_id),
                        msg: ServerMsg::CharacterJumpOnBlock {
                            session_id,
                            block_index,
                            relative_pos,
                        },
                    })
                } else {
                    None
                }
            }

            ClientMsg::TryJump { value } => {
                player.try_jump = value;
                None
            }

            ClientMsg::PlatformState => {
                player.on_block = false;
                Some(Outbound {
                    scope: DeliveryScope::Except(session_id),
                    msg: ServerMsg::PlatformState { session_id },
                })
            }

            ClientMsg::FallTriggerEnter => Some(Outbound {
                scope: DeliveryScope::Except(session_id),
                msg: ServerMsg::FallTriggerEnter { session_id },
            }),

            ClientMsg::TryJumpForMovingToBlock {
                platform_pos,
                relative_pos,
            } => Some(Outbound {
                scope: DeliveryScope::Except(session_id),
                msg: ServerMsg::TryJumpForMovingToBlock {
                    session_id,
                    platform_pos,
                    relative_pos,
                },
            }),

            ClientMsg::ChangedTransform { position, rotation } => {
                player.position = position;
                player.rotation = rotation;
                None
            }

            ClientMsg::ChangedState { state } => {
                player.locomotion_state = state;
                if player.on_block && locomotion::indicates_jump(state) {
                    player.try_jump = true;
                }
                None
            }

            ClientMsg::Ping { t } => Some(Outbound {
                scope: DeliveryScope::Only(session_id),
                msg: ServerMsg::Pong { t },
            }),
        };

        if let Some(outbound) = reply {
            let _ = self.outbound_tx.send(outbound);
        }
    }

    fn send(&self, scope: DeliveryScope, msg: ServerMsg) {
        let _ = self.outbound_tx.send(Outbound { scope, msg });
    }
}
