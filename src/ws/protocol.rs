//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use glam::Vec3;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A position or euler-angle triple on the wire
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NetVec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl From<Vec3> for NetVec3 {
    fn from(v: Vec3) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
        }
    }
}

impl From<NetVec3> for Vec3 {
    fn from(v: NetVec3) -> Self {
        Vec3::new(v.x, v.y, v.z)
    }
}

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Local character entered a moving/orbiting block trigger
    BlockTriggerEnter { block_index: usize },

    /// Local character landed on a block; carries the block-relative offset
    CharacterLandedBlock {
        block_index: usize,
        relative_pos: NetVec3,
    },

    /// Local character left a block trigger mid-jump
    CharacterJumpOnBlock {
        block_index: usize,
        relative_pos: NetVec3,
    },

    /// Local character started or stopped attempting a jump on a block
    TryJump { value: bool },

    /// Local character landed on a static platform
    PlatformState,

    /// Local character fell into the fall-check trigger
    FallTriggerEnter,

    /// Local character jumped from a static platform towards a block
    TryJumpForMovingToBlock {
        /// Position on the platform the jump started from
        platform_pos: NetVec3,
        /// Offset travelled since the jump started
        relative_pos: NetVec3,
    },

    /// Periodic transform report for the authoritative player record
    ChangedTransform {
        position: NetVec3,
        rotation: NetVec3,
    },

    /// Locomotion state code report from the external character controller
    ChangedState { state: i32 },

    /// Ping for latency measurement
    Ping { t: u64 },
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome { session_id: Uuid, server_time: u64 },

    /// Timestamp pair seeding the client's room clock, sent once on join
    ServerTimestamp {
        room_start_timestamp: u64,
        join_timestamp: u64,
    },

    /// Confirmation of room join with the authoritative player list
    RoomJoined {
        room_id: Uuid,
        players: Vec<PlayerInfo>,
    },

    /// A remote character entered a block trigger
    BlockTriggerEnter {
        session_id: Uuid,
        block_index: usize,
    },

    /// A remote character landed on a block
    CharacterLandedBlock {
        session_id: Uuid,
        block_index: usize,
        relative_pos: NetVec3,
    },

    /// A remote character jumped off a block
    CharacterJumpOnBlock {
        session_id: Uuid,
        block_index: usize,
        relative_pos: NetVec3,
    },

    /// A remote character landed on a static platform
    PlatformState { session_id: Uuid },

    /// A remote character fell into the fall-check trigger
    FallTriggerEnter { session_id: Uuid },

    /// A remote character jumped from a static platform towards a block
    TryJumpForMovingToBlock {
        session_id: Uuid,
        platform_pos: NetVec3,
        relative_pos: NetVec3,
    },

    /// A session left the room
    LeavePlayer { session_id: Uuid },

    /// Error message
    Error { code: String, message: String },

    /// Pong response
    Pong { t: u64 },
}

/// Authoritative per-player summary, sent to late joiners
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub session_id: Uuid,
    pub block_index: Option<usize>,
    pub on_block: bool,
}

/// Locomotion state codes are opaque values supplied by the external
/// character controller; two of them are known to indicate an in-flight
/// jump and gate the jump broadcast.
pub mod locomotion {
    const JUMP_INDICATING_CODES: [i32; 2] = [4, 5];

    pub fn indicates_jump(code: i32) -> bool {
        JUMP_INDICATING_CODES.contains(&code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_msg_round_trips_as_tagged_json() {
        let msg = ClientMsg::CharacterLandedBlock {
            block_index: 2,
            relative_pos: NetVec3 {
                x: 0.5,
                y: -1.0,
                z: 2.0,
            },
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"character_landed_block\""));
        let back: ClientMsg = serde_json::from_str(&json).unwrap();
        match back {
            ClientMsg::CharacterLandedBlock { block_index, relative_pos } => {
                assert_eq!(block_index, 2);
                assert_eq!(relative_pos.z, 2.0);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn jump_codes_are_recognized() {
        assert!(locomotion::indicates_jump(4));
        assert!(locomotion::indicates_jump(5));
        assert!(!locomotion::indicates_jump(0));
        assert!(!locomotion::indicates_jump(3));
    }
}
