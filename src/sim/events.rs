//! Local-player event tracking
//!
//! Translates the trigger/raycast callbacks delivered by the external
//! physics layer into outbound room messages, with the debouncing the
//! protocol relies on: a platform landing is reported once per platform, a
//! block landing once per boarding, and the platform-to-block jump
//! detection cannot double-fire while airborne.

use glam::Vec3;

use crate::ws::protocol::{locomotion, ClientMsg, NetVec3};

use super::platform::Platform;

/// Collider tags delivered by the external trigger-detection component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColliderTag {
    Platform,
    MovingBlock,
    OrbitingBlock,
    FallCheckTrigger,
}

/// Per-local-player tracker feeding the room connection.
#[derive(Debug)]
pub struct LocalEventTracker {
    prev_landed_platform: Option<u64>,
    prev_landed_block: Option<usize>,
    /// Block the character just stepped on, waiting for the trigger-stay
    /// callback to measure the relative vector
    pending_block_landing: Option<usize>,
    jumping_from_platform: bool,
    can_check_platform_jump: bool,
    /// Position on the platform where the current jump started
    jump_position: Vec3,
    /// Relative vector captured while airborne over a block
    relative_at_jump: Vec3,
    /// Set while a resync teleport is settling; trigger exits are ignored
    pub suppress_trigger_exit: bool,
}

impl LocalEventTracker {
    pub fn new() -> Self {
        Self {
            prev_landed_platform: None,
            prev_landed_block: None,
            pending_block_landing: None,
            jumping_from_platform: false,
            can_check_platform_jump: true,
            jump_position: Vec3::ZERO,
            relative_at_jump: Vec3::ZERO,
            suppress_trigger_exit: false,
        }
    }

    /// Downward raycast result for the current frame.
    pub fn ground_ray_hit(&mut self, tag: ColliderTag, character_pos: Vec3) -> Option<ClientMsg> {
        match tag {
            ColliderTag::FallCheckTrigger => {
                self.prev_landed_platform = None;
                if self.can_check_platform_jump {
                    self.can_check_platform_jump = false;
                    self.jumping_from_platform = true;
                    let relative = character_pos - self.jump_position;
                    return Some(ClientMsg::TryJumpForMovingToBlock {
                        platform_pos: NetVec3::from(self.jump_position),
                        relative_pos: NetVec3::from(relative),
                    });
                }
                None
            }
            ColliderTag::Platform => {
                // went airborne but came back down over the platform
                if self.jumping_from_platform {
                    self.can_check_platform_jump = true;
                    self.jumping_from_platform = false;
                    self.prev_landed_block = None;
                }
                None
            }
            _ => None,
        }
    }

    /// Collider contact under the character's feet.
    pub fn collider_hit(
        &mut self,
        tag: ColliderTag,
        object_id: u64,
        surface_height: f32,
        character_pos: Vec3,
    ) -> Option<ClientMsg> {
        match tag {
            ColliderTag::MovingBlock | ColliderTag::OrbitingBlock => {
                let block_index = object_id as usize;
                if self.prev_landed_block != Some(block_index) {
                    self.pending_block_landing = Some(block_index);
                }
                self.prev_landed_block = Some(block_index);
                None
            }
            ColliderTag::Platform => {
                let msg = if self.prev_landed_platform != Some(object_id) {
                    self.jumping_from_platform = false;
                    self.can_check_platform_jump = true;
                    self.prev_landed_platform = Some(object_id);
                    self.prev_landed_block = None;
                    Some(ClientMsg::PlatformState)
                } else {
                    None
                };
                self.jump_position =
                    Vec3::new(character_pos.x, surface_height, character_pos.z);
                msg
            }
            ColliderTag::FallCheckTrigger => None,
        }
    }

    /// Character entered a block's trigger volume.
    pub fn block_trigger_enter(&mut self, block_index: usize) -> ClientMsg {
        ClientMsg::BlockTriggerEnter { block_index }
    }

    /// Character remains inside a block's trigger volume this frame.
    pub fn block_trigger_stay(
        &mut self,
        platform: &Platform,
        character_pos: Vec3,
        locomotion_state: i32,
    ) -> Option<ClientMsg> {
        if self.pending_block_landing == Some(platform.index) {
            self.pending_block_landing = None;
            let relative = platform.position - character_pos;
            return Some(ClientMsg::CharacterLandedBlock {
                block_index: platform.index,
                relative_pos: NetVec3::from(relative),
            });
        }
        if locomotion::indicates_jump(locomotion_state) {
            self.relative_at_jump = platform.position - character_pos;
        }
        None
    }

    /// Character left a block's trigger volume.
    pub fn block_trigger_exit(&mut self, block_index: usize) -> Option<ClientMsg> {
        if self.suppress_trigger_exit {
            return None;
        }
        Some(ClientMsg::CharacterJumpOnBlock {
            block_index,
            relative_pos: NetVec3::from(self.relative_at_jump),
        })
    }

    /// Character body entered the fall-check trigger volume.
    pub fn fall_trigger_enter(&mut self) -> ClientMsg {
        self.prev_landed_platform = None;
        ClientMsg::FallTriggerEnter
    }
}

impl Default for LocalEventTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_landing_reported_once_per_platform() {
        let mut tracker = LocalEventTracker::new();
        let pos = Vec3::new(1.0, 0.0, 1.0);

        let first = tracker.collider_hit(ColliderTag::Platform, 7, 1.0, pos);
        assert!(matches!(first, Some(ClientMsg::PlatformState)));
        // staying on the same platform stays quiet
        assert!(tracker.collider_hit(ColliderTag::Platform, 7, 1.0, pos).is_none());
        // a different platform reports again
        let second = tracker.collider_hit(ColliderTag::Platform, 8, 1.0, pos);
        assert!(matches!(second, Some(ClientMsg::PlatformState)));
    }

    #[test]
    fn platform_jump_detection_fires_once_while_airborne() {
        let mut tracker = LocalEventTracker::new();
        let _ = tracker.collider_hit(ColliderTag::Platform, 1, 2.0, Vec3::new(0.0, 1.8, 0.0));

        let char_pos = Vec3::new(0.5, 2.4, 0.5);
        let msg = tracker.ground_ray_hit(ColliderTag::FallCheckTrigger, char_pos);
        match msg {
            Some(ClientMsg::TryJumpForMovingToBlock {
                platform_pos,
                relative_pos,
            }) => {
                assert_eq!(Vec3::from(platform_pos), Vec3::new(0.0, 2.0, 0.0));
                assert_eq!(Vec3::from(relative_pos), char_pos - Vec3::new(0.0, 2.0, 0.0));
            }
            other => panic!("unexpected: {other:?}"),
        }

        // still airborne over the gap: no duplicate
        assert!(tracker
            .ground_ray_hit(ColliderTag::FallCheckTrigger, char_pos)
            .is_none());

        // back over the platform re-arms the check
        assert!(tracker.ground_ray_hit(ColliderTag::Platform, char_pos).is_none());
        assert!(tracker
            .ground_ray_hit(ColliderTag::FallCheckTrigger, char_pos)
            .is_some());
    }

    #[test]
    fn block_landing_measured_on_next_trigger_stay() {
        use crate::sim::platform::{LinearParams, PlatformKind};
        use glam::Quat;

        let platform = Platform::new(
            3,
            PlatformKind::Linear(LinearParams {
                start_position: Vec3::new(5.0, 1.0, 0.0),
                start_rotation: Quat::IDENTITY,
                move_speed: Vec3::ZERO,
                time_to_move: 1.0,
            }),
            1.5,
        );

        let mut tracker = LocalEventTracker::new();
        let _ = tracker.collider_hit(ColliderTag::MovingBlock, 3, 1.5, Vec3::ZERO);

        let char_pos = Vec3::new(4.5, 1.5, 0.2);
        let msg = tracker.block_trigger_stay(&platform, char_pos, 0);
        match msg {
            Some(ClientMsg::CharacterLandedBlock {
                block_index,
                relative_pos,
            }) => {
                assert_eq!(block_index, 3);
                assert_eq!(Vec3::from(relative_pos), platform.position - char_pos);
            }
            other => panic!("unexpected: {other:?}"),
        }
        // reported once
        assert!(tracker.block_trigger_stay(&platform, char_pos, 0).is_none());
    }

    #[test]
    fn trigger_exit_carries_last_airborne_relative_vector() {
        use crate::sim::platform::{LinearParams, PlatformKind};
        use glam::Quat;

        let platform = Platform::new(
            0,
            PlatformKind::Linear(LinearParams {
                start_position: Vec3::new(2.0, 1.0, 2.0),
                start_rotation: Quat::IDENTITY,
                move_speed: Vec3::ZERO,
                time_to_move: 1.0,
            }),
            1.5,
        );

        let mut tracker = LocalEventTracker::new();
        // airborne over the block: capture relative vector (state 4 = jumping)
        let char_pos = Vec3::new(1.0, 1.8, 2.0);
        let _ = tracker.block_trigger_stay(&platform, char_pos, 4);

        match tracker.block_trigger_exit(0) {
            Some(ClientMsg::CharacterJumpOnBlock { relative_pos, .. }) => {
                assert_eq!(Vec3::from(relative_pos), platform.position - char_pos);
            }
            other => panic!("unexpected: {other:?}"),
        }

        // exits are swallowed while a resync teleport settles
        tracker.suppress_trigger_exit = true;
        assert!(tracker.block_trigger_exit(0).is_none());
    }
}
