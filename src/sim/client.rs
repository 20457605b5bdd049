//! Client-side room context
//!
//! One `RoomClient` per connection ties the simulation pieces together: it
//! owns the platform set, the room clock, the carrier registry and the
//! in-flight tasks, and it implements the handler for every broadcast the
//! room relays. All collaborators are passed in at construction; nothing is
//! looked up through globals.
//!
//! The rig, animator and gesture actions live in the embedding game layer;
//! the client surfaces them as [`RigEvent`]s returned from
//! [`RoomClient::step`] and [`RoomClient::handle_message`].

use std::collections::HashMap;

use glam::{Quat, Vec3};
use tracing::debug;
use uuid::Uuid;

use crate::ws::protocol::{locomotion, ServerMsg};

use super::carrier::{Attachment, CarrierManager};
use super::clock::RoomClock;
use super::jump::{project_landing, JumpProgress, JumpTask, LAUNCH_ANGLE_DEG};
use super::platform::Platform;

/// Seconds after which the corrective gesture is cancelled again
const GESTURE_CANCEL_DELAY: f32 = 0.2;

/// Commands for the embedding layer that owns rigs and animators.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RigEvent {
    /// The rig returned to its presence object at this pose
    RestoredToGround {
        session_id: Uuid,
        position: Vec3,
        rotation: Quat,
    },
    /// Play a transient gesture to knock the external locomotion state
    /// machine out of its stale jump/run state
    PlayGesture { session_id: Uuid },
    /// Cancel the gesture played above
    CancelGesture { session_id: Uuid },
    /// Toggle the block-jump animation for a remote character
    SetJumpAnimation { session_id: Uuid, active: bool },
}

/// Corrective-gesture task, advanced once per tick.
#[derive(Debug)]
struct GestureTask {
    elapsed: f32,
    played: bool,
}

/// Respawn settle task: re-applies the target position each tick until the
/// carrier sticks there.
#[derive(Debug)]
struct SettleTask {
    target: Vec3,
}

/// Per-connection client simulation state.
pub struct RoomClient {
    platforms: Vec<Platform>,
    carriers: CarrierManager,
    clock: RoomClock,
    respawn_point: Vec3,
    jumps: HashMap<Uuid, JumpTask>,
    settles: HashMap<Uuid, SettleTask>,
    gestures: HashMap<Uuid, GestureTask>,
    /// Last known remote character poses, fed by the ambient avatar sync
    remote_poses: HashMap<Uuid, (Vec3, Quat)>,
    /// Last known locomotion codes, fed by the ambient avatar sync
    locomotion_states: HashMap<Uuid, i32>,
}

impl RoomClient {
    pub fn new(platforms: Vec<Platform>, respawn_point: Vec3) -> Self {
        Self {
            platforms,
            carriers: CarrierManager::new(),
            clock: RoomClock::new(),
            respawn_point,
            jumps: HashMap::new(),
            settles: HashMap::new(),
            gestures: HashMap::new(),
            remote_poses: HashMap::new(),
            locomotion_states: HashMap::new(),
        }
    }

    pub fn clock(&self) -> &RoomClock {
        &self.clock
    }

    pub fn platforms(&self) -> &[Platform] {
        &self.platforms
    }

    pub fn carriers(&self) -> &CarrierManager {
        &self.carriers
    }

    pub fn has_jump(&self, session: Uuid) -> bool {
        self.jumps.contains_key(&session)
    }

    /// Record a remote character pose from the ambient avatar sync.
    pub fn observe_remote_pose(&mut self, session: Uuid, position: Vec3, rotation: Quat) {
        self.remote_poses.insert(session, (position, rotation));
    }

    /// Record a remote locomotion state code from the ambient avatar sync.
    pub fn observe_locomotion(&mut self, session: Uuid, code: i32) {
        self.locomotion_states.insert(session, code);
    }

    /// Recompute elapsed time after a background suspension and force-apply
    /// it to every platform once.
    pub fn resume(&mut self, client_now_ms: u64) {
        if !self.clock.is_seeded() {
            return;
        }
        let elapsed = self.clock.resume(client_now_ms);
        for platform in &mut self.platforms {
            platform.resync(elapsed, &mut self.carriers);
        }
    }

    /// Handle one relayed room message.
    pub fn handle_message(&mut self, msg: &ServerMsg, client_now_ms: u64) -> Vec<RigEvent> {
        let mut events = Vec::new();
        match msg {
            ServerMsg::ServerTimestamp {
                room_start_timestamp,
                join_timestamp,
            } => {
                let elapsed =
                    self.clock
                        .seed(*room_start_timestamp, *join_timestamp, client_now_ms);
                for platform in &mut self.platforms {
                    platform.resync(elapsed, &mut self.carriers);
                }
            }

            ServerMsg::RoomJoined { players, .. } => {
                for info in players {
                    if info.on_block {
                        if let Some(idx) = info.block_index {
                            self.check_player_on_block(info.session_id, idx);
                        }
                    }
                }
            }

            ServerMsg::CharacterLandedBlock {
                session_id,
                block_index,
                relative_pos,
            } => {
                if self.carriers.contains(*session_id) {
                    events.push(RigEvent::SetJumpAnimation {
                        session_id: *session_id,
                        active: false,
                    });
                }
                self.jumps.remove(session_id);
                self.detach_everywhere(*session_id);

                let Some(platform_pos) =
                    self.platforms.get(*block_index).map(|p| p.position)
                else {
                    return events;
                };
                let landing = platform_pos - Vec3::from(*relative_pos);
                let (seed_pos, seed_rot) = self.rig_seed(*session_id, landing);
                self.carriers.ensure(*session_id, seed_pos, seed_rot);
                self.carriers.recapture(*session_id, seed_pos, seed_rot);

                let elapsed = self.clock.elapsed();
                if let Some(platform) = self.platforms.get_mut(*block_index) {
                    platform.add_rider(
                        *session_id,
                        Vec3::from(*relative_pos),
                        elapsed,
                        &mut self.carriers,
                    );
                }
            }

            ServerMsg::CharacterJumpOnBlock {
                session_id,
                block_index,
                relative_pos,
            } => {
                if !self.carriers.contains(*session_id) {
                    return events;
                }
                let Some(platform) = self.platforms.get_mut(*block_index) else {
                    return events;
                };
                let relative = Vec3::from(*relative_pos);
                platform.remove_rider(*session_id, relative, &mut self.carriers);

                let block_pos = platform.position;
                let start = block_pos - relative;
                let target = project_landing(start, start - block_pos, block_pos.y);
                self.begin_jump(*session_id, start, target);
                events.push(RigEvent::SetJumpAnimation {
                    session_id: *session_id,
                    active: true,
                });
            }

            ServerMsg::TryJumpForMovingToBlock {
                session_id,
                platform_pos,
                relative_pos,
            } => {
                let jump_origin = Vec3::from(*platform_pos);
                let (seed_pos, seed_rot) = self.rig_seed(*session_id, jump_origin);
                self.carriers.ensure(*session_id, seed_pos, seed_rot);
                self.carriers.recapture(*session_id, seed_pos, seed_rot);

                let start = self
                    .carriers
                    .get(*session_id)
                    .map(|c| c.position)
                    .unwrap_or(jump_origin);
                let target = project_landing(start, Vec3::from(*relative_pos), jump_origin.y);
                self.begin_jump(*session_id, start, target);
            }

            ServerMsg::PlatformState { session_id } => {
                if !self.carriers.contains(*session_id) {
                    return events;
                }
                self.reset_jump_state(*session_id, &mut events);
                self.detach_everywhere(*session_id);
                self.restore_rig(*session_id, &mut events);
            }

            ServerMsg::FallTriggerEnter { session_id } => {
                self.reset_jump_state(*session_id, &mut events);
                if self.carriers.contains(*session_id) {
                    self.detach_everywhere(*session_id);
                    if let Some(carrier) = self.carriers.get_mut(*session_id) {
                        carrier.attachment = Attachment::Ground;
                        carrier.velocity = Vec3::ZERO;
                    }
                    self.settles.insert(
                        *session_id,
                        SettleTask {
                            target: self.respawn_point,
                        },
                    );
                }
            }

            ServerMsg::LeavePlayer { session_id } => {
                debug!(session_id = %session_id, "cleaning up departed session");
                self.detach_everywhere(*session_id);
                self.carriers.remove(*session_id);
                self.jumps.remove(session_id);
                self.settles.remove(session_id);
                self.gestures.remove(session_id);
                self.remote_poses.remove(session_id);
                self.locomotion_states.remove(session_id);
            }

            // remote bookkeeping arrives with the landing event instead
            ServerMsg::BlockTriggerEnter { .. } => {}

            ServerMsg::Welcome { .. } | ServerMsg::Error { .. } | ServerMsg::Pong { .. } => {}
        }
        events
    }

    /// The carrier touched a static platform collider; the ride is over.
    pub fn on_carrier_platform_contact(&mut self, session: Uuid) -> Vec<RigEvent> {
        let mut events = Vec::new();
        if !self.carriers.contains(session) {
            return events;
        }
        if let Some(carrier) = self.carriers.get_mut(session) {
            carrier.landing_on_platform = true;
        }
        self.reset_jump_state(session, &mut events);
        self.detach_everywhere(session);
        self.restore_rig(session, &mut events);
        events
    }

    /// Advance one fixed simulation step.
    pub fn step(&mut self, dt: f32) -> Vec<RigEvent> {
        let mut events = Vec::new();

        self.clock.advance(dt);
        let elapsed = self.clock.elapsed();
        for platform in &mut self.platforms {
            platform.step(elapsed, dt, &mut self.carriers);
        }

        // jump replays
        let mut landed = Vec::new();
        for (session, task) in self.jumps.iter_mut() {
            match self.carriers.get_mut(*session) {
                Some(carrier) => {
                    if task.step(carrier, dt) == JumpProgress::Landed {
                        landed.push(*session);
                    }
                }
                None => landed.push(*session),
            }
        }
        for session in landed {
            self.jumps.remove(&session);
            if let Some(carrier) = self.carriers.get_mut(session) {
                if carrier.attachment == Attachment::Jumping {
                    carrier.attachment = Attachment::Ground;
                    if carrier.landing_on_platform {
                        carrier.gravity_enabled = true;
                    }
                }
            }
        }

        // respawn settles
        let mut settled = Vec::new();
        for (session, task) in self.settles.iter_mut() {
            match self.carriers.get_mut(*session) {
                Some(carrier) => {
                    if carrier.position == task.target {
                        settled.push(*session);
                    } else {
                        carrier.position = task.target;
                    }
                }
                None => settled.push(*session),
            }
        }
        for session in settled {
            self.settles.remove(&session);
        }

        // corrective gestures
        let mut finished = Vec::new();
        for (session, task) in self.gestures.iter_mut() {
            if !task.played {
                task.played = true;
                events.push(RigEvent::PlayGesture {
                    session_id: *session,
                });
            }
            task.elapsed += dt;
            if task.elapsed >= GESTURE_CANCEL_DELAY {
                events.push(RigEvent::CancelGesture {
                    session_id: *session,
                });
                finished.push(*session);
            }
        }
        for session in finished {
            self.gestures.remove(&session);
        }

        events
    }

    /// Late-joiner catch-up: the authoritative player list says `session` is
    /// riding `block_index`; make sure a carrier is registered there.
    fn check_player_on_block(&mut self, session: Uuid, block_index: usize) {
        let already_riding = self
            .platforms
            .get(block_index)
            .map(|p| p.has_rider(session))
            .unwrap_or(true);
        if already_riding {
            return;
        }
        let seed = self
            .platforms
            .get(block_index)
            .map(|p| p.position)
            .unwrap_or(Vec3::ZERO);
        let (seed_pos, seed_rot) = self.rig_seed(session, seed);
        self.carriers.ensure(session, seed_pos, seed_rot);
        self.carriers.recapture(session, seed_pos, seed_rot);
        let elapsed = self.clock.elapsed();
        if let Some(platform) = self.platforms.get_mut(block_index) {
            platform.add_rider(session, Vec3::ZERO, elapsed, &mut self.carriers);
        }
    }

    fn begin_jump(&mut self, session: Uuid, start: Vec3, target: Vec3) {
        let task = JumpTask::begin(session, start, target, LAUNCH_ANGLE_DEG);
        if let Some(carrier) = self.carriers.get_mut(session) {
            carrier.attachment = Attachment::Jumping;
            carrier.velocity = Vec3::ZERO;
            carrier.rotation = task.facing();
        }
        self.jumps.insert(session, task);
    }

    /// Stop any in-flight replay and reset the jump animation override.
    fn reset_jump_state(&mut self, session: Uuid, events: &mut Vec<RigEvent>) {
        self.jumps.remove(&session);
        if self.carriers.contains(session) {
            events.push(RigEvent::SetJumpAnimation {
                session_id: session,
                active: false,
            });
        }
    }

    /// Restore the rig to its presence object, with the corrective gesture
    /// when the external locomotion is stuck in a jump/run state.
    fn restore_rig(&mut self, session: Uuid, events: &mut Vec<RigEvent>) {
        if let Some((position, rotation)) = self.carriers.return_to_ground(session) {
            events.push(RigEvent::RestoredToGround {
                session_id: session,
                position,
                rotation,
            });
            let code = self.locomotion_states.get(&session).copied().unwrap_or(0);
            if locomotion::indicates_jump(code) {
                self.gestures.insert(
                    session,
                    GestureTask {
                        elapsed: 0.0,
                        played: false,
                    },
                );
            }
        }
    }

    /// Registry-only removal from every platform; ensures a session can
    /// never be carried by two platforms at once.
    fn detach_everywhere(&mut self, session: Uuid) {
        for platform in &mut self.platforms {
            platform.drop_rider(session);
        }
    }

    /// Seed pose for a new carrier: the last observed rig pose, or the best
    /// guess derived from the triggering event.
    fn rig_seed(&self, session: Uuid, fallback: Vec3) -> (Vec3, Quat) {
        self.remote_poses
            .get(&session)
            .copied()
            .unwrap_or((fallback, Quat::IDENTITY))
    }
}
