//! Platform motion model
//!
//! A platform's authoritative pose at elapsed room time `t` is a pure
//! function of `t` and its immutable parameters, so server and every client
//! agree on where a platform is without per-frame traffic. Linear blocks
//! shuttle between a start and goal pose; orbital blocks revolve around a
//! fixed pivot. Riders registered on a platform are moved with it each
//! simulation step.

use std::collections::HashMap;

use glam::{Quat, Vec3};
use rand::Rng;
use uuid::Uuid;

use super::carrier::{Attachment, CarrierManager};

/// Parameters of a back-and-forth moving block.
#[derive(Debug, Clone)]
pub struct LinearParams {
    pub start_position: Vec3,
    pub start_rotation: Quat,
    /// Velocity while moving in the forward direction
    pub move_speed: Vec3,
    /// Seconds to travel from start to goal (half a full cycle)
    pub time_to_move: f32,
}

impl LinearParams {
    pub fn goal_position(&self) -> Vec3 {
        self.start_position + self.move_speed * self.time_to_move
    }
}

/// Parameters of a block orbiting a fixed pivot.
#[derive(Debug, Clone)]
pub struct OrbitalParams {
    pub pivot: Vec3,
    /// Unit rotation axis
    pub axis: Vec3,
    /// Angular speed in degrees per second
    pub rot_speed: f32,
    pub start_position: Vec3,
    pub start_rotation: Quat,
}

#[derive(Debug, Clone)]
pub enum PlatformKind {
    Linear(LinearParams),
    Orbital(OrbitalParams),
}

/// Result of evaluating the motion model at a point in time.
#[derive(Debug, Clone, Copy)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
    /// +1 while heading from start to goal, -1 on the way back
    pub direction: i8,
}

impl PlatformKind {
    /// Evaluate the pose at elapsed room time `t`. Pure and idempotent; safe
    /// to call out of order without accumulating error.
    pub fn pose_at(&self, elapsed: f32) -> Pose {
        match self {
            PlatformKind::Linear(p) => {
                let period = p.time_to_move;
                let direction = if (elapsed / period).floor() as i64 % 2 == 0 {
                    1
                } else {
                    -1
                };
                let anchor = if direction == 1 {
                    p.start_position
                } else {
                    p.goal_position()
                };
                let position = anchor + p.move_speed * direction as f32 * (elapsed % period);
                Pose {
                    position,
                    rotation: p.start_rotation,
                    direction,
                }
            }
            PlatformKind::Orbital(p) => {
                let angle = (p.rot_speed * elapsed).to_radians();
                let rot = Quat::from_axis_angle(p.axis, angle);
                Pose {
                    // orientation accumulates from the original pose rather
                    // than integrating per tick, so long sessions don't drift
                    position: p.pivot + rot * (p.start_position - p.pivot),
                    rotation: rot * p.start_rotation,
                    direction: 1,
                }
            }
        }
    }
}

/// Attachment anchor for one rider, captured when it boards.
#[derive(Debug, Clone, Copy)]
struct RiderAnchor {
    position: Vec3,
    rotation: Quat,
    elapsed: f32,
}

/// A moving platform plus the riders it currently carries.
#[derive(Debug)]
pub struct Platform {
    pub index: usize,
    pub kind: PlatformKind,
    /// Height of the walkable top surface, where riders stand
    pub surface_height: f32,
    pub position: Vec3,
    pub rotation: Quat,
    velocity: Vec3,
    direction: i8,
    prev_direction: i8,
    /// One-shot: snap pose (and riders) to the evaluated position on the
    /// next step, after a clock reconciliation event
    fix_transform: bool,
    riders: HashMap<Uuid, RiderAnchor>,
}

impl Platform {
    pub fn new(index: usize, kind: PlatformKind, surface_height: f32) -> Self {
        let pose = kind.pose_at(0.0);
        let velocity = match &kind {
            PlatformKind::Linear(p) => p.move_speed,
            PlatformKind::Orbital(_) => Vec3::ZERO,
        };
        Self {
            index,
            kind,
            surface_height,
            position: pose.position,
            rotation: pose.rotation,
            velocity,
            direction: 1,
            // forces the initial velocity push on the first step
            prev_direction: -1,
            fix_transform: false,
            riders: HashMap::new(),
        }
    }

    pub fn direction(&self) -> i8 {
        self.direction
    }

    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    /// Force-apply the evaluated pose on the next step. Called once after
    /// every clock seed/resume.
    pub fn resync(&mut self, elapsed: f32, carriers: &mut CarrierManager) {
        self.fix_transform = true;
        self.step(elapsed, 0.0, carriers);
    }

    /// Advance one simulation step at elapsed room time `elapsed`.
    pub fn step(&mut self, elapsed: f32, dt: f32, carriers: &mut CarrierManager) {
        let pose = self.kind.pose_at(elapsed);
        match &self.kind {
            PlatformKind::Linear(params) => {
                self.direction = pose.direction;
                // velocity is reassigned (and pushed to riders) only when the
                // travel direction flips, not every tick
                if self.direction != self.prev_direction {
                    self.velocity = params.move_speed * self.direction as f32;
                    for session in self.riders.keys() {
                        if let Some(carrier) = carriers.get_mut(*session) {
                            carrier.velocity = self.velocity;
                        }
                    }
                }
                self.prev_direction = self.direction;

                if self.fix_transform {
                    self.fix_transform = false;
                    self.position = pose.position;
                    let mut rng = rand::thread_rng();
                    for session in self.riders.keys() {
                        if let Some(carrier) = carriers.get_mut(*session) {
                            let jitter = rng.gen_range(-0.3..0.3);
                            carrier.position = Vec3::new(
                                pose.position.x + jitter,
                                self.surface_height,
                                pose.position.z + jitter,
                            );
                            carrier.velocity = self.velocity;
                        }
                    }
                } else {
                    self.position += self.velocity * dt;
                }

                // rigid velocity match: riders integrate alongside the block
                for session in self.riders.keys() {
                    if let Some(carrier) = carriers.get_mut(*session) {
                        carrier.position += carrier.velocity * dt;
                    }
                }
            }
            PlatformKind::Orbital(params) => {
                self.position = pose.position;
                self.rotation = pose.rotation;

                if self.fix_transform {
                    self.fix_transform = false;
                    let surface_height = self.surface_height;
                    for (session, anchor) in self.riders.iter_mut() {
                        if let Some(carrier) = carriers.get_mut(*session) {
                            carrier.position =
                                Vec3::new(pose.position.x, surface_height, pose.position.z);
                            anchor.position = carrier.position;
                            anchor.rotation = carrier.rotation;
                            anchor.elapsed = elapsed;
                        }
                    }
                }

                // each rider is recomputed from its boarding anchor, never
                // incrementally, so orbital motion cannot accumulate error
                for (session, anchor) in self.riders.iter() {
                    if let Some(carrier) = carriers.get_mut(*session) {
                        let angle =
                            (params.rot_speed * (elapsed - anchor.elapsed)).to_radians();
                        let rot = Quat::from_axis_angle(params.axis, angle);
                        carrier.position = params.pivot + rot * (anchor.position - params.pivot);
                        carrier.rotation = rot * anchor.rotation;
                    }
                }
            }
        }

        // riders whose carrier is gone left the room mid-ride
        self.riders.retain(|session, _| carriers.contains(*session));
    }

    /// Register a rider at the given block-relative offset. The carrier is
    /// placed on the walkable surface before the next render; repeated calls
    /// just refresh the registry entry.
    pub fn add_rider(
        &mut self,
        session: Uuid,
        relative: Vec3,
        elapsed: f32,
        carriers: &mut CarrierManager,
    ) {
        let Some(carrier) = carriers.get_mut(session) else {
            return;
        };
        let landing = self.position - relative;
        let landing = Vec3::new(landing.x, self.surface_height, landing.z);
        carrier.position = landing;
        carrier.attachment = Attachment::Platform(self.index);
        carrier.velocity = match self.kind {
            PlatformKind::Linear(_) => self.velocity,
            PlatformKind::Orbital(_) => Vec3::ZERO,
        };
        self.riders.insert(
            session,
            RiderAnchor {
                position: landing,
                rotation: carrier.rotation,
                elapsed,
            },
        );
    }

    /// Unregister a rider, repositioning its carrier at the exit point and
    /// zeroing its velocity.
    pub fn remove_rider(&mut self, session: Uuid, relative: Vec3, carriers: &mut CarrierManager) {
        if let Some(carrier) = carriers.get_mut(session) {
            carrier.position = self.position - relative;
            if self.riders.contains_key(&session) {
                carrier.velocity = Vec3::ZERO;
            }
        }
        self.riders.remove(&session);
    }

    /// Registry-only removal, without touching the carrier pose.
    pub fn drop_rider(&mut self, session: Uuid) -> bool {
        self.riders.remove(&session).is_some()
    }

    pub fn has_rider(&self, session: Uuid) -> bool {
        self.riders.contains_key(&session)
    }

    pub fn rider_count(&self) -> usize {
        self.riders.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_kind() -> PlatformKind {
        PlatformKind::Linear(LinearParams {
            start_position: Vec3::ZERO,
            start_rotation: Quat::IDENTITY,
            move_speed: Vec3::new(1.0, 0.0, 0.0),
            time_to_move: 2.0,
        })
    }

    fn orbital_kind() -> PlatformKind {
        PlatformKind::Orbital(OrbitalParams {
            pivot: Vec3::ZERO,
            axis: Vec3::Y,
            rot_speed: 90.0,
            start_position: Vec3::new(1.0, 0.0, 0.0),
            start_rotation: Quat::IDENTITY,
        })
    }

    #[test]
    fn linear_direction_follows_period_parity() {
        let kind = linear_kind();
        // floor(5 / 2) = 2, even -> forward
        assert_eq!(kind.pose_at(5.0).direction, 1);
        // floor(3 / 2) = 1, odd -> backward
        assert_eq!(kind.pose_at(3.0).direction, -1);
        assert_eq!(kind.pose_at(0.0).direction, 1);
    }

    #[test]
    fn linear_pose_is_periodic_over_full_cycles() {
        let kind = linear_kind();
        for t in [0.25_f32, 0.9, 1.5, 2.3, 3.7] {
            let a = kind.pose_at(t);
            let b = kind.pose_at(t + 4.0); // two half-periods = one full cycle
            assert_eq!(a.direction, b.direction, "t={t}");
            assert!(a.position.abs_diff_eq(b.position, 1e-4), "t={t}");
        }
    }

    #[test]
    fn linear_pose_at_is_idempotent_and_order_free() {
        let kind = linear_kind();
        let late = kind.pose_at(10.3);
        let _ = kind.pose_at(0.1);
        let again = kind.pose_at(10.3);
        assert_eq!(late.position, again.position);
        assert_eq!(late.direction, again.direction);
    }

    #[test]
    fn linear_backward_leg_walks_back_from_goal() {
        let kind = linear_kind();
        // at t = 3.0 the block is 1s into the return leg: goal - speed * 1
        let pose = kind.pose_at(3.0);
        assert!(pose.position.abs_diff_eq(Vec3::new(1.0, 0.0, 0.0), 1e-5));
    }

    #[test]
    fn orbital_pose_rotates_about_pivot() {
        let kind = orbital_kind();
        let pose = kind.pose_at(1.0); // 90 degrees about +Y
        assert!(pose.position.abs_diff_eq(Vec3::new(0.0, 0.0, -1.0), 1e-5));
        let full = kind.pose_at(4.0); // full revolution
        assert!(full.position.abs_diff_eq(Vec3::new(1.0, 0.0, 0.0), 1e-4));
    }

    #[test]
    fn rider_velocity_repushed_only_on_direction_flip() {
        let mut platform = Platform::new(0, linear_kind(), 0.5);
        let mut carriers = CarrierManager::new();
        let session = Uuid::new_v4();
        carriers.ensure(session, Vec3::ZERO, Quat::IDENTITY);

        platform.step(0.1, 0.02, &mut carriers);
        platform.add_rider(session, Vec3::ZERO, 0.1, &mut carriers);
        assert_eq!(carriers.get(session).unwrap().velocity, Vec3::new(1.0, 0.0, 0.0));

        // clobber the rider velocity: mid-phase steps must not reassign it
        carriers.get_mut(session).unwrap().velocity = Vec3::ZERO;
        platform.step(0.2, 0.02, &mut carriers);
        assert_eq!(carriers.get(session).unwrap().velocity, Vec3::ZERO);

        // crossing the half-period flips direction and re-pushes
        platform.step(2.1, 0.02, &mut carriers);
        assert_eq!(
            carriers.get(session).unwrap().velocity,
            Vec3::new(-1.0, 0.0, 0.0)
        );
    }

    #[test]
    fn resync_snaps_block_and_riders_once() {
        let mut platform = Platform::new(0, linear_kind(), 0.5);
        let mut carriers = CarrierManager::new();
        let session = Uuid::new_v4();
        carriers.ensure(session, Vec3::ZERO, Quat::IDENTITY);
        platform.add_rider(session, Vec3::ZERO, 0.0, &mut carriers);

        platform.resync(5.0, &mut carriers);
        let expected = linear_kind().pose_at(5.0).position;
        assert!(platform.position.abs_diff_eq(expected, 1e-5));

        let rider = carriers.get(session).unwrap();
        assert_eq!(rider.position.y, 0.5);
        assert!((rider.position.x - expected.x).abs() <= 0.3 + 1e-5);
        assert!((rider.position.z - expected.z).abs() <= 0.3 + 1e-5);
    }

    #[test]
    fn orbital_riders_do_not_accumulate_step_error() {
        let session = Uuid::new_v4();

        let mut fine = Platform::new(0, orbital_kind(), 0.5);
        let mut fine_carriers = CarrierManager::new();
        fine_carriers.ensure(session, Vec3::ZERO, Quat::IDENTITY);
        fine.add_rider(session, Vec3::ZERO, 0.0, &mut fine_carriers);
        let mut t = 0.0_f32;
        for _ in 0..100 {
            t += 0.01;
            fine.step(t, 0.01, &mut fine_carriers);
        }

        let mut coarse = Platform::new(0, orbital_kind(), 0.5);
        let mut coarse_carriers = CarrierManager::new();
        coarse_carriers.ensure(session, Vec3::ZERO, Quat::IDENTITY);
        coarse.add_rider(session, Vec3::ZERO, 0.0, &mut coarse_carriers);
        coarse.step(1.0, 1.0, &mut coarse_carriers);

        let a = fine_carriers.get(session).unwrap().position;
        let b = coarse_carriers.get(session).unwrap().position;
        assert!(a.abs_diff_eq(b, 1e-3), "fine={a:?} coarse={b:?}");
    }

    #[test]
    fn riders_of_departed_sessions_are_pruned() {
        let mut platform = Platform::new(0, linear_kind(), 0.5);
        let mut carriers = CarrierManager::new();
        let session = Uuid::new_v4();
        carriers.ensure(session, Vec3::ZERO, Quat::IDENTITY);
        platform.add_rider(session, Vec3::ZERO, 0.0, &mut carriers);
        assert_eq!(platform.rider_count(), 1);

        carriers.remove(session);
        platform.step(0.1, 0.02, &mut carriers);
        assert_eq!(platform.rider_count(), 0);
    }
}
