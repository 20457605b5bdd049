//! Parabolic jump replay between carriers
//!
//! Remote jumps are not streamed; only the relative vectors at the trigger
//! boundaries are. From those this engine projects a landing point at a
//! fixed horizontal distance, solves the projectile range equation at a
//! fixed launch angle, and replays the arc as an explicit per-tick task
//! that can be cancelled at any step.

use glam::{Quat, Vec3};
use uuid::Uuid;

use super::carrier::Carrier;

/// Horizontal distance every replayed jump covers
pub const PLAYER_JUMP_DISTANCE: f32 = 3.0;
/// Gravity used for replayed arcs
pub const JUMP_GRAVITY: f32 = 9.81;
/// Launch angle of every replayed jump, degrees
pub const LAUNCH_ANGLE_DEG: f32 = 45.0;

/// Project the expected landing point of a jump.
///
/// The heading is derived from the relative vector recorded at the trigger
/// boundary; the landing height is pinned to the destination surface.
pub fn project_landing(start: Vec3, heading_source: Vec3, surface_y: f32) -> Vec3 {
    let mut angle = heading_source.y.atan2(heading_source.x).to_degrees();
    if heading_source.z <= 0.0 {
        angle = -angle;
    }
    let rad = angle.to_radians();
    Vec3::new(
        start.x + rad.cos() * PLAYER_JUMP_DISTANCE,
        surface_y,
        start.z + rad.sin() * PLAYER_JUMP_DISTANCE,
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpProgress {
    InFlight,
    Landed,
}

/// One in-flight jump replay, advanced once per simulation step.
#[derive(Debug, Clone)]
pub struct JumpTask {
    session_id: Uuid,
    heading: Vec3,
    horizontal_speed: f32,
    vertical_speed: f32,
    flight_duration: f32,
    elapsed: f32,
    target: Vec3,
}

impl JumpTask {
    pub fn begin(session_id: Uuid, start: Vec3, target: Vec3, launch_angle_deg: f32) -> Self {
        let distance = start.distance(target);
        let theta = launch_angle_deg.to_radians();
        // range equation: v^2 = d * g / sin(2 theta)
        let speed = (distance * JUMP_GRAVITY / (2.0 * theta).sin()).sqrt();
        let horizontal_speed = speed * theta.cos();
        let vertical_speed = speed * theta.sin();

        let mut flat = target - start;
        flat.y = 0.0;
        let heading = flat.normalize_or_zero();

        let flight_duration = if horizontal_speed > f32::EPSILON {
            distance / horizontal_speed
        } else {
            0.0
        };

        Self {
            session_id,
            heading,
            horizontal_speed,
            vertical_speed,
            flight_duration,
            elapsed: 0.0,
            target,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Yaw-only facing along the jump heading, applied to the carrier at
    /// launch.
    pub fn facing(&self) -> Quat {
        Quat::from_rotation_y(self.heading.x.atan2(self.heading.z))
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn flight_duration(&self) -> f32 {
        self.flight_duration
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// Advance the arc by `dt`, translating the carrier. Returns `Landed`
    /// once the accumulated flight time reaches the computed duration.
    pub fn step(&mut self, carrier: &mut Carrier, dt: f32) -> JumpProgress {
        if self.elapsed >= self.flight_duration {
            return JumpProgress::Landed;
        }
        let dy = (self.vertical_speed - JUMP_GRAVITY * self.elapsed) * dt;
        carrier.position += self.heading * self.horizontal_speed * dt + Vec3::Y * dy;
        self.elapsed += dt;
        if self.elapsed >= self.flight_duration {
            JumpProgress::Landed
        } else {
            JumpProgress::InFlight
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::carrier::CarrierManager;

    #[test]
    fn flight_duration_matches_range_equation() {
        let task = JumpTask::begin(Uuid::new_v4(), Vec3::ZERO, Vec3::new(3.0, 0.0, 0.0), 45.0);
        let theta = 45.0_f32.to_radians();
        let speed = (3.0 * JUMP_GRAVITY / (2.0 * theta).sin()).sqrt();
        let expected = 3.0 / (speed * theta.cos());
        assert!((task.flight_duration() - expected).abs() < 1e-5);
    }

    #[test]
    fn replayed_arc_lands_near_target() {
        let mut carriers = CarrierManager::new();
        let session = Uuid::new_v4();
        carriers.ensure(session, Vec3::ZERO, Quat::IDENTITY);

        let target = Vec3::new(3.0, 0.0, 0.0);
        let mut task = JumpTask::begin(session, Vec3::ZERO, target, 45.0);

        let dt = 0.005;
        let carrier = carriers.get_mut(session).unwrap();
        let mut steps = 0;
        while task.step(carrier, dt) == JumpProgress::InFlight {
            steps += 1;
            assert!(steps < 10_000, "arc never landed");
        }

        assert!(
            carrier.position.distance(target) < 0.05,
            "landed at {:?}",
            carrier.position
        );
        assert!((task.elapsed() - task.flight_duration()).abs() <= dt);
    }

    #[test]
    fn arc_peaks_above_both_endpoints() {
        let mut carriers = CarrierManager::new();
        let session = Uuid::new_v4();
        carriers.ensure(session, Vec3::ZERO, Quat::IDENTITY);

        let mut task = JumpTask::begin(session, Vec3::ZERO, Vec3::new(3.0, 0.0, 0.0), 45.0);
        let carrier = carriers.get_mut(session).unwrap();
        let mut peak = f32::MIN;
        while task.step(carrier, 0.005) == JumpProgress::InFlight {
            peak = peak.max(carrier.position.y);
        }
        assert!(peak > 0.3, "peak {peak} too low for a 3-unit 45 degree jump");
    }

    #[test]
    fn landing_projection_pins_surface_height() {
        let start = Vec3::new(1.0, 2.5, 1.0);
        let target = project_landing(start, Vec3::new(1.0, 0.0, 1.0), 4.0);
        assert_eq!(target.y, 4.0);
        let flat_start = Vec3::new(start.x, 0.0, start.z);
        let flat_target = Vec3::new(target.x, 0.0, target.z);
        assert!((flat_start.distance(flat_target) - PLAYER_JUMP_DISTANCE).abs() < 1e-4);
    }

    #[test]
    fn zero_distance_jump_terminates_immediately() {
        let mut carriers = CarrierManager::new();
        let session = Uuid::new_v4();
        carriers.ensure(session, Vec3::ZERO, Quat::IDENTITY);

        let mut task = JumpTask::begin(session, Vec3::ZERO, Vec3::ZERO, 45.0);
        let carrier = carriers.get_mut(session).unwrap();
        assert_eq!(task.step(carrier, 0.02), JumpProgress::Landed);
        assert_eq!(carrier.position, Vec3::ZERO);
    }
}
