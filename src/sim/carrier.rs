//! Carrier bookkeeping for remote riders
//!
//! A carrier is the transient physical stand-in for a remote session while
//! it rides a platform or replays a jump. There is at most one carrier per
//! session; it is created lazily on the first attachment event and lives
//! until the session leaves the room. Instead of reparenting a live scene
//! graph, the rig's placement is tracked as an explicit state (`RigParent`)
//! plus a stored restoration pose.

use std::collections::HashMap;

use glam::{Quat, Vec3};
use uuid::Uuid;

/// What currently drives a carrier's pose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attachment {
    /// Detached; pose is left to gravity / external handlers
    Ground,
    /// Riding the platform with this index; pose follows the motion model
    Platform(usize),
    /// Mid-flight; pose follows the jump replay engine
    Jumping,
}

/// Where the remote character's rig currently hangs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RigParent {
    /// Normal presence object, driven by the regular avatar sync
    Origin,
    /// Detached from its presence object and carried by us
    Carrier,
}

/// Physical stand-in for one remote session.
#[derive(Debug, Clone)]
pub struct Carrier {
    pub session_id: Uuid,
    pub attachment: Attachment,
    pub position: Vec3,
    pub rotation: Quat,
    pub velocity: Vec3,
    pub gravity_enabled: bool,
    pub rig_parent: RigParent,
    /// Set when the carrier touched a static platform mid-jump; a completing
    /// jump then ends with gravity re-enabled instead of a block attach.
    pub landing_on_platform: bool,
    /// Pose to restore the presence object to when the rig returns home
    origin_pose: (Vec3, Quat),
}

impl Carrier {
    fn new(session_id: Uuid, seed_position: Vec3, seed_rotation: Quat) -> Self {
        Self {
            session_id,
            attachment: Attachment::Ground,
            position: seed_position,
            rotation: seed_rotation,
            velocity: Vec3::ZERO,
            gravity_enabled: false,
            rig_parent: RigParent::Carrier,
            landing_on_platform: false,
            origin_pose: (seed_position, seed_rotation),
        }
    }

    pub fn origin_pose(&self) -> (Vec3, Quat) {
        self.origin_pose
    }
}

/// Registry of carriers, keyed by session id.
#[derive(Debug, Default)]
pub struct CarrierManager {
    carriers: HashMap<Uuid, Carrier>,
}

impl CarrierManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the carrier for `session`, creating one at the given seed pose
    /// if none exists yet. Creation captures the restoration record and
    /// marks the rig as carried; repeated calls reuse the existing carrier.
    pub fn ensure(&mut self, session: Uuid, seed_position: Vec3, seed_rotation: Quat) -> &mut Carrier {
        self.carriers.entry(session).or_insert_with(|| {
            tracing::debug!(session_id = %session, "creating carrier");
            Carrier::new(session, seed_position, seed_rotation)
        })
    }

    pub fn get(&self, session: Uuid) -> Option<&Carrier> {
        self.carriers.get(&session)
    }

    pub fn get_mut(&mut self, session: Uuid) -> Option<&mut Carrier> {
        self.carriers.get_mut(&session)
    }

    pub fn contains(&self, session: Uuid) -> bool {
        self.carriers.contains_key(&session)
    }

    /// Restore the rig to its presence object at the carrier's current pose.
    /// Returns the restored pose, or None if there is nothing to restore.
    pub fn return_to_ground(&mut self, session: Uuid) -> Option<(Vec3, Quat)> {
        let carrier = self.carriers.get_mut(&session)?;
        if carrier.rig_parent != RigParent::Carrier {
            return None;
        }
        carrier.origin_pose = (carrier.position, carrier.rotation);
        carrier.rig_parent = RigParent::Origin;
        carrier.attachment = Attachment::Ground;
        carrier.velocity = Vec3::ZERO;
        carrier.landing_on_platform = false;
        Some(carrier.origin_pose)
    }

    /// Re-capture the rig onto the carrier (used when a grounded session
    /// starts riding again). Seeds the carrier pose from the rig.
    pub fn recapture(&mut self, session: Uuid, rig_position: Vec3, rig_rotation: Quat) {
        if let Some(carrier) = self.carriers.get_mut(&session) {
            if carrier.rig_parent == RigParent::Origin {
                carrier.position = rig_position;
                carrier.rotation = rig_rotation;
                carrier.rig_parent = RigParent::Carrier;
            }
            carrier.gravity_enabled = false;
        }
    }

    /// Delete the carrier and all bookkeeping for a session. No-op when no
    /// carrier exists.
    pub fn remove(&mut self, session: Uuid) -> bool {
        self.carriers.remove(&session).is_some()
    }

    pub fn len(&self) -> usize {
        self.carriers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.carriers.is_empty()
    }

    pub fn sessions(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.carriers.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Uuid {
        Uuid::new_v4()
    }

    #[test]
    fn ensure_is_idempotent() {
        let mut carriers = CarrierManager::new();
        let id = session();
        carriers.ensure(id, Vec3::new(1.0, 0.0, 1.0), Quat::IDENTITY);
        carriers.ensure(id, Vec3::new(9.0, 9.0, 9.0), Quat::IDENTITY);
        assert_eq!(carriers.len(), 1);
        // second call must not reset the existing carrier's pose
        assert_eq!(carriers.get(id).unwrap().position, Vec3::new(1.0, 0.0, 1.0));
    }

    #[test]
    fn creation_disables_gravity_and_captures_restore_pose() {
        let mut carriers = CarrierManager::new();
        let id = session();
        let rig_pos = Vec3::new(2.0, 1.0, -3.0);
        let carrier = carriers.ensure(id, rig_pos, Quat::IDENTITY);
        assert!(!carrier.gravity_enabled);
        assert_eq!(carrier.rig_parent, RigParent::Carrier);
        assert_eq!(carrier.origin_pose().0, rig_pos);
    }

    #[test]
    fn return_to_ground_restores_at_current_pose() {
        let mut carriers = CarrierManager::new();
        let id = session();
        carriers.ensure(id, Vec3::ZERO, Quat::IDENTITY);
        carriers.get_mut(id).unwrap().position = Vec3::new(4.0, 2.0, 4.0);

        let (pos, _rot) = carriers.return_to_ground(id).unwrap();
        assert_eq!(pos, Vec3::new(4.0, 2.0, 4.0));
        let carrier = carriers.get(id).unwrap();
        assert_eq!(carrier.rig_parent, RigParent::Origin);
        assert_eq!(carrier.attachment, Attachment::Ground);

        // already restored: nothing further to do
        assert!(carriers.return_to_ground(id).is_none());
    }

    #[test]
    fn return_to_ground_without_carrier_is_noop() {
        let mut carriers = CarrierManager::new();
        assert!(carriers.return_to_ground(session()).is_none());
    }

    #[test]
    fn remove_clears_all_state() {
        let mut carriers = CarrierManager::new();
        let id = session();
        carriers.ensure(id, Vec3::ZERO, Quat::IDENTITY);
        assert!(carriers.remove(id));
        assert!(!carriers.contains(id));
        assert!(!carriers.remove(id));
        assert!(carriers.is_empty());
    }
}
