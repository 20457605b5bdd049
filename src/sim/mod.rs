//! Client-side simulation core
//!
//! Everything a client needs to mirror the authoritative room: the
//! deterministic platform motion model, the room clock seeded from the
//! server timestamp exchange, the carrier bookkeeping for remote riders,
//! and the parabolic jump replay between carriers.

pub mod carrier;
pub mod client;
pub mod clock;
pub mod events;
pub mod jump;
pub mod platform;

pub use carrier::{Attachment, Carrier, CarrierManager};
pub use client::{RigEvent, RoomClient};
pub use clock::RoomClock;
pub use platform::{LinearParams, OrbitalParams, Platform, PlatformKind, Pose};
