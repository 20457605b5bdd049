//! Room authority modules

pub mod room;
pub mod service;

pub use room::{
    DeliveryScope, GameRoom, Outbound, RoomHandle, RoomInput, RoomPlayer, RoomRegistry,
};
pub use service::RoomService;
