//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::room::{RoomRegistry, RoomService};
use crate::util::rate_limit::{create_limiter, Limiter, TICKET_RATE_LIMIT};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<RoomRegistry>,
    pub rooms: Arc<RoomService>,
    pub ticket_limiter: Arc<Limiter>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        let registry = Arc::new(RoomRegistry::new());
        let rooms = Arc::new(RoomService::new(
            registry.clone(),
            config.room_max_players,
        ));
        let ticket_limiter = create_limiter(TICKET_RATE_LIMIT);

        Self {
            config,
            registry,
            rooms,
            ticket_limiter,
        }
    }
}
