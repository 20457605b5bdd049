//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;

use glam::Vec3;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Secret for signing room tickets handed to clients
    pub ticket_secret: String,
    /// Ticket lifetime in seconds
    pub ticket_ttl_secs: u64,

    /// Allowed client origin for CORS
    pub client_origin: String,

    /// Maximum sessions per room
    pub room_max_players: usize,
    /// World respawn point, where fallen characters reappear
    pub respawn_point: Vec3,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Hosts often provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let respawn_point = match env::var("RESPAWN_POINT") {
            Ok(raw) => parse_vec3(&raw).ok_or(ConfigError::InvalidRespawnPoint)?,
            Err(_) => Vec3::ZERO,
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            ticket_secret: env::var("TICKET_SECRET")
                .map_err(|_| ConfigError::Missing("TICKET_SECRET"))?,
            ticket_ttl_secs: env::var("TICKET_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3600),

            client_origin: env::var("CLIENT_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),

            room_max_players: env::var("ROOM_MAX_PLAYERS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(16),
            respawn_point,
        })
    }
}

/// Parse a "x,y,z" triple into a vector
fn parse_vec3(raw: &str) -> Option<Vec3> {
    let mut parts = raw.split(',').map(|p| p.trim().parse::<f32>());
    let x = parts.next()?.ok()?;
    let y = parts.next()?.ok()?;
    let z = parts.next()?.ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(Vec3::new(x, y, z))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("RESPAWN_POINT must be three comma-separated floats")]
    InvalidRespawnPoint,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_vec3_triples() {
        assert_eq!(parse_vec3("1,2,3"), Some(Vec3::new(1.0, 2.0, 3.0)));
        assert_eq!(parse_vec3(" 0.5, -1.25, 9 "), Some(Vec3::new(0.5, -1.25, 9.0)));
        assert_eq!(parse_vec3("1,2"), None);
        assert_eq!(parse_vec3("1,2,3,4"), None);
        assert_eq!(parse_vec3("a,b,c"), None);
    }
}
