//! Room ticket issuing and verification
//!
//! Connecting clients present a short-lived HMAC-signed ticket at WebSocket
//! upgrade. Tickets are self-issued by the ticket endpoint; there is no
//! third-party identity involved.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

use crate::util::time::unix_millis;

type HmacSha256 = Hmac<Sha256>;

/// Claims carried by a room ticket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketClaims {
    /// Session id the connection will use
    pub session_id: Uuid,
    /// Expiration time (Unix timestamp, milliseconds)
    pub exp: u64,
}

/// Issue a signed ticket for a session
pub fn issue_ticket(session_id: Uuid, ttl_secs: u64, secret: &str) -> Result<String, AuthError> {
    let claims = TicketClaims {
        session_id,
        exp: unix_millis() + ttl_secs * 1000,
    };
    let payload = serde_json::to_vec(&claims).map_err(|_| AuthError::InvalidTicket)?;
    let payload_b64 = URL_SAFE_NO_PAD.encode(payload);

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| AuthError::InvalidTicket)?;
    mac.update(payload_b64.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    Ok(format!("{}.{}", payload_b64, signature))
}

/// Verify a ticket and extract its claims
pub fn verify_ticket(ticket: &str, secret: &str) -> Result<TicketClaims, AuthError> {
    let (payload_b64, signature_hex) = ticket.split_once('.').ok_or(AuthError::InvalidTicket)?;

    let signature = hex::decode(signature_hex).map_err(|_| AuthError::InvalidTicket)?;

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| AuthError::InvalidTicket)?;
    mac.update(payload_b64.as_bytes());
    mac.verify_slice(&signature)
        .map_err(|_| AuthError::InvalidSignature)?;

    let payload = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| AuthError::InvalidTicket)?;
    let claims: TicketClaims =
        serde_json::from_slice(&payload).map_err(|_| AuthError::InvalidTicket)?;

    if claims.exp < unix_millis() {
        return Err(AuthError::Expired);
    }

    Ok(claims)
}

/// Ticket verification errors
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Malformed ticket")]
    InvalidTicket,

    #[error("Ticket signature mismatch")]
    InvalidSignature,

    #[error("Ticket expired")]
    Expired,
}
