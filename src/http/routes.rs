//! HTTP route definitions

use axum::{
    extract::State,
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::app::AppState;
use crate::http::middleware::issue_ticket;
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // CORS configuration - support multiple origins (comma-separated in CLIENT_ORIGIN)
    let allowed_origins: Vec<header::HeaderValue> = state
        .config
        .client_origin
        .split(',')
        .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .route("/ticket", post(ticket_handler))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    active_rooms: usize,
    active_players: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        active_rooms: state.registry.active_rooms(),
        active_players: state.registry.total_players(),
    })
}

// ============================================================================
// Ticket endpoint
// ============================================================================

#[derive(Serialize)]
struct TicketResponse {
    session_id: Uuid,
    ticket: String,
    expires_in_secs: u64,
}

async fn ticket_handler(State(state): State<AppState>) -> impl IntoResponse {
    if state.ticket_limiter.check().is_err() {
        return (StatusCode::TOO_MANY_REQUESTS, "Too many ticket requests").into_response();
    }

    let session_id = Uuid::new_v4();
    match issue_ticket(
        session_id,
        state.config.ticket_ttl_secs,
        &state.config.ticket_secret,
    ) {
        Ok(ticket) => Json(TicketResponse {
            session_id,
            ticket,
            expires_in_secs: state.config.ticket_ttl_secs,
        })
        .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to issue ticket");
            (StatusCode::INTERNAL_SERVER_ERROR, "Ticket issue failed").into_response()
        }
    }
}
