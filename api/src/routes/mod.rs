//! HTTP route entry point for `/api/...`.
//!
//! Route groups include:
//! - `/health` → Health check endpoint (public)
//! - `/classes/{class_id}/attendance` → Token issuance, redemption, and
//!   compiled attendance reports (authenticated via Bearer JWT; the
//!   identity in the token is the issuer/redeemer)

use crate::routes::{attendance::attendance_routes, health::health_routes};
use axum::Router;
use util::state::AppState;

pub mod attendance;
pub mod health;

/// Builds the complete application router for all HTTP endpoints.
///
/// The returned router has `AppState` as its state type and mounts all core
/// API routes under their respective base paths.
pub fn routes(app_state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/health", health_routes())
        .nest(
            "/classes/{class_id}/attendance",
            attendance_routes(app_state.clone()),
        )
        .with_state(app_state)
}
