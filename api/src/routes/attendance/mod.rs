use axum::{
    Router,
    routing::{delete, get, post},
};
use util::state::AppState;

mod common;
mod delete;
mod get;
mod post;

pub use delete::cancel_token;
pub use get::{get_report, get_token_payload};
pub use post::{issue_token, redeem};

/// Route group for `/classes/{class_id}/attendance`.
///
/// Teacher-facing: token issuance, cancellation, payload retrieval, and the
/// compiled report. Student-facing: redemption. All handlers take identity
/// from the verified JWT; finer-grained role checks belong to the external
/// authorization collaborator.
pub fn attendance_routes(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route("/tokens", post(issue_token))
        .route("/tokens/{token_id}", delete(cancel_token))
        .route("/tokens/{token_id}/payload", get(get_token_payload))
        .route("/redeem", post(redeem))
        .route("/report", get(get_report))
        .with_state(app_state)
}
