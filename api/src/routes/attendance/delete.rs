use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use sea_orm::DbErr;

use crate::{auth::AuthUser, response::ApiResponse};
use util::state::AppState;

use db::models::session_token;

/// DELETE /api/classes/{class_id}/attendance/tokens/{token_id}
///
/// Cancels a token ahead of its natural expiry. In-flight redemptions that
/// have not yet committed will observe the cancellation.
pub async fn cancel_token(
    State(state): State<AppState>,
    Path((class_id, token_id)): Path<(i64, i64)>,
    AuthUser(_claims): AuthUser,
) -> (StatusCode, Json<ApiResponse<()>>) {
    let db = state.db();

    match session_token::Model::cancel(db, token_id, class_id).await {
        Ok(_) => (
            StatusCode::OK,
            Json(ApiResponse::success((), "Attendance token cancelled")),
        ),
        Err(DbErr::RecordNotFound(_)) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("Attendance token not found")),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(format!(
                "Failed to cancel attendance token: {e}"
            ))),
        ),
    }
}
