use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use validator::Validate;

use crate::{auth::AuthUser, response::ApiResponse};
use util::state::AppState;

use super::common::{IssueTokenReq, RedeemReq, SessionTokenResponse};
use db::models::session_token::{self, DEFAULT_VALIDITY_MINUTES};
use db::redemption::{self, RedemptionError};

/// POST /api/classes/{class_id}/attendance/tokens
///
/// Issues a fresh session token for one class session. The caller's verified
/// identity becomes the issuer.
pub async fn issue_token(
    State(state): State<AppState>,
    Path(class_id): Path<i64>,
    AuthUser(claims): AuthUser,
    Json(body): Json<IssueTokenReq>,
) -> (StatusCode, Json<ApiResponse<SessionTokenResponse>>) {
    let db = state.db();
    let validity = body.validity_minutes.unwrap_or(DEFAULT_VALIDITY_MINUTES);

    match session_token::Model::issue(
        db,
        body.subject_id,
        class_id,
        claims.sub,
        validity,
        Utc::now(),
    )
    .await
    {
        Ok(token) => (
            StatusCode::CREATED,
            Json(ApiResponse::success(
                SessionTokenResponse::from(token),
                "Attendance token issued",
            )),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(format!(
                "Failed to issue attendance token: {e}"
            ))),
        ),
    }
}

/// POST /api/classes/{class_id}/attendance/redeem
///
/// Redeems a session token for the authenticated student. Exactly-once:
/// duplicate taps and concurrent retries surface as "already recorded"
/// rather than a failure or a second mark.
pub async fn redeem(
    State(state): State<AppState>,
    Path(class_id): Path<i64>,
    AuthUser(claims): AuthUser,
    Json(body): Json<RedeemReq>,
) -> (StatusCode, Json<ApiResponse<()>>) {
    let db = state.db();

    // Malformed payloads are rejected before any lookup.
    if body.validate().is_err() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("Invalid attendance code")),
        );
    }

    match redemption::redeem(
        db,
        &body.code,
        body.subject_id,
        class_id,
        claims.sub,
        Utc::now(),
    )
    .await
    {
        Ok(_record) => (
            StatusCode::OK,
            Json(ApiResponse::success((), "Attendance recorded")),
        ),
        Err(e @ RedemptionError::AlreadyMarked) => {
            (StatusCode::CONFLICT, Json(ApiResponse::error(e.to_string())))
        }
        Err(e @ RedemptionError::Expired) => {
            (StatusCode::GONE, Json(ApiResponse::error(e.to_string())))
        }
        Err(e @ RedemptionError::InvalidToken) => {
            (StatusCode::NOT_FOUND, Json(ApiResponse::error(e.to_string())))
        }
        Err(e @ RedemptionError::NotEnrolled) => {
            (StatusCode::FORBIDDEN, Json(ApiResponse::error(e.to_string())))
        }
        Err(RedemptionError::Storage(_)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error("Failed to record attendance")),
        ),
    }
}
