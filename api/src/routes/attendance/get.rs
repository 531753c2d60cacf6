use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};

use crate::{auth::AuthUser, response::ApiResponse};
use util::state::AppState;

use super::common::ReportQuery;
use db::compile::{self, CompilationReport, DEFAULT_WINDOW_DAYS};
use db::models::session_token::{Column as TokenCol, Entity as TokenEntity};

/// GET /api/classes/{class_id}/attendance/report?window_days=15
///
/// Compiles per-student attendance percentages and tiers over the trailing
/// window. Read-only; identical ledgers produce identical reports.
pub async fn get_report(
    State(state): State<AppState>,
    Path(class_id): Path<i64>,
    AuthUser(_claims): AuthUser,
    Query(query): Query<ReportQuery>,
) -> (StatusCode, Json<ApiResponse<Option<CompilationReport>>>) {
    let db = state.db();
    let window_days = query
        .window_days
        .unwrap_or(DEFAULT_WINDOW_DAYS)
        .clamp(1, 365);

    match compile::compile(db, class_id, window_days, Utc::now()).await {
        Ok(report) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                Some(report),
                "Attendance report compiled",
            )),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(format!(
                "Failed to compile attendance report: {e}"
            ))),
        ),
    }
}

/// GET /api/classes/{class_id}/attendance/tokens/{token_id}/payload
///
/// Returns the scannable payload for an issued token so the presentation
/// layer can re-render it.
pub async fn get_token_payload(
    State(state): State<AppState>,
    Path((class_id, token_id)): Path<(i64, i64)>,
    AuthUser(_claims): AuthUser,
) -> (StatusCode, Json<ApiResponse<serde_json::Value>>) {
    let db = state.db();

    let token = TokenEntity::find_by_id(token_id)
        .filter(TokenCol::ClassId.eq(class_id))
        .one(db)
        .await;

    match token {
        Ok(Some(token)) => (
            StatusCode::OK,
            Json(ApiResponse::success(token.payload(), "Attendance token payload")),
        ),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("Attendance token not found")),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(format!(
                "Failed to fetch attendance token: {e}"
            ))),
        ),
    }
}
