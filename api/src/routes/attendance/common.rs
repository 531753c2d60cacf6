use serde::{Deserialize, Serialize};
use validator::Validate;

use db::models::session_token::Model as SessionToken;

#[derive(Debug, Deserialize)]
pub struct IssueTokenReq {
    pub subject_id: i64,
    /// Requested validity window; clamped by the issuer to its sane range.
    pub validity_minutes: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RedeemReq {
    #[validate(length(min = 1, max = 128))]
    pub code: String,
    pub subject_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub window_days: Option<i64>,
}

#[derive(Debug, Serialize, Default)]
pub struct SessionTokenResponse {
    pub id: i64,
    pub code: String,
    pub subject_id: i64,
    pub class_id: i64,
    pub issued_by: i64,
    pub active: bool,
    pub issued_at: String,
    pub expires_at: String,
    /// The scannable payload; encoding it (QR image etc.) is a presentation
    /// concern.
    pub payload: serde_json::Value,
}

impl From<SessionToken> for SessionTokenResponse {
    fn from(token: SessionToken) -> Self {
        let payload = token.payload();
        Self {
            id: token.id,
            code: token.code,
            subject_id: token.subject_id,
            class_id: token.class_id,
            issued_by: token.issued_by,
            active: token.active,
            issued_at: token.issued_at.to_rfc3339(),
            expires_at: token.expires_at.to_rfc3339(),
            payload,
        }
    }
}
