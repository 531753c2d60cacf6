use chrono::{DateTime, Duration, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::{Expr, Query};
use sea_orm::{DatabaseConnection, QueryFilter, Set};
use serde_json::json;

use crate::models::attendance_record;

/// Bounds on a token's validity window, in minutes.
pub const MIN_VALIDITY_MINUTES: i64 = 1;
pub const MAX_VALIDITY_MINUTES: i64 = 60;
pub const DEFAULT_VALIDITY_MINUTES: i64 = 10;

/// A short-lived, single-use-per-student credential gating attendance
/// marking for one class session. Redemptions live in `token_redemptions`;
/// at most one per `(token, student)` is enforced by that table's key.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, serde::Serialize)]
#[sea_orm(table_name = "session_tokens")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Opaque unguessable identifier, 32 bytes of OS randomness hex-encoded.
    pub code: String,
    pub subject_id: i64,
    pub class_id: i64,
    pub issued_by: i64,
    /// Cleared by explicit cancellation, independent of time expiry.
    pub active: bool,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::token_redemption::Entity")]
    Redemptions,
    #[sea_orm(has_many = "super::attendance_record::Entity")]
    Records,
}

impl Related<super::token_redemption::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Redemptions.def()
    }
    fn via() -> Option<RelationDef> {
        None
    }
}

impl Related<super::attendance_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Records.def()
    }
    fn via() -> Option<RelationDef> {
        None
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Issues a new token for a (subject, class) pair with a bounded
    /// validity window. `validity_minutes` is clamped to a sane range;
    /// identity of `issued_by` is the caller's responsibility (verified
    /// upstream by the auth collaborator).
    pub async fn issue(
        db: &DatabaseConnection,
        subject_id: i64,
        class_id: i64,
        issued_by: i64,
        validity_minutes: i64,
        now: DateTime<Utc>,
    ) -> Result<Self, DbErr> {
        let validity = validity_minutes.clamp(MIN_VALIDITY_MINUTES, MAX_VALIDITY_MINUTES);

        let code = {
            use rand::RngCore;
            let mut buf = [0u8; 32];
            rand::rngs::OsRng.fill_bytes(&mut buf);
            hex::encode(buf)
        };

        ActiveModel {
            code: Set(code),
            subject_id: Set(subject_id),
            class_id: Set(class_id),
            issued_by: Set(issued_by),
            active: Set(true),
            issued_at: Set(now),
            expires_at: Set(now + Duration::minutes(validity)),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    /// Looks up a token by code, requiring the claimed subject and class to
    /// match. A mismatch is indistinguishable from an unknown code.
    pub async fn find_by_code(
        db: &DatabaseConnection,
        code: &str,
        subject_id: i64,
        class_id: i64,
    ) -> Result<Option<Self>, DbErr> {
        Entity::find()
            .filter(Column::Code.eq(code))
            .filter(Column::SubjectId.eq(subject_id))
            .filter(Column::ClassId.eq(class_id))
            .one(db)
            .await
    }

    /// Cancels a token ahead of its natural expiry. Idempotent: cancelling
    /// an already-inactive token is a no-op.
    pub async fn cancel(
        db: &DatabaseConnection,
        token_id: i64,
        class_id: i64,
    ) -> Result<Self, DbErr> {
        let Some(token) = Entity::find_by_id(token_id)
            .filter(Column::ClassId.eq(class_id))
            .one(db)
            .await?
        else {
            return Err(DbErr::RecordNotFound(format!(
                "Session token ID {token_id} not found"
            )));
        };

        if !token.active {
            return Ok(token);
        }

        let mut active: ActiveModel = token.into();
        active.active = Set(false);
        active.update(db).await
    }

    #[inline]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// The scannable payload handed to the presentation layer for encoding.
    /// The encoding itself (QR image etc.) is not this system's concern.
    pub fn payload(&self) -> serde_json::Value {
        json!({
            "code": self.code,
            "subject_id": self.subject_id,
            "class_id": self.class_id,
            "issued_at": self.issued_at.to_rfc3339(),
        })
    }

    /// Removes tokens whose expiry is older than the retention cutoff and
    /// that no ledger row references; their redemption rows cascade. This is
    /// space reclamation only — expiry is always enforced by the validator's
    /// own time check, never by this sweep.
    pub async fn purge_expired(
        db: &DatabaseConnection,
        now: DateTime<Utc>,
        retention_days: i64,
    ) -> Result<u64, DbErr> {
        let cutoff = now - Duration::days(retention_days);

        let referenced = Query::select()
            .column(attendance_record::Column::TokenId)
            .from(attendance_record::Entity)
            .and_where(attendance_record::Column::TokenId.is_not_null())
            .to_owned();

        let res = Entity::delete_many()
            .filter(Column::ExpiresAt.lt(cutoff))
            .filter(Expr::col(Column::Id).not_in_subquery(referenced))
            .exec(db)
            .await?;

        Ok(res.rows_affected)
    }
}
