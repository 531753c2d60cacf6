use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    #[sea_orm(string_value = "present")]
    Present,
    #[sea_orm(string_value = "absent")]
    Absent,
    #[sea_orm(string_value = "late")]
    Late,
}

/// Provenance of an attendance record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum RecordMethod {
    #[sea_orm(string_value = "token_redeem")]
    TokenRedeem,
    #[sea_orm(string_value = "manual")]
    Manual,
    #[sea_orm(string_value = "image_upload")]
    ImageUpload,
}

/// The append-only attendance ledger. `(student_id, subject_id, date)` is
/// unique whatever the marking method — the durable anti-double-marking
/// guarantee, independent of the token-level de-dup.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, serde::Serialize)]
#[sea_orm(table_name = "attendance_records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub student_id: i64,
    pub subject_id: i64,
    pub class_id: i64,
    /// Calendar-day granularity, not a timestamp.
    pub date: NaiveDate,
    pub status: RecordStatus,
    pub method: RecordMethod,
    /// Audit back-reference, set only when `method` is `token_redeem`.
    pub token_id: Option<i64>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::session_token::Entity",
        from = "Column::TokenId",
        to = "super::session_token::Column::Id"
    )]
    Token,
}

impl Related<super::session_token::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Token.def()
    }
    fn via() -> Option<RelationDef> {
        None
    }
}

impl ActiveModelBehavior for ActiveModel {}
