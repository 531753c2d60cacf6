use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

/// One row per `(token, student)` redemption. The composite primary key is
/// the idempotency key: a second redemption by the same student cannot
/// exist, whatever the interleaving.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, serde::Serialize)]
#[sea_orm(table_name = "token_redemptions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub token_id: i64,
    #[sea_orm(primary_key, auto_increment = false)]
    pub student_id: i64,

    pub redeemed_at: DateTime<Utc>,
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
