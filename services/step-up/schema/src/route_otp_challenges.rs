use sea_orm::entity::prelude::*;

/// One emailed one-time code for a (user, route) pair.
/// Only the salted hash is stored. Rows are never deleted.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "route_otp_challenges")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub owner_user_id: Uuid,
    pub route_key: String,
    pub code_hash: String,
    pub code_salt: String,
    pub attempt_count: i32,
    pub max_attempts: i32,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    pub invalidated_at: Option<chrono::DateTime<chrono::Utc>>,
    pub consumed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
