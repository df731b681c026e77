//! User account entity, stored in the shared schema

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(schema_name = "public", table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Login identifier
    #[sea_orm(column_type = "String(StringLen::N(254))", unique)]
    pub email: String,

    #[sea_orm(column_type = "String(StringLen::N(150))")]
    pub username: String,

    #[sea_orm(column_type = "String(StringLen::N(150))")]
    pub first_name: String,

    #[sea_orm(column_type = "String(StringLen::N(150))")]
    pub last_name: String,

    #[sea_orm(column_type = "String(StringLen::N(20))", nullable)]
    pub phone: Option<String>,

    pub center_id: Option<Uuid>,

    pub is_center_admin: bool,

    pub is_active: bool,

    pub is_staff: bool,

    /// Argon2 PHC string
    #[serde(skip_serializing)]
    #[sea_orm(column_type = "Text")]
    pub password_hash: String,

    pub last_login: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::center::Entity",
        from = "Column::CenterId",
        to = "super::center::Column::Id",
        on_delete = "Cascade"
    )]
    Center,

    #[sea_orm(has_many = "super::user_session::Entity")]
    Sessions,
}

impl Related<super::center::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Center.def()
    }
}

impl Related<super::user_session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sessions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
