//! Sample result entity, stored alongside its sample in the tenant schema

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sample_results")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub sample_id: Uuid,

    #[sea_orm(column_type = "String(StringLen::N(200))")]
    pub test_name: String,

    #[sea_orm(column_type = "Text")]
    pub result_value: String,

    #[sea_orm(column_type = "String(StringLen::N(50))", nullable)]
    pub unit: Option<String>,

    #[sea_orm(column_type = "String(StringLen::N(100))", nullable)]
    pub reference_range: Option<String>,

    pub is_abnormal: bool,

    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::sample::Entity",
        from = "Column::SampleId",
        to = "super::sample::Column::Id",
        on_delete = "Cascade"
    )]
    Sample,
}

impl Related<super::sample::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sample.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
