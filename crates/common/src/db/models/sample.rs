//! Sample entity, stored in each center's own schema
//!
//! The table name is unqualified: which schema it resolves to is decided by
//! the transaction-local `search_path` of the surrounding tenant scope.

use crate::errors::AppError;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a sample
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash,
    EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(50))")]
#[serde(rename_all = "snake_case")]
pub enum SampleStatus {
    #[sea_orm(string_value = "collected")]
    Collected,
    #[sea_orm(string_value = "processing")]
    Processing,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "failed")]
    Failed,
}

impl SampleStatus {
    /// Every status, in display order
    pub const ALL: [SampleStatus; 4] = [
        SampleStatus::Collected,
        SampleStatus::Processing,
        SampleStatus::Completed,
        SampleStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SampleStatus::Collected => "collected",
            SampleStatus::Processing => "processing",
            SampleStatus::Completed => "completed",
            SampleStatus::Failed => "failed",
        }
    }
}

impl Default for SampleStatus {
    fn default() -> Self {
        SampleStatus::Collected
    }
}

impl fmt::Display for SampleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SampleStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "collected" => Ok(SampleStatus::Collected),
            "processing" => Ok(SampleStatus::Processing),
            "completed" => Ok(SampleStatus::Completed),
            "failed" => Ok(SampleStatus::Failed),
            other => Err(AppError::InvalidStatus {
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "samples")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "String(StringLen::N(200))")]
    pub name: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    /// Free-form tag (blood, urine, ...)
    #[sea_orm(column_type = "String(StringLen::N(100))")]
    pub sample_type: String,

    pub collection_date: DateTimeWithTimeZone,

    pub processed_date: Option<DateTimeWithTimeZone>,

    pub status: SampleStatus,

    #[sea_orm(column_type = "JsonBinary")]
    pub metadata: serde_json::Value,

    /// Email of the creating user; users live in another schema, so this is
    /// captured by value rather than referenced
    #[sea_orm(column_type = "String(StringLen::N(254))")]
    pub created_by: String,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::sample_result::Entity")]
    Results,
}

impl Related<super::sample_result::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Results.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_accepts_only_known_values() {
        for status in SampleStatus::ALL {
            assert_eq!(status.as_str().parse::<SampleStatus>().unwrap(), status);
        }
        assert!("Collected".parse::<SampleStatus>().is_err());
        assert!("archived".parse::<SampleStatus>().is_err());
        assert!("".parse::<SampleStatus>().is_err());
    }

    #[test]
    fn test_status_default_is_collected() {
        assert_eq!(SampleStatus::default(), SampleStatus::Collected);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&SampleStatus::Processing).unwrap();
        assert_eq!(json, "\"processing\"");
    }

    #[test]
    fn test_all_matches_active_enum_iter() {
        use sea_orm::Iterable;
        let iterated: Vec<_> = SampleStatus::iter().collect();
        assert_eq!(iterated, SampleStatus::ALL.to_vec());
    }
}
