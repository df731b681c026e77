//! Per-center sample registry
//!
//! Every operation runs on the connection of a [`TenantScope`], so the
//! unqualified `samples` / `sample_results` tables always resolve to the
//! scope's center. The registry never commits; the caller owns the scope.

mod filter;

pub use filter::{DateBound, ResultFilter, ResultQuery, SampleFilter, SampleQuery, StatusFilter};

use crate::db::models::*;
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::tenancy::TenantScope;
use crate::validation;
use chrono::{DateTime, FixedOffset};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, LoaderTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

// ============================================================================
// Inputs
// ============================================================================

/// Fields for a new sample
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewSample {
    #[validate(length(min = 1, max = 200))]
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[validate(length(min = 1, max = 100))]
    pub sample_type: String,

    pub collection_date: DateTime<FixedOffset>,

    #[serde(default)]
    pub processed_date: Option<DateTime<FixedOffset>>,

    /// Defaults to `collected`
    #[serde(default)]
    pub status: Option<String>,

    #[serde(default)]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Partial sample update; absent fields are left untouched
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct SampleUpdate {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,

    pub description: Option<String>,

    #[validate(length(min = 1, max = 100))]
    pub sample_type: Option<String>,

    pub collection_date: Option<DateTime<FixedOffset>>,

    pub processed_date: Option<DateTime<FixedOffset>>,

    pub status: Option<String>,

    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Fields for a new test result
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewResult {
    #[validate(length(min = 1, max = 200))]
    pub test_name: String,

    #[validate(length(min = 1))]
    pub result_value: String,

    #[validate(length(max = 50))]
    #[serde(default)]
    pub unit: Option<String>,

    #[validate(length(max = 100))]
    #[serde(default)]
    pub reference_range: Option<String>,

    #[serde(default)]
    pub is_abnormal: bool,

    #[serde(default)]
    pub notes: Option<String>,
}

// ============================================================================
// Outputs
// ============================================================================

/// A sample with its results, newest result first
#[derive(Debug, Clone, Serialize)]
pub struct SampleDetail {
    #[serde(flatten)]
    pub sample: Sample,
    pub results: Vec<SampleResult>,
    pub results_count: usize,
}

impl SampleDetail {
    pub fn new(sample: Sample, results: Vec<SampleResult>) -> Self {
        Self {
            results_count: results.len(),
            sample,
            results,
        }
    }
}

/// Status counts for one center
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SampleStatistics {
    pub total_samples: u64,
    pub status_distribution: BTreeMap<SampleStatus, u64>,
    pub current_schema: String,
}

impl SampleStatistics {
    /// Build from grouped counts; statuses with no samples report zero
    pub fn from_counts<I>(counts: I, current_schema: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = (SampleStatus, i64)>,
    {
        let mut status_distribution: BTreeMap<SampleStatus, u64> =
            SampleStatus::ALL.iter().map(|s| (*s, 0)).collect();

        for (status, count) in counts {
            *status_distribution.entry(status).or_default() += count.max(0) as u64;
        }

        Self {
            total_samples: status_distribution.values().sum(),
            status_distribution,
            current_schema: current_schema.into(),
        }
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Sample and result operations bound to one tenant scope
pub struct SampleRegistry<'a> {
    scope: &'a TenantScope,
}

impl<'a> SampleRegistry<'a> {
    pub fn new(scope: &'a TenantScope) -> Self {
        Self { scope }
    }

    fn conn(&self) -> &DatabaseTransaction {
        self.scope.conn()
    }

    fn schema(&self) -> &str {
        self.scope.schema_name().as_str()
    }

    // ------------------------------------------------------------------------
    // Samples
    // ------------------------------------------------------------------------

    /// List samples matching `filter`, newest first, with their results
    pub async fn list_samples(&self, filter: &SampleFilter) -> Result<Vec<SampleDetail>> {
        let samples = SampleEntity::find()
            .filter(filter.condition())
            .order_by_desc(SampleColumn::CreatedAt)
            .all(self.conn())
            .await?;

        let results = samples
            .load_many(
                SampleResultEntity::find().order_by_desc(SampleResultColumn::CreatedAt),
                self.conn(),
            )
            .await?;

        debug!(schema = %self.schema(), count = samples.len(), "Listed samples");

        Ok(samples
            .into_iter()
            .zip(results)
            .map(|(sample, results)| SampleDetail::new(sample, results))
            .collect())
    }

    /// Fetch one sample with its results
    pub async fn get_sample(&self, id: Uuid) -> Result<SampleDetail> {
        let sample = self.find_sample(id).await?;
        let results = SampleResultEntity::find()
            .filter(SampleResultColumn::SampleId.eq(id))
            .order_by_desc(SampleResultColumn::CreatedAt)
            .all(self.conn())
            .await?;

        Ok(SampleDetail::new(sample, results))
    }

    /// Register a sample; `created_by` is the creating user's email
    pub async fn create_sample(&self, new: NewSample, created_by: &str) -> Result<Sample> {
        validation::validate(&new)?;

        let status = match new.status.as_deref() {
            Some(raw) => raw.parse()?,
            None => SampleStatus::default(),
        };
        let now = chrono::Utc::now();

        let sample = SampleActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(new.name),
            description: Set(new.description),
            sample_type: Set(new.sample_type),
            collection_date: Set(new.collection_date),
            processed_date: Set(new.processed_date),
            status: Set(status),
            metadata: Set(serde_json::Value::Object(new.metadata.unwrap_or_default())),
            created_by: Set(created_by.to_string()),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(self.conn())
        .await?;

        metrics::record_sample_created(self.schema());
        info!(schema = %self.schema(), sample_id = %sample.id, "Sample created");

        Ok(sample)
    }

    /// Apply a partial update
    ///
    /// A `status` value goes through the same check as [`Self::update_status`].
    pub async fn update_sample(&self, id: Uuid, update: SampleUpdate) -> Result<Sample> {
        validation::validate(&update)?;

        let status = update
            .status
            .as_deref()
            .map(str::parse::<SampleStatus>)
            .transpose()?;

        let mut sample: SampleActiveModel = self.find_sample(id).await?.into();

        if let Some(name) = update.name {
            sample.name = Set(name);
        }
        if let Some(description) = update.description {
            sample.description = Set(Some(description));
        }
        if let Some(sample_type) = update.sample_type {
            sample.sample_type = Set(sample_type);
        }
        if let Some(collection_date) = update.collection_date {
            sample.collection_date = Set(collection_date);
        }
        if let Some(processed_date) = update.processed_date {
            sample.processed_date = Set(Some(processed_date));
        }
        if let Some(status) = status {
            sample.status = Set(status);
        }
        if let Some(metadata) = update.metadata {
            sample.metadata = Set(serde_json::Value::Object(metadata));
        }
        sample.updated_at = Set(chrono::Utc::now().into());

        let sample = sample.update(self.conn()).await?;
        info!(schema = %self.schema(), sample_id = %sample.id, "Sample updated");
        Ok(sample)
    }

    /// Delete a sample and, by cascade, its results
    pub async fn delete_sample(&self, id: Uuid) -> Result<()> {
        let result = SampleEntity::delete_by_id(id).exec(self.conn()).await?;
        if result.rows_affected == 0 {
            return Err(AppError::SampleNotFound { id: id.to_string() });
        }

        info!(schema = %self.schema(), sample_id = %id, "Sample deleted");
        Ok(())
    }

    /// Move a sample to `new_status`, touching nothing but status and
    /// `updated_at`
    pub async fn update_status(&self, id: Uuid, new_status: &str) -> Result<Sample> {
        let sample = self.find_sample(id).await?;
        let status: SampleStatus = new_status.parse()?;

        let mut active: SampleActiveModel = sample.into();
        active.status = Set(status);
        active.updated_at = Set(chrono::Utc::now().into());
        let sample = active.update(self.conn()).await?;

        metrics::record_status_transition(self.schema(), status.as_str());
        info!(
            schema = %self.schema(),
            sample_id = %id,
            status = %status,
            "Sample status updated"
        );

        Ok(sample)
    }

    // ------------------------------------------------------------------------
    // Results
    // ------------------------------------------------------------------------

    /// Attach a result to a sample
    ///
    /// An unknown sample is reported before the input is validated; either
    /// failure leaves no result row behind.
    pub async fn add_result(&self, sample_id: Uuid, new: NewResult) -> Result<SampleResult> {
        self.find_sample(sample_id).await?;
        validation::validate(&new)?;

        let result = SampleResultActiveModel {
            id: Set(Uuid::new_v4()),
            sample_id: Set(sample_id),
            test_name: Set(new.test_name),
            result_value: Set(new.result_value),
            unit: Set(new.unit),
            reference_range: Set(new.reference_range),
            is_abnormal: Set(new.is_abnormal),
            notes: Set(new.notes),
            created_at: Set(chrono::Utc::now().into()),
        }
        .insert(self.conn())
        .await?;

        metrics::record_result_created(self.schema());
        info!(
            schema = %self.schema(),
            sample_id = %sample_id,
            result_id = %result.id,
            "Result recorded"
        );

        Ok(result)
    }

    /// List results matching `filter`, newest first
    pub async fn list_results(&self, filter: &ResultFilter) -> Result<Vec<SampleResult>> {
        SampleResultEntity::find()
            .filter(filter.condition())
            .order_by_desc(SampleResultColumn::CreatedAt)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Fetch one result
    pub async fn get_result(&self, id: Uuid) -> Result<SampleResult> {
        SampleResultEntity::find_by_id(id)
            .one(self.conn())
            .await?
            .ok_or_else(|| AppError::NotFound {
                resource_type: "SampleResult".to_string(),
                id: id.to_string(),
            })
    }

    // ------------------------------------------------------------------------
    // Statistics
    // ------------------------------------------------------------------------

    /// Count samples per status in a single grouped query
    pub async fn statistics(&self) -> Result<SampleStatistics> {
        let counts = SampleEntity::find()
            .select_only()
            .column(SampleColumn::Status)
            .column_as(Expr::col(SampleColumn::Id).count(), "count")
            .group_by(SampleColumn::Status)
            .into_tuple::<(SampleStatus, i64)>()
            .all(self.conn())
            .await?;

        Ok(SampleStatistics::from_counts(counts, self.schema()))
    }

    async fn find_sample(&self, id: Uuid) -> Result<Sample> {
        SampleEntity::find_by_id(id)
            .one(self.conn())
            .await?
            .ok_or_else(|| AppError::SampleNotFound { id: id.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statistics_zero_fill() {
        let stats = SampleStatistics::from_counts([(SampleStatus::Completed, 3)], "acme");

        assert_eq!(stats.total_samples, 3);
        assert_eq!(stats.status_distribution.len(), 4);
        assert_eq!(stats.status_distribution[&SampleStatus::Collected], 0);
        assert_eq!(stats.status_distribution[&SampleStatus::Completed], 3);
        assert_eq!(stats.current_schema, "acme");
    }

    #[test]
    fn test_statistics_total_is_sum() {
        let stats = SampleStatistics::from_counts(
            [
                (SampleStatus::Collected, 2),
                (SampleStatus::Processing, 5),
                (SampleStatus::Failed, 1),
            ],
            "labx",
        );
        let sum: u64 = stats.status_distribution.values().sum();
        assert_eq!(stats.total_samples, sum);
        assert_eq!(stats.total_samples, 8);
    }

    #[test]
    fn test_statistics_json_shape() {
        let stats = SampleStatistics::from_counts([], "acme");
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "total_samples": 0,
                "status_distribution": {
                    "collected": 0,
                    "processing": 0,
                    "completed": 0,
                    "failed": 0
                },
                "current_schema": "acme"
            })
        );
    }

    #[test]
    fn test_new_result_validation() {
        let mut result = NewResult {
            test_name: "Hemoglobin".into(),
            result_value: "13.5".into(),
            unit: Some("g/dL".into()),
            reference_range: Some("12-16".into()),
            is_abnormal: false,
            notes: None,
        };
        assert!(validation::validate(&result).is_ok());

        result.test_name.clear();
        result.unit = Some("x".repeat(51));
        let AppError::FieldValidation { errors } = validation::validate(&result).unwrap_err() else {
            panic!("expected field errors");
        };
        assert!(errors.contains_key("test_name"));
        assert!(errors.contains_key("unit"));
    }

    #[test]
    fn test_new_sample_metadata_must_be_object() {
        let ok: std::result::Result<NewSample, _> = serde_json::from_value(serde_json::json!({
            "name": "S-1",
            "sample_type": "blood",
            "collection_date": "2024-03-01T08:00:00Z",
            "metadata": { "tube": "EDTA" }
        }));
        assert!(ok.is_ok());

        let bad: std::result::Result<NewSample, _> = serde_json::from_value(serde_json::json!({
            "name": "S-1",
            "sample_type": "blood",
            "collection_date": "2024-03-01T08:00:00Z",
            "metadata": [1, 2]
        }));
        assert!(bad.is_err());
    }

    #[test]
    fn test_sample_detail_counts_results() {
        let now = chrono::Utc::now().fixed_offset();
        let sample = Sample {
            id: Uuid::new_v4(),
            name: "S-1".into(),
            description: None,
            sample_type: "blood".into(),
            collection_date: now,
            processed_date: None,
            status: SampleStatus::Collected,
            metadata: serde_json::json!({}),
            created_by: "tech@acme.org".into(),
            created_at: now,
            updated_at: now,
        };
        let detail = SampleDetail::new(sample, Vec::new());
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["results_count"], 0);
        assert_eq!(json["status"], "collected");
        assert_eq!(json["created_by"], "tech@acme.org");
    }
}
