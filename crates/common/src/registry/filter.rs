//! Query-string filters for sample and result listings

use crate::db::models::{SampleColumn, SampleResultColumn, SampleStatus};
use crate::errors::{AppError, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, Condition};
use serde::Deserialize;
use uuid::Uuid;

/// Raw `GET /api/samples/` parameters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SampleQuery {
    pub status: Option<String>,
    pub sample_type: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Upper bound on `collection_date`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateBound {
    /// `<=` an explicit timestamp
    Inclusive(DateTime<FixedOffset>),
    /// `<` the start of the day after a date-only bound
    Before(DateTime<FixedOffset>),
}

/// Requested sample status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    Is(SampleStatus),
    /// A value outside the four statuses; matches no sample
    NoMatch,
}

/// Parsed sample filter; every predicate is optional and they AND together
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleFilter {
    pub status: Option<StatusFilter>,
    pub sample_type: Option<String>,
    pub collected_from: Option<DateTime<FixedOffset>>,
    pub collected_to: Option<DateBound>,
}

impl SampleFilter {
    /// Parse query parameters; empty values count as absent
    pub fn parse(query: &SampleQuery) -> Result<Self> {
        let status = present(&query.status).map(|raw| match raw.parse::<SampleStatus>() {
            Ok(status) => StatusFilter::Is(status),
            Err(_) => StatusFilter::NoMatch,
        });

        let collected_from = present(&query.start_date)
            .map(|raw| parse_date("start_date", raw))
            .transpose()?
            .map(|date| match date {
                QueryDate::Instant(ts) => ts,
                QueryDate::Day(day) => start_of(day),
            });

        let collected_to = match present(&query.end_date) {
            None => None,
            Some(raw) => Some(match parse_date("end_date", raw)? {
                QueryDate::Instant(ts) => DateBound::Inclusive(ts),
                QueryDate::Day(day) => {
                    let next = day.succ_opt().ok_or_else(|| invalid_date("end_date"))?;
                    DateBound::Before(start_of(next))
                }
            }),
        };

        Ok(Self {
            status,
            sample_type: present(&query.sample_type).map(str::to_string),
            collected_from,
            collected_to,
        })
    }

    pub fn condition(&self) -> Condition {
        let mut cond = Condition::all();

        match self.status {
            Some(StatusFilter::Is(status)) => cond = cond.add(SampleColumn::Status.eq(status)),
            Some(StatusFilter::NoMatch) => cond = cond.add(Expr::value(false)),
            None => {}
        }
        if let Some(sample_type) = &self.sample_type {
            cond = cond.add(SampleColumn::SampleType.eq(sample_type.as_str()));
        }
        if let Some(from) = self.collected_from {
            cond = cond.add(SampleColumn::CollectionDate.gte(from));
        }
        match self.collected_to {
            Some(DateBound::Inclusive(to)) => cond = cond.add(SampleColumn::CollectionDate.lte(to)),
            Some(DateBound::Before(to)) => cond = cond.add(SampleColumn::CollectionDate.lt(to)),
            None => {}
        }

        cond
    }
}

/// Raw `GET /api/sample-results/` parameters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultQuery {
    pub sample: Option<String>,
    pub is_abnormal: Option<String>,
}

/// Parsed result filter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultFilter {
    pub sample_id: Option<Uuid>,
    pub is_abnormal: Option<bool>,
}

impl ResultFilter {
    /// Parse query parameters
    ///
    /// `is_abnormal` is true only for "true" (any case); any other value,
    /// including an empty one, selects normal results.
    pub fn parse(query: &ResultQuery) -> Result<Self> {
        let sample_id = present(&query.sample)
            .map(|raw| {
                Uuid::parse_str(raw).map_err(|_| AppError::Validation {
                    message: format!("'{}' is not a valid UUID.", raw),
                    field: Some("sample".to_string()),
                })
            })
            .transpose()?;

        let is_abnormal = query
            .is_abnormal
            .as_deref()
            .map(|raw| raw.trim().eq_ignore_ascii_case("true"));

        Ok(Self { sample_id, is_abnormal })
    }

    pub fn condition(&self) -> Condition {
        let mut cond = Condition::all();

        if let Some(sample_id) = self.sample_id {
            cond = cond.add(SampleResultColumn::SampleId.eq(sample_id));
        }
        if let Some(is_abnormal) = self.is_abnormal {
            cond = cond.add(SampleResultColumn::IsAbnormal.eq(is_abnormal));
        }

        cond
    }
}

enum QueryDate {
    Instant(DateTime<FixedOffset>),
    Day(NaiveDate),
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Accepts RFC 3339 timestamps and plain `YYYY-MM-DD` dates
fn parse_date(field: &str, raw: &str) -> Result<QueryDate> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(QueryDate::Instant(ts));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(QueryDate::Day)
        .map_err(|_| invalid_date(field))
}

fn start_of(day: NaiveDate) -> DateTime<FixedOffset> {
    day.and_time(NaiveTime::MIN).and_utc().fixed_offset()
}

fn invalid_date(field: &str) -> AppError {
    AppError::Validation {
        message: "Enter a valid date or RFC 3339 timestamp.".to_string(),
        field: Some(field.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{SampleEntity, SampleResultEntity};
    use sea_orm::{DbBackend, EntityTrait, QueryFilter, QueryTrait};

    fn sample_sql(filter: &SampleFilter) -> String {
        SampleEntity::find()
            .filter(filter.condition())
            .build(DbBackend::Postgres)
            .to_string()
    }

    fn query(pairs: &[(&str, &str)]) -> SampleQuery {
        let mut q = SampleQuery::default();
        for (key, value) in pairs {
            let value = Some(value.to_string());
            match *key {
                "status" => q.status = value,
                "sample_type" => q.sample_type = value,
                "start_date" => q.start_date = value,
                "end_date" => q.end_date = value,
                _ => unreachable!(),
            }
        }
        q
    }

    #[test]
    fn test_status_and_type_compose() {
        let filter = SampleFilter::parse(&query(&[("status", "collected"), ("sample_type", "blood")])).unwrap();
        assert_eq!(filter.status, Some(StatusFilter::Is(SampleStatus::Collected)));
        assert_eq!(filter.sample_type.as_deref(), Some("blood"));

        let sql = sample_sql(&filter);
        assert!(sql.contains(r#""samples"."status" = 'collected'"#));
        assert!(sql.contains(r#""samples"."sample_type" = 'blood'"#));
        assert!(sql.contains(" AND "));
    }

    #[test]
    fn test_empty_values_are_absent() {
        let filter = SampleFilter::parse(&query(&[("status", ""), ("sample_type", "  "), ("end_date", "")])).unwrap();
        assert_eq!(filter, SampleFilter::default());

        let sql = sample_sql(&filter);
        assert!(!sql.contains(r#""samples"."status""#));
        assert!(!sql.contains(r#""samples"."sample_type""#));
        assert!(!sql.contains(r#""samples"."collection_date""#));
    }

    #[test]
    fn test_unknown_status_matches_nothing() {
        let filter = SampleFilter::parse(&query(&[("status", "archived"), ("sample_type", "blood")])).unwrap();
        assert_eq!(filter.status, Some(StatusFilter::NoMatch));

        let sql = sample_sql(&filter);
        assert!(sql.contains("FALSE"));
        assert!(!sql.contains("archived"));
        assert!(sql.contains(r#""samples"."sample_type" = 'blood'"#));
    }

    #[test]
    fn test_date_only_end_includes_whole_day() {
        let filter = SampleFilter::parse(&query(&[("start_date", "2024-03-01"), ("end_date", "2024-03-31")])).unwrap();

        let from = DateTime::parse_from_rfc3339("2024-03-01T00:00:00Z").unwrap();
        let before = DateTime::parse_from_rfc3339("2024-04-01T00:00:00Z").unwrap();
        assert_eq!(filter.collected_from, Some(from));
        assert_eq!(filter.collected_to, Some(DateBound::Before(before)));

        let sql = sample_sql(&filter);
        assert!(sql.contains(r#""samples"."collection_date" >="#));
        assert!(sql.contains(r#""samples"."collection_date" <"#));
    }

    #[test]
    fn test_timestamp_end_is_inclusive() {
        let filter = SampleFilter::parse(&query(&[("end_date", "2024-03-31T12:00:00+02:00")])).unwrap();
        let at = DateTime::parse_from_rfc3339("2024-03-31T12:00:00+02:00").unwrap();
        assert_eq!(filter.collected_to, Some(DateBound::Inclusive(at)));
        assert!(sample_sql(&filter).contains(r#""samples"."collection_date" <="#));
    }

    #[test]
    fn test_bad_date_names_field() {
        let err = SampleFilter::parse(&query(&[("start_date", "yesterday")])).unwrap_err();
        assert!(matches!(err, AppError::Validation { field: Some(ref f), .. } if f == "start_date"));
    }

    #[test]
    fn test_result_filter_is_abnormal() {
        let parse = |v: &str| {
            ResultFilter::parse(&ResultQuery { sample: None, is_abnormal: Some(v.to_string()) })
                .unwrap()
                .is_abnormal
        };
        assert_eq!(parse("true"), Some(true));
        assert_eq!(parse("TRUE"), Some(true));
        assert_eq!(parse("false"), Some(false));
        assert_eq!(parse("yes"), Some(false));
        assert_eq!(parse(""), Some(false));

        let absent = ResultFilter::parse(&ResultQuery::default()).unwrap();
        assert_eq!(absent.is_abnormal, None);
    }

    #[test]
    fn test_result_filter_sample() {
        let id = Uuid::new_v4();
        let filter = ResultFilter::parse(&ResultQuery {
            sample: Some(id.to_string()),
            is_abnormal: Some("true".into()),
        })
        .unwrap();
        assert_eq!(filter.sample_id, Some(id));

        let sql = SampleResultEntity::find()
            .filter(filter.condition())
            .build(DbBackend::Postgres)
            .to_string();
        assert!(sql.contains(&id.to_string()));
        assert!(sql.contains(r#""sample_results"."is_abnormal" = TRUE"#));

        let err = ResultFilter::parse(&ResultQuery { sample: Some("nope".into()), is_abnormal: None }).unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }
}
