//! Sample result handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use labtrack_common::{
    db::models::SampleResult,
    errors::Result,
    registry::{NewResult, ResultFilter, ResultQuery, SampleRegistry},
    tenancy::{TenantContext, TenantScope},
    validation::ValidatedJson,
};

/// Result creation through the collection route names its sample in the body
#[derive(Debug, Deserialize, Validate)]
pub struct CreateResultRequest {
    pub sample: Uuid,

    #[serde(flatten)]
    #[validate(nested)]
    pub result: NewResult,
}

/// List results, newest first
pub async fn list_results(
    State(state): State<AppState>,
    tenant: TenantContext,
    Query(query): Query<ResultQuery>,
) -> Result<Json<Vec<SampleResult>>> {
    let filter = ResultFilter::parse(&query)?;

    let scope = TenantScope::enter(state.db.connection(), tenant).await?;
    let results = SampleRegistry::new(&scope).list_results(&filter).await?;
    scope.commit().await?;

    Ok(Json(results))
}

/// Record a result for the sample named in the body
pub async fn create_result(
    State(state): State<AppState>,
    tenant: TenantContext,
    ValidatedJson(request): ValidatedJson<CreateResultRequest>,
) -> Result<(StatusCode, Json<SampleResult>)> {
    let scope = TenantScope::enter(state.db.connection(), tenant).await?;
    let result = SampleRegistry::new(&scope)
        .add_result(request.sample, request.result)
        .await?;
    scope.commit().await?;

    Ok((StatusCode::CREATED, Json(result)))
}

/// Get one result
pub async fn get_result(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(result_id): Path<Uuid>,
) -> Result<Json<SampleResult>> {
    let scope = TenantScope::enter(state.db.connection(), tenant).await?;
    let result = SampleRegistry::new(&scope).get_result(result_id).await?;
    scope.commit().await?;

    Ok(Json(result))
}
