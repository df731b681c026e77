//! Sample registry handlers
//!
//! Every handler here needs the request host to resolve to a center; the
//! [`TenantContext`] extractor rejects other hosts with 404. Each request
//! runs in its own [`TenantScope`].

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use labtrack_common::{
    auth::AuthContext,
    db::models::{Sample, SampleResult},
    errors::Result,
    registry::{
        NewResult, NewSample, SampleDetail, SampleFilter, SampleQuery, SampleRegistry,
        SampleStatistics, SampleUpdate,
    },
    tenancy::{TenantContext, TenantScope},
    validation::{JsonBody, ValidatedJson},
};

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateStatusRequest {
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub status: String,
}

/// List samples, newest first
pub async fn list_samples(
    State(state): State<AppState>,
    tenant: TenantContext,
    Query(query): Query<SampleQuery>,
) -> Result<Json<Vec<SampleDetail>>> {
    let filter = SampleFilter::parse(&query)?;

    let scope = TenantScope::enter(state.db.connection(), tenant).await?;
    let samples = SampleRegistry::new(&scope).list_samples(&filter).await?;
    scope.commit().await?;

    Ok(Json(samples))
}

/// Register a sample on behalf of the authenticated user
pub async fn create_sample(
    State(state): State<AppState>,
    tenant: TenantContext,
    auth: AuthContext,
    ValidatedJson(request): ValidatedJson<NewSample>,
) -> Result<(StatusCode, Json<SampleDetail>)> {
    let scope = TenantScope::enter(state.db.connection(), tenant).await?;
    let sample = SampleRegistry::new(&scope)
        .create_sample(request, auth.email())
        .await?;
    scope.commit().await?;

    Ok((StatusCode::CREATED, Json(SampleDetail::new(sample, Vec::new()))))
}

/// Get a sample with its results
pub async fn get_sample(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(sample_id): Path<Uuid>,
) -> Result<Json<SampleDetail>> {
    let scope = TenantScope::enter(state.db.connection(), tenant).await?;
    let sample = SampleRegistry::new(&scope).get_sample(sample_id).await?;
    scope.commit().await?;

    Ok(Json(sample))
}

/// Partially update a sample
pub async fn update_sample(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(sample_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<SampleUpdate>,
) -> Result<Json<Sample>> {
    let scope = TenantScope::enter(state.db.connection(), tenant).await?;
    let sample = SampleRegistry::new(&scope)
        .update_sample(sample_id, request)
        .await?;
    scope.commit().await?;

    Ok(Json(sample))
}

/// Delete a sample and its results
pub async fn delete_sample(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(sample_id): Path<Uuid>,
) -> Result<StatusCode> {
    let scope = TenantScope::enter(state.db.connection(), tenant).await?;
    SampleRegistry::new(&scope).delete_sample(sample_id).await?;
    scope.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Attach a test result to a sample; the registry validates the body once
/// the sample is known to exist
pub async fn add_result(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(sample_id): Path<Uuid>,
    JsonBody(request): JsonBody<NewResult>,
) -> Result<(StatusCode, Json<SampleResult>)> {
    let scope = TenantScope::enter(state.db.connection(), tenant).await?;
    let result = SampleRegistry::new(&scope)
        .add_result(sample_id, request)
        .await?;
    scope.commit().await?;

    Ok((StatusCode::CREATED, Json(result)))
}

/// Move a sample to another status
pub async fn update_status(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(sample_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateStatusRequest>,
) -> Result<Json<StatusResponse>> {
    let scope = TenantScope::enter(state.db.connection(), tenant).await?;
    SampleRegistry::new(&scope)
        .update_status(sample_id, request.status.as_deref().unwrap_or_default())
        .await?;
    scope.commit().await?;

    Ok(Json(StatusResponse {
        status: "Status updated successfully".to_string(),
    }))
}

/// Per-status sample counts for the current center
pub async fn statistics(
    State(state): State<AppState>,
    tenant: TenantContext,
) -> Result<Json<SampleStatistics>> {
    let scope = TenantScope::enter(state.db.connection(), tenant).await?;
    let stats = SampleRegistry::new(&scope).statistics().await?;
    scope.commit().await?;

    Ok(Json(stats))
}
