//! Tenant directory handlers: centers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use labtrack_common::{
    db::{models::Center, CenterUpdate, NewCenter, Repository},
    errors::{AppError, Result},
    tenancy::{self, RequestScope},
    validation::ValidatedJson,
};

/// Request to create a center
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCenterRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,

    /// Derived from `name` when absent
    #[serde(default)]
    pub schema_name: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// Primary hostname; `{schema_name}.{domain_suffix}` when absent
    #[serde(default)]
    #[validate(length(min = 1, max = 253))]
    pub domain: Option<String>,
}

/// Partial center update
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCenterRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,

    pub description: Option<String>,

    /// Present only to reject attempts to move a center's data
    #[serde(default)]
    pub schema_name: Option<serde_json::Value>,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Serialize)]
pub struct CurrentSchemaResponse {
    pub schema_name: String,
    pub tenant: Option<String>,
}

/// List all centers
pub async fn list_centers(State(state): State<AppState>) -> Result<Json<Vec<Center>>> {
    let repo = Repository::new(state.db.clone());
    Ok(Json(repo.list_centers().await?))
}

/// Create a center, its primary domain and its schema
pub async fn create_center(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<CreateCenterRequest>,
) -> Result<(StatusCode, Json<Center>)> {
    let repo = Repository::new(state.db.clone());

    let center = repo
        .create_center(
            NewCenter {
                name: request.name,
                schema_name: request.schema_name,
                description: request.description,
                domain: request.domain,
            },
            &state.config.tenancy,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(center)))
}

/// Get a center by ID
pub async fn get_center(
    State(state): State<AppState>,
    Path(center_id): Path<Uuid>,
) -> Result<Json<Center>> {
    let repo = Repository::new(state.db.clone());

    let center = repo
        .find_center(center_id)
        .await?
        .ok_or_else(|| AppError::CenterNotFound { id: center_id.to_string() })?;

    Ok(Json(center))
}

/// Rename a center or change its description
pub async fn update_center(
    State(state): State<AppState>,
    Path(center_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateCenterRequest>,
) -> Result<Json<Center>> {
    if request.schema_name.is_some() {
        return Err(AppError::Validation {
            message: "Schema name cannot be changed after provisioning".to_string(),
            field: Some("schema_name".to_string()),
        });
    }

    let repo = Repository::new(state.db.clone());
    let center = repo
        .update_center(
            center_id,
            CenterUpdate {
                name: request.name,
                description: request.description,
            },
        )
        .await?;

    Ok(Json(center))
}

/// Re-run tenant table creation for one center
pub async fn migrate_schema(
    State(state): State<AppState>,
    Path(center_id): Path<Uuid>,
) -> Result<Json<StatusResponse>> {
    let repo = Repository::new(state.db.clone());

    let center = repo
        .find_center(center_id)
        .await?
        .ok_or_else(|| AppError::CenterNotFound { id: center_id.to_string() })?;

    tenancy::migrate_schema(state.db.connection(), &center).await?;

    Ok(Json(StatusResponse {
        status: "Schema migrated successfully".to_string(),
    }))
}

/// Report which schema the request host maps to
pub async fn get_current_schema(scope: RequestScope) -> Json<CurrentSchemaResponse> {
    Json(CurrentSchemaResponse {
        schema_name: scope.schema_name().to_string(),
        tenant: scope.tenant().map(|t| t.center_name.clone()),
    })
}
