//! Tenant directory handlers: domains

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
    db::{
        models::{Center, Domain},
        NewDomain, Repository,
    },
    errors::{AppError, Result},
    validation::ValidatedJson,
};

/// Request to register a hostname for a center
#[derive(Debug, Deserialize, Validate)]
pub struct CreateDomainRequest {
    #[validate(length(min = 1, max = 253))]
    pub domain: String,

    /// Center ID
    pub tenant: Uuid,

    #[serde(default)]
    pub is_primary: bool,
}

#[derive(Debug, Serialize)]
pub struct DomainResponse {
    pub id: Uuid,
    pub domain: String,
    pub tenant: Uuid,
    pub tenant_name: Option<String>,
    pub is_primary: bool,
}

impl DomainResponse {
    fn new(domain: Domain, center: Option<Center>) -> Self {
        Self {
            id: domain.id,
            domain: domain.hostname,
            tenant: domain.center_id,
            tenant_name: center.map(|c| c.name),
            is_primary: domain.is_primary,
        }
    }
}

/// List all domains
pub async fn list_domains(State(state): State<AppState>) -> Result<Json<Vec<DomainResponse>>> {
    let repo = Repository::new(state.db.clone());

    let domains = repo
        .list_domains()
        .await?
        .into_iter()
        .map(|(domain, center)| DomainResponse::new(domain, center))
        .collect();

    Ok(Json(domains))
}

/// Register an additional domain
pub async fn create_domain(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<CreateDomainRequest>,
) -> Result<(StatusCode, Json<DomainResponse>)> {
    let repo = Repository::new(state.db.clone());

    let domain = repo
        .create_domain(NewDomain {
            hostname: request.domain,
            center_id: request.tenant,
            is_primary: request.is_primary,
        })
        .await?;
    let center = repo.find_center(domain.center_id).await?;

    Ok((StatusCode::CREATED, Json(DomainResponse::new(domain, center))))
}

/// Get a domain by ID
pub async fn get_domain(
    State(state): State<AppState>,
    Path(domain_id): Path<Uuid>,
) -> Result<Json<DomainResponse>> {
    let repo = Repository::new(state.db.clone());

    let (domain, center) = repo
        .find_domain(domain_id)
        .await?
        .ok_or_else(|| AppError::NotFound {
            resource_type: "Domain".to_string(),
            id: domain_id.to_string(),
        })?;

    Ok(Json(DomainResponse::new(domain, center)))
}
