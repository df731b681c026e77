//! Repository for the shared (public) schema
//!
//! Centers, their domains, user accounts and login sessions. Tenant data
//! (samples and results) is reached through [`crate::registry`] instead,
//! inside a [`crate::tenancy::TenantScope`].

use crate::config::TenancyConfig;
use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::tenancy::{self, derive_schema_name, normalize_host, SchemaName};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use std::collections::HashSet;
use tracing::{debug, info};
use uuid::Uuid;

const MAX_CENTER_NAME_LEN: usize = 100;

/// Input for [`Repository::create_center`]
#[derive(Debug, Clone, Default)]
pub struct NewCenter {
    pub name: String,
    /// Explicit schema identifier; derived from `name` when absent
    pub schema_name: Option<String>,
    pub description: Option<String>,
    /// Explicit primary hostname; `{schema}.{domain_suffix}` when absent
    pub domain: Option<String>,
}

/// Mutable center fields; the schema name is fixed once provisioned
#[derive(Debug, Clone, Default)]
pub struct CenterUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Input for [`Repository::create_domain`]
#[derive(Debug, Clone)]
pub struct NewDomain {
    pub hostname: String,
    pub center_id: Uuid,
    pub is_primary: bool,
}

/// Input for [`Repository::create_user`]
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub center_id: Option<Uuid>,
    pub is_center_admin: bool,
    /// Argon2 PHC string, see [`crate::auth::hash_password`]
    pub password_hash: String,
}

/// Profile fields a user may change on their own account
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
}

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the underlying connection
    pub fn conn(&self) -> &DatabaseConnection {
        self.pool.connection()
    }

    // ========================================================================
    // Health Check
    // ========================================================================

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    // ========================================================================
    // Center Operations
    // ========================================================================

    /// List all centers, ordered by name
    pub async fn list_centers(&self) -> Result<Vec<Center>> {
        CenterEntity::find()
            .order_by_asc(CenterColumn::Name)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Find center by ID
    pub async fn find_center(&self, id: Uuid) -> Result<Option<Center>> {
        CenterEntity::find_by_id(id)
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Find center by schema name
    pub async fn find_center_by_schema(&self, schema_name: &str) -> Result<Option<Center>> {
        CenterEntity::find()
            .filter(CenterColumn::SchemaName.eq(schema_name))
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Create a center together with its primary domain and its schema
    ///
    /// Runs in a single transaction: if provisioning the schema fails, the
    /// center and domain rows are never visible.
    pub async fn create_center(&self, new: NewCenter, tenancy: &TenancyConfig) -> Result<Center> {
        let name = validate_center_name(&new.name)?;
        let txn = self.conn().begin().await?;

        let schema = match new.schema_name.as_deref().map(str::trim) {
            Some(explicit) if !explicit.is_empty() => {
                let schema = SchemaName::parse(explicit)?;
                if schema_in_use(&txn, schema.as_str()).await? {
                    return Err(AppError::Duplicate {
                        message: format!("Schema name '{}' is already in use", schema),
                    });
                }
                schema
            }
            _ => {
                let prefix = tenancy::schema_name_prefix(&name);
                let taken: HashSet<String> = CenterEntity::find()
                    .select_only()
                    .column(CenterColumn::SchemaName)
                    .filter(CenterColumn::SchemaName.starts_with(&prefix))
                    .into_tuple::<String>()
                    .all(&txn)
                    .await?
                    .into_iter()
                    .collect();

                SchemaName::parse(derive_schema_name(&name, |c| taken.contains(c)))?
            }
        };

        let hostname = match new.domain.as_deref() {
            Some(domain) => normalize_host(domain).ok_or_else(|| AppError::Validation {
                message: "Domain must not be empty".to_string(),
                field: Some("domain".to_string()),
            })?,
            None => tenancy.domain_for(schema.as_str()),
        };
        if hostname_in_use(&txn, &hostname).await? {
            return Err(AppError::Duplicate {
                message: format!("Domain '{}' is already registered", hostname),
            });
        }

        let now = chrono::Utc::now();
        let center = CenterActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name),
            schema_name: Set(schema.to_string()),
            description: Set(non_empty(new.description)),
            created_on: Set(now.into()),
            updated_on: Set(now.into()),
        }
        .insert(&txn)
        .await
        .map_err(|e| AppError::from_db_conflict(e, format!("Schema name '{}' is already in use", schema)))?;

        DomainActiveModel {
            id: Set(Uuid::new_v4()),
            hostname: Set(hostname.clone()),
            center_id: Set(center.id),
            is_primary: Set(true),
        }
        .insert(&txn)
        .await
        .map_err(|e| AppError::from_db_conflict(e, format!("Domain '{}' is already registered", hostname)))?;

        tenancy::provision_schema(&txn, &schema).await?;
        txn.commit().await?;

        metrics::record_center_provisioned();
        info!(
            center_id = %center.id,
            schema = %center.schema_name,
            domain = %hostname,
            "Center created"
        );

        Ok(center)
    }

    /// Update a center's name and/or description
    pub async fn update_center(&self, id: Uuid, update: CenterUpdate) -> Result<Center> {
        let mut center: CenterActiveModel = CenterEntity::find_by_id(id)
            .one(self.conn())
            .await?
            .ok_or_else(|| AppError::CenterNotFound { id: id.to_string() })?
            .into();

        if let Some(name) = update.name {
            center.name = Set(validate_center_name(&name)?);
        }

        if let Some(description) = update.description {
            center.description = Set(non_empty(Some(description)));
        }

        center.updated_on = Set(chrono::Utc::now().into());

        let center = center.update(self.conn()).await?;
        info!(center_id = %center.id, "Center updated");
        Ok(center)
    }

    // ========================================================================
    // Domain Operations
    // ========================================================================

    /// List all domains with their centers, ordered by hostname
    pub async fn list_domains(&self) -> Result<Vec<(Domain, Option<Center>)>> {
        DomainEntity::find()
            .find_also_related(CenterEntity)
            .order_by_asc(DomainColumn::Hostname)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Find domain by ID, with its center
    pub async fn find_domain(&self, id: Uuid) -> Result<Option<(Domain, Option<Center>)>> {
        DomainEntity::find_by_id(id)
            .find_also_related(CenterEntity)
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Find domain by (already normalized) hostname
    pub async fn find_domain_by_hostname(&self, hostname: &str) -> Result<Option<Domain>> {
        DomainEntity::find()
            .filter(DomainColumn::Hostname.eq(hostname))
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Whether a center already has its primary domain
    pub async fn has_primary_domain(&self, center_id: Uuid) -> Result<bool> {
        let primaries = DomainEntity::find()
            .filter(DomainColumn::CenterId.eq(center_id))
            .filter(DomainColumn::IsPrimary.eq(true))
            .count(self.conn())
            .await?;
        Ok(primaries > 0)
    }

    /// Register an additional hostname for a center
    ///
    /// A center keeps at most one primary domain.
    pub async fn create_domain(&self, new: NewDomain) -> Result<Domain> {
        let hostname = normalize_host(&new.hostname).ok_or_else(|| AppError::Validation {
            message: "Domain must not be empty".to_string(),
            field: Some("domain".to_string()),
        })?;

        if self.find_center(new.center_id).await?.is_none() {
            return Err(AppError::CenterNotFound { id: new.center_id.to_string() });
        }

        if new.is_primary && self.has_primary_domain(new.center_id).await? {
            return Err(AppError::Duplicate {
                message: "Center already has a primary domain".to_string(),
            });
        }

        if hostname_in_use(self.conn(), &hostname).await? {
            return Err(AppError::Duplicate {
                message: format!("Domain '{}' is already registered", hostname),
            });
        }

        let domain = DomainActiveModel {
            id: Set(Uuid::new_v4()),
            hostname: Set(hostname.clone()),
            center_id: Set(new.center_id),
            is_primary: Set(new.is_primary),
        }
        .insert(self.conn())
        .await
        .map_err(|e| AppError::from_db_conflict(e, format!("Domain '{}' is already registered", hostname)))?;

        info!(domain = %domain.hostname, center_id = %domain.center_id, "Domain registered");
        Ok(domain)
    }

    /// Resolve a normalized hostname to the center it routes to
    pub async fn resolve_tenant(&self, hostname: &str) -> Result<Option<Center>> {
        let found = DomainEntity::find()
            .filter(DomainColumn::Hostname.eq(hostname))
            .find_also_related(CenterEntity)
            .one(self.conn())
            .await?;

        debug!(host = %hostname, found = found.is_some(), "Domain lookup");
        Ok(found.and_then(|(_, center)| center))
    }

    // ========================================================================
    // User Operations
    // ========================================================================

    /// Register a user account
    pub async fn create_user(&self, new: NewUser) -> Result<User> {
        let email = normalize_email(&new.email);

        if self.find_user_by_email(&email).await?.is_some() {
            return Err(AppError::Duplicate {
                message: "A user with this email already exists".to_string(),
            });
        }

        if let Some(center_id) = new.center_id {
            if self.find_center(center_id).await?.is_none() {
                return Err(AppError::Validation {
                    message: format!("Center {} does not exist", center_id),
                    field: Some("center".to_string()),
                });
            }
        }

        let now = chrono::Utc::now();
        let user = UserActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(email),
            username: Set(new.username),
            first_name: Set(new.first_name),
            last_name: Set(new.last_name),
            phone: Set(non_empty(new.phone)),
            center_id: Set(new.center_id),
            is_center_admin: Set(new.is_center_admin),
            is_active: Set(true),
            is_staff: Set(false),
            password_hash: Set(new.password_hash),
            last_login: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(self.conn())
        .await
        .map_err(|e| AppError::from_db_conflict(e, "A user with this email already exists"))?;

        info!(user_id = %user.id, center_id = ?user.center_id, "User registered");
        Ok(user)
    }

    /// Find user by ID
    pub async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        UserEntity::find_by_id(id)
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Find user by login email (case-insensitive)
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        UserEntity::find()
            .filter(UserColumn::Email.eq(normalize_email(email)))
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// List all users, ordered by email
    pub async fn list_users(&self) -> Result<Vec<User>> {
        UserEntity::find()
            .order_by_asc(UserColumn::Email)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    /// List users affiliated with a center
    pub async fn list_users_by_center(&self, center_id: Uuid) -> Result<Vec<User>> {
        UserEntity::find()
            .filter(UserColumn::CenterId.eq(center_id))
            .order_by_asc(UserColumn::Email)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Update a user's profile fields
    pub async fn update_user(&self, id: Uuid, update: UserUpdate) -> Result<User> {
        let mut user: UserActiveModel = UserEntity::find_by_id(id)
            .one(self.conn())
            .await?
            .ok_or_else(|| AppError::NotFound {
                resource_type: "User".to_string(),
                id: id.to_string(),
            })?
            .into();

        if let Some(username) = update.username {
            user.username = Set(username);
        }
        if let Some(first_name) = update.first_name {
            user.first_name = Set(first_name);
        }
        if let Some(last_name) = update.last_name {
            user.last_name = Set(last_name);
        }
        if let Some(phone) = update.phone {
            user.phone = Set(non_empty(Some(phone)));
        }
        user.updated_at = Set(chrono::Utc::now().into());

        let user = user.update(self.conn()).await?;
        info!(user_id = %user.id, "User profile updated");
        Ok(user)
    }

    /// Stamp a successful login
    pub async fn touch_last_login(&self, id: Uuid) -> Result<()> {
        UserEntity::update_many()
            .col_expr(
                UserColumn::LastLogin,
                sea_orm::sea_query::Expr::value(chrono::Utc::now().fixed_offset()),
            )
            .filter(UserColumn::Id.eq(id))
            .exec(self.conn())
            .await?;
        Ok(())
    }

    // ========================================================================
    // Session Operations
    // ========================================================================

    /// Store a new login session, keyed by the token's hash
    pub async fn create_session(
        &self,
        user_id: Uuid,
        token_hash: String,
        ttl: chrono::Duration,
    ) -> Result<UserSession> {
        let now = chrono::Utc::now();

        UserSessionActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            token_hash: Set(token_hash),
            created_at: Set(now.into()),
            expires_at: Set((now + ttl).into()),
        }
        .insert(self.conn())
        .await
        .map_err(Into::into)
    }

    /// Find a non-expired session by token hash, with its user
    pub async fn find_active_session(&self, token_hash: &str) -> Result<Option<(UserSession, User)>> {
        let found = UserSessionEntity::find()
            .filter(UserSessionColumn::TokenHash.eq(token_hash))
            .filter(UserSessionColumn::ExpiresAt.gt(chrono::Utc::now().fixed_offset()))
            .find_also_related(UserEntity)
            .one(self.conn())
            .await?;

        Ok(found.and_then(|(session, user)| user.map(|u| (session, u))))
    }

    /// Delete a session (logout)
    pub async fn delete_session(&self, id: Uuid) -> Result<bool> {
        let result = UserSessionEntity::delete_by_id(id).exec(self.conn()).await?;
        Ok(result.rows_affected > 0)
    }

    /// Drop a user's expired sessions
    pub async fn delete_expired_sessions(&self, user_id: Uuid) -> Result<u64> {
        let result = UserSessionEntity::delete_many()
            .filter(UserSessionColumn::UserId.eq(user_id))
            .filter(UserSessionColumn::ExpiresAt.lte(chrono::Utc::now().fixed_offset()))
            .exec(self.conn())
            .await?;
        Ok(result.rows_affected)
    }
}

async fn schema_in_use<C: ConnectionTrait>(conn: &C, schema_name: &str) -> Result<bool> {
    let count = CenterEntity::find()
        .filter(CenterColumn::SchemaName.eq(schema_name))
        .count(conn)
        .await?;
    Ok(count > 0)
}

async fn hostname_in_use<C: ConnectionTrait>(conn: &C, hostname: &str) -> Result<bool> {
    let count = DomainEntity::find()
        .filter(DomainColumn::Hostname.eq(hostname))
        .count(conn)
        .await?;
    Ok(count > 0)
}

fn validate_center_name(name: &str) -> Result<String> {
    let name = name.trim();
    let len = name.chars().count();
    if len == 0 || len > MAX_CENTER_NAME_LEN {
        return Err(AppError::Validation {
            message: format!("Center name must be between 1 and {} characters", MAX_CENTER_NAME_LEN),
            field: Some("name".to_string()),
        });
    }
    Ok(name.to_string())
}

/// Emails are compared case-insensitively
fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
