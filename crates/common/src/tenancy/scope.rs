//! Scoped execution against one tenant schema

use super::{SchemaName, TenantContext};
use crate::db::migrations;
use crate::db::models::Center;
use crate::errors::{AppError, Result};
use crate::metrics;
use futures::future::BoxFuture;
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbErr, TransactionTrait,
};
use tracing::{debug, info, warn};

/// A transaction bound to one tenant schema
///
/// All statements issued through [`TenantScope::conn`] resolve unqualified
/// table names in the tenant's schema. Dropping the scope without calling
/// [`TenantScope::commit`] rolls the transaction back, which also discards
/// the `search_path` override.
pub struct TenantScope {
    txn: DatabaseTransaction,
    tenant: TenantContext,
}

impl TenantScope {
    /// Open a transaction on `db` and point it at the tenant's schema
    pub async fn enter(db: &DatabaseConnection, tenant: TenantContext) -> Result<Self> {
        let txn = db.begin().await?;
        set_search_path(&txn, &tenant.schema_name).await?;

        debug!(schema = %tenant.schema_name, "Entered tenant scope");

        Ok(Self { txn, tenant })
    }

    pub fn tenant(&self) -> &TenantContext {
        &self.tenant
    }

    pub fn schema_name(&self) -> &SchemaName {
        &self.tenant.schema_name
    }

    /// Connection to run tenant queries on
    pub fn conn(&self) -> &DatabaseTransaction {
        &self.txn
    }

    /// Commit the scoped work
    pub async fn commit(self) -> Result<()> {
        self.txn.commit().await?;
        Ok(())
    }

    /// Discard the scoped work
    pub async fn rollback(self) -> Result<()> {
        self.txn.rollback().await?;
        Ok(())
    }
}

/// Run `f` with every statement targeting `tenant`'s schema
///
/// Commits when `f` succeeds and rolls back when it fails; in both cases the
/// caller's own connection state is untouched, because the override lives in
/// a separate transaction.
pub async fn with_tenant_scope<F, T>(
    db: &DatabaseConnection,
    tenant: &TenantContext,
    f: F,
) -> Result<T>
where
    F: for<'c> FnOnce(&'c DatabaseTransaction) -> BoxFuture<'c, Result<T>>,
    T: Send,
{
    let scope = TenantScope::enter(db, tenant.clone()).await?;
    let outcome = f(scope.conn()).await;

    match outcome {
        Ok(value) => {
            scope.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = scope.rollback().await {
                warn!(
                    schema = %tenant.schema_name,
                    error = %rollback_err,
                    "Rollback after failed tenant operation also failed"
                );
            }
            Err(err)
        }
    }
}

async fn set_search_path<C: ConnectionTrait>(
    conn: &C,
    schema: &SchemaName,
) -> std::result::Result<(), DbErr> {
    conn.execute_unprepared(&format!("SET LOCAL search_path TO {}", schema.quoted()))
        .await?;
    Ok(())
}

/// Create `schema` and its tenant tables on `conn`
///
/// Meant to run inside the caller's transaction (see
/// [`crate::db::Repository::create_center`]) so that the schema, the center
/// row and its domain are committed or discarded together. The transaction's
/// `search_path` is reset to its default afterwards.
pub async fn provision_schema<C: ConnectionTrait>(conn: &C, schema: &SchemaName) -> Result<()> {
    let provisioning_error = |e: DbErr| AppError::Provisioning {
        schema: schema.to_string(),
        message: e.to_string(),
    };

    conn.execute_unprepared(&format!("CREATE SCHEMA IF NOT EXISTS {}", schema.quoted()))
        .await
        .map_err(provisioning_error)?;

    set_search_path(conn, schema).await.map_err(provisioning_error)?;
    migrations::apply_tenant_tables(conn)
        .await
        .map_err(provisioning_error)?;
    conn.execute_unprepared("SET LOCAL search_path TO DEFAULT")
        .await
        .map_err(provisioning_error)?;

    info!(schema = %schema, "Schema provisioned");
    Ok(())
}

/// Bring one center's schema up to the current table layout
///
/// Never panics or propagates a raw database error: any failure comes back as
/// [`AppError::Migration`] carrying the underlying cause.
pub async fn migrate_schema(db: &DatabaseConnection, center: &Center) -> Result<()> {
    let tenant = TenantContext::from_center(center).map_err(|e| AppError::Migration {
        schema: center.schema_name.clone(),
        message: e.to_string(),
    })?;

    let outcome = with_tenant_scope(db, &tenant, |txn| {
        Box::pin(async move {
            migrations::apply_tenant_tables(txn).await?;
            Ok(())
        })
    })
    .await;

    metrics::record_schema_migration(tenant.schema_name.as_str(), outcome.is_ok());

    match outcome {
        Ok(()) => {
            info!(schema = %tenant.schema_name, center_id = %center.id, "Schema migrated");
            Ok(())
        }
        Err(e) => {
            warn!(schema = %tenant.schema_name, error = %e, "Schema migration failed");
            Err(AppError::Migration {
                schema: tenant.schema_name.to_string(),
                message: e.to_string(),
            })
        }
    }
}
