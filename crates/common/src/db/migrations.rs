//! Table creation for the shared schema and for tenant schemas
//!
//! Every statement is idempotent (`IF NOT EXISTS`), so both entry points can
//! be re-run safely against an already provisioned database.

use crate::db::models::*;
use sea_orm::sea_query::{
    ColumnDef, Index, IndexCreateStatement, Table, TableAlterStatement, TableCreateStatement,
};
use sea_orm::{ConnectionTrait, DbErr, EntityName, Schema};
use tracing::debug;

/// Create the shared-schema tables (centers, domains, users, sessions)
pub async fn bootstrap_shared_schema<C: ConnectionTrait>(conn: &C) -> Result<(), DbErr> {
    let schema = Schema::new(conn.get_database_backend());

    let tables = [
        schema.create_table_from_entity(CenterEntity),
        schema.create_table_from_entity(DomainEntity),
        schema.create_table_from_entity(UserEntity),
        schema.create_table_from_entity(UserSessionEntity),
    ];

    for table in tables {
        create_table(conn, table).await?;
    }

    create_index(
        conn,
        Index::create()
            .name("idx_domains_center_id")
            .table(DomainEntity.table_ref())
            .col(DomainColumn::CenterId)
            .if_not_exists()
            .to_owned(),
    )
    .await?;

    create_index(
        conn,
        Index::create()
            .name("idx_users_center_id")
            .table(UserEntity.table_ref())
            .col(UserColumn::CenterId)
            .if_not_exists()
            .to_owned(),
    )
    .await?;

    debug!("Shared schema tables ensured");
    Ok(())
}

/// Create the tenant tables in whatever schema the connection's `search_path`
/// currently points at
///
/// Callers must run this inside a tenant scope; see
/// [`crate::tenancy::migrate_schema`].
pub async fn apply_tenant_tables<C: ConnectionTrait>(conn: &C) -> Result<(), DbErr> {
    let schema = Schema::new(conn.get_database_backend());

    // Samples first: results carry a foreign key onto them
    create_table(conn, schema.create_table_from_entity(SampleEntity)).await?;
    create_table(conn, schema.create_table_from_entity(SampleResultEntity)).await?;

    let indexes = [
        Index::create()
            .name("idx_samples_created_at")
            .table(SampleEntity.table_ref())
            .col(SampleColumn::CreatedAt)
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_samples_status")
            .table(SampleEntity.table_ref())
            .col(SampleColumn::Status)
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_sample_results_sample_id")
            .table(SampleResultEntity.table_ref())
            .col(SampleResultColumn::SampleId)
            .if_not_exists()
            .to_owned(),
    ];

    for index in indexes {
        create_index(conn, index).await?;
    }

    // Schemas provisioned before `created_by` matched the email width
    let backend = conn.get_database_backend();
    conn.execute(backend.build(&widen_created_by())).await?;

    debug!("Tenant tables ensured");
    Ok(())
}

fn widen_created_by() -> TableAlterStatement {
    Table::alter()
        .table(SampleEntity.table_ref())
        .modify_column(
            ColumnDef::new(SampleColumn::CreatedBy)
                .string_len(254)
                .not_null(),
        )
        .to_owned()
}

async fn create_table<C: ConnectionTrait>(
    conn: &C,
    mut table: TableCreateStatement,
) -> Result<(), DbErr> {
    let backend = conn.get_database_backend();
    conn.execute(backend.build(table.if_not_exists())).await?;
    Ok(())
}

async fn create_index<C: ConnectionTrait>(
    conn: &C,
    index: IndexCreateStatement,
) -> Result<(), DbErr> {
    let backend = conn.get_database_backend();
    conn.execute(backend.build(&index)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::DbBackend;

    #[test]
    fn test_tenant_tables_are_unqualified() {
        let schema = Schema::new(DbBackend::Postgres);
        let sql = DbBackend::Postgres
            .build(schema.create_table_from_entity(SampleEntity).if_not_exists())
            .to_string();
        assert!(sql.contains(r#"CREATE TABLE IF NOT EXISTS "samples""#));
        assert!(!sql.contains(r#""public"."samples""#));
    }

    #[test]
    fn test_shared_tables_are_pinned_to_public() {
        let schema = Schema::new(DbBackend::Postgres);
        let sql = DbBackend::Postgres
            .build(schema.create_table_from_entity(CenterEntity).if_not_exists())
            .to_string();
        assert!(sql.contains(r#""public"."centers""#));
    }

    #[test]
    fn test_created_by_fits_any_user_email() {
        let schema = Schema::new(DbBackend::Postgres);
        let sql = DbBackend::Postgres
            .build(&schema.create_table_from_entity(SampleEntity))
            .to_string();
        assert!(sql.contains(r#""created_by" varchar(254) NOT NULL"#));

        let alter = DbBackend::Postgres.build(&widen_created_by()).to_string();
        assert!(alter.contains(r#"ALTER TABLE "samples""#));
        assert!(alter.contains(r#"ALTER COLUMN "created_by" TYPE varchar(254)"#));
    }

    #[test]
    fn test_results_cascade_with_sample() {
        let schema = Schema::new(DbBackend::Postgres);
        let sql = DbBackend::Postgres
            .build(&schema.create_table_from_entity(SampleResultEntity))
            .to_string();
        assert!(sql.contains("ON DELETE CASCADE"));
    }
}
