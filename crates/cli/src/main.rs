//! LabTrack administrative CLI
//!
//! Provisions centers and keeps their schemas up to date outside the HTTP
//! surface.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use labtrack_common::{
    config::AppConfig,
    db::{migrations, DbPool, NewCenter, NewDomain, Repository},
    tenancy::{self, normalize_host, SchemaName},
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "labtrack")]
#[command(about = "Tenant provisioning and schema maintenance for LabTrack")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a center with its schema and domain (no-op for parts that exist)
    SetupTenant {
        /// Center name
        #[arg(long)]
        name: String,

        /// Schema name; defaults to the name lower-cased with spaces and
        /// hyphens replaced by underscores
        #[arg(long)]
        schema: Option<String>,

        /// Domain; defaults to `{schema}.{domain_suffix}`
        #[arg(long)]
        domain: Option<String>,
    },
    /// Bring tenant schemas up to the current table layout
    MigrateSchemas {
        /// Only migrate this schema
        #[arg(long)]
        schema: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = AppConfig::load().context("Failed to load configuration")?;
    init_tracing(&config);

    let db = DbPool::new(&config.database).await?;
    migrations::bootstrap_shared_schema(db.connection())
        .await
        .context("Failed to create shared tables")?;
    let repo = Repository::new(db);

    match cli.command {
        Commands::SetupTenant { name, schema, domain } => {
            setup_tenant(&repo, &config, &name, schema, domain).await
        }
        Commands::MigrateSchemas { schema } => migrate_schemas(&repo, schema).await,
    }
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn setup_tenant(
    repo: &Repository,
    config: &AppConfig,
    name: &str,
    schema: Option<String>,
    domain: Option<String>,
) -> anyhow::Result<()> {
    let schema = SchemaName::parse(schema.unwrap_or_else(|| tenancy::schema_base_name(name)))?;
    let hostname = match domain {
        Some(d) => normalize_host(&d).context("Domain must not be empty")?,
        None => config.default_domain_for(schema.as_str()),
    };

    let center = match repo.find_center_by_schema(schema.as_str()).await? {
        Some(center) => {
            println!("Center with schema \"{}\" already exists", schema);
            center
        }
        None => {
            if let Some(existing) = repo.find_domain_by_hostname(&hostname).await? {
                bail!(
                    "Domain \"{}\" is already registered to center {}",
                    hostname,
                    existing.center_id
                );
            }

            repo.create_center(new_center(name, &schema, &hostname), &config.tenancy)
                .await?;
            println!("Successfully created center \"{}\" with schema \"{}\"", name, schema);
            println!("Successfully created domain \"{}\"", hostname);
            return Ok(());
        }
    };

    if repo.find_domain_by_hostname(&hostname).await?.is_some() {
        println!("Domain \"{}\" already exists", hostname);
        return Ok(());
    }

    let is_primary = !repo.has_primary_domain(center.id).await?;
    repo.create_domain(NewDomain {
        hostname: hostname.clone(),
        center_id: center.id,
        is_primary,
    })
    .await?;
    println!("Successfully created domain \"{}\"", hostname);

    Ok(())
}

/// Center insert for `setup-tenant`; schema and domain are always explicit
fn new_center(name: &str, schema: &SchemaName, hostname: &str) -> NewCenter {
    NewCenter {
        name: name.to_string(),
        schema_name: Some(schema.to_string()),
        description: None,
        domain: Some(hostname.to_string()),
    }
}

async fn migrate_schemas(repo: &Repository, only: Option<String>) -> anyhow::Result<()> {
    let centers = match only {
        Some(schema) => match repo.find_center_by_schema(&schema).await? {
            Some(center) => vec![center],
            None => bail!("No center uses schema \"{}\"", schema),
        },
        None => repo.list_centers().await?,
    };

    let mut failures = 0usize;
    for center in &centers {
        match tenancy::migrate_schema(repo.conn(), center).await {
            Ok(()) => println!("Migrated schema \"{}\"", center.schema_name),
            Err(e) => {
                failures += 1;
                warn!(schema = %center.schema_name, error = %e, "Migration failed");
                eprintln!("Schema \"{}\": {}", center.schema_name, e);
            }
        }
    }

    info!(total = centers.len(), failures, "Schema migration finished");

    if failures > 0 {
        bail!("{} of {} schema migrations failed", failures, centers.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_setup_tenant_args() {
        let cli = Cli::try_parse_from([
            "labtrack",
            "setup-tenant",
            "--name",
            "City Lab",
            "--schema",
            "citylab",
        ])
        .unwrap();

        match cli.command {
            Commands::SetupTenant { name, schema, domain } => {
                assert_eq!(name, "City Lab");
                assert_eq!(schema.as_deref(), Some("citylab"));
                assert!(domain.is_none());
            }
            _ => panic!("expected setup-tenant"),
        }
    }

    #[test]
    fn test_setup_tenant_requires_name() {
        assert!(Cli::try_parse_from(["labtrack", "setup-tenant"]).is_err());
    }

    #[test]
    fn test_new_center_pins_schema_and_domain() {
        let schema = SchemaName::parse(tenancy::schema_base_name("City Lab")).unwrap();
        let center = new_center("City Lab", &schema, "city_lab.localhost");

        assert_eq!(center.name, "City Lab");
        assert_eq!(center.schema_name.as_deref(), Some("city_lab"));
        assert_eq!(center.domain.as_deref(), Some("city_lab.localhost"));
        assert!(center.description.is_none());
    }

    #[test]
    fn test_migrate_schemas_all_by_default() {
        let cli = Cli::try_parse_from(["labtrack", "migrate-schemas"]).unwrap();
        assert!(matches!(cli.command, Commands::MigrateSchemas { schema: None }));
    }
}
