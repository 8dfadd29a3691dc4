use sqlx::Row;
use std::collections::HashSet;
use std::path::Path;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use panel_guardian::catalog::{ConfigRegistry, EntityCatalog, RegistryProvider};
use panel_guardian::categorizer::categorize;
use panel_guardian::models::user::{fetch_user_by_email, Argon2UserFactory, NewUser, User, UserFactory};
use panel_guardian::policy::PolicyGenerator;
use panel_guardian::roles::RoleService;
use panel_guardian::store::{GuardScope, PermissionStore, SqliteStore};
use panel_guardian::sync::SyncPlanner;
use panel_guardian::{GuardianConfig, KeyCodec};

#[derive(Parser, Debug)]
#[command(author, version, about = "panel-guardian permission tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create missing permissions for panel entities and custom permissions
    Sync {
        /// Limit the sync to these panels (repeatable)
        #[arg(long = "panel")]
        panels: Vec<String>,
        /// Team id for team-scoped permissions
        #[arg(long)]
        team: Option<String>,
        /// List every key with its outcome
        #[arg(short, long)]
        verbose: bool,
    },
    /// Write policy documents for every resource
    Policies {
        #[arg(long = "panel")]
        panels: Vec<String>,
        /// Only these resources, by class or short name (comma-separated)
        #[arg(long = "resource", value_delimiter = ',')]
        resources: Vec<String>,
        /// Overwrite existing policy files
        #[arg(long)]
        force: bool,
    },
    /// Create the super-admin role and optionally assign it to a user
    SuperAdmin {
        #[arg(long)]
        panel: String,
        #[arg(long)]
        team: Option<String>,
        /// Existing user to promote; created when missing and --password is set
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        password: Option<String>,
    },
    /// Create a user with an Argon2 password hash
    CreateUser {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Print the categorized permissions of a panel
    Show {
        #[arg(long)]
        panel: String,
        #[arg(long)]
        team: Option<String>,
    },
    /// Apply pending migrations
    MigrateRun,
    /// Show migration status against the current database
    MigrateStatus,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Try to load env from CWD; when running in Docker the binary CWD may differ,
    // so fall back to the crate-local `.env` using CARGO_MANIFEST_DIR.
    if dotenv().is_err() {
        let crate_env = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(crate_env);
    }
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Sync { panels, team, verbose } => {
            let config = load_config()?;
            let codec = KeyCodec::from_config(&config.permission_key)?.shared();
            let registry = ConfigRegistry::new(&config);

            let mut catalogs = Vec::new();
            for panel in config.select_panels(&panels)? {
                catalogs.push(EntityCatalog::build(&registry, &panel.id, &config, codec.as_ref())?);
            }

            let planner = SyncPlanner::new(&config, codec);
            let refs: Vec<&EntityCatalog> = catalogs.iter().collect();
            let plan = planner.plan(&refs, team.as_deref());

            let pool = get_pool().await?;
            let store = SqliteStore::new(pool);
            let report = planner.reconcile(&plan, &store).await?;

            if verbose {
                for outcome in &report.outcomes {
                    let status = if outcome.created { "created" } else { "exists" };
                    println!("{:<8} {:<10} {}", status, outcome.guard, outcome.key);
                }
            }
            for guard in &plan.unknown_guards {
                println!("warning: guard '{}' is not configured", guard);
            }
            println!("{:<12} {:>8} {:>8}", "Guard", "Created", "Existing");
            for (guard, tally) in &report.guards {
                println!("{:<12} {:>8} {:>8}", guard, tally.created, tally.existing);
            }
            println!("Synced {} permissions ({} new)", report.outcomes.len(), report.created());
        }
        Commands::Policies { panels, resources, force } => {
            let config = load_config()?;
            let codec = KeyCodec::from_config(&config.permission_key)?.shared();
            let registry = ConfigRegistry::new(&config);
            let generator = PolicyGenerator::new(&config, codec.clone());

            for panel in config.select_panels(&panels)? {
                let catalog = EntityCatalog::build(&registry, &panel.id, &config, codec.as_ref())?;
                let policies: Vec<_> = generator
                    .generate(&catalog)
                    .into_iter()
                    .filter(|policy| resources.is_empty() || resources.iter().any(|r| policy.matches_resource(r)))
                    .collect();
                if policies.is_empty() {
                    println!("Panel {}: no matching resources", panel.id);
                    continue;
                }

                let report = generator.write(&policies, force)?;
                for path in &report.written {
                    println!("Wrote {}", path.display());
                }
                for path in &report.skipped {
                    println!("Skipped {} (exists, use --force to overwrite)", path.display());
                }
                println!(
                    "Panel {}: generated {}, skipped {}",
                    panel.id,
                    report.written.len(),
                    report.skipped.len()
                );
            }
        }
        Commands::SuperAdmin {
            panel,
            team,
            email,
            name,
            password,
        } => {
            let config = load_config()?;
            let registry = ConfigRegistry::new(&config);
            let info = registry.panel(&panel)?;
            let pool = get_pool().await?;
            let roles = RoleService::new(pool.clone(), config.super_admin_for(Some(&panel)));

            let role = roles.create_super_admin_role(&info, team.as_deref()).await?;
            println!("Super-admin role '{}' ready ({})", role.name, role.id);

            if let Some(email) = email {
                let user: User = match fetch_user_by_email(&pool, &email).await? {
                    Some(user) => user.into(),
                    None => {
                        let password = password.context("user not found; pass --password to create it")?;
                        let new_user = NewUser {
                            name: name.unwrap_or_else(|| email.clone()),
                            email: email.clone(),
                            password,
                        };
                        Argon2UserFactory.create_user(&pool, new_user).await?
                    }
                };
                roles.assign_role(&user, role.id).await?;
                println!("Assigned '{}' to {}", role.name, user.email);
            }
        }
        Commands::CreateUser { name, email, password } => {
            let pool = get_pool().await?;
            let user = Argon2UserFactory
                .create_user(&pool, NewUser { name, email, password })
                .await?;
            println!("Created user {} ({})", user.email, user.id);
        }
        Commands::Show { panel, team } => {
            let config = load_config()?;
            let codec = KeyCodec::from_config(&config.permission_key)?.shared();
            let registry = ConfigRegistry::new(&config);
            let catalog = EntityCatalog::build(&registry, &panel, &config, codec.as_ref())?;

            let store = SqliteStore::new(get_pool().await?);
            let scope = GuardScope::new(catalog.panel().guard.clone()).with_team(team);
            let parts = categorize(store.names(&scope).await?, &catalog, codec.as_ref());

            println!("Resources");
            for (subject, keys) in &parts.resources {
                println!("  {}: {}", subject, keys.join(", "));
            }
            println!("Pages: {}", parts.pages.join(", "));
            println!("Widgets: {}", parts.widgets.join(", "));
            println!("Custom: {}", parts.custom.join(", "));
        }
        Commands::MigrateRun => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            migrator.run(&pool).await?;
            println!("Migrations applied");
        }
        Commands::MigrateStatus => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            print_status(&pool, &migrator).await?;
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

fn load_config() -> anyhow::Result<GuardianConfig> {
    GuardianConfig::from_env().context("failed to load guardian config")
}

async fn get_pool() -> anyhow::Result<SqlitePool> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
    SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to database")
}

async fn print_status(pool: &SqlitePool, migrator: &sqlx::migrate::Migrator) -> anyhow::Result<()> {
    // If the migrations table doesn't exist, nothing is applied yet
    let db_applied = sqlx::query("SELECT name FROM sqlite_master WHERE type='table' AND name='_sqlx_migrations'")
        .fetch_optional(pool)
        .await?;
    let applied_versions: HashSet<i64> = if db_applied.is_some() {
        let rows = sqlx::query("SELECT version FROM _sqlx_migrations WHERE success = 1")
            .fetch_all(pool)
            .await?;
        rows.iter().filter_map(|row| row.try_get::<i64, _>("version").ok()).collect()
    } else {
        HashSet::new()
    };

    println!("{:<8} {:<20} {}", "Status", "Version", "Name");
    for migration in migrator.iter() {
        let status = if applied_versions.contains(&migration.version) { "applied" } else { "pending" };
        let desc = migration.description.as_ref().trim();
        let name = if desc.is_empty() { "unknown" } else { desc };
        println!("{:<8} {:<20} {}", status, migration.version, name);
    }

    Ok(())
}

async fn get_migrator() -> anyhow::Result<sqlx::migrate::Migrator> {
    // Prefer ./migrations when running from the repo root, else the crate-local folder.
    let local = Path::new("./migrations");
    let migrator_path = if local.exists() {
        local.to_path_buf()
    } else {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")
    };

    let migrator_path_display = migrator_path.display().to_string();
    sqlx::migrate::Migrator::new(migrator_path)
        .await
        .with_context(|| format!("failed to load migrations from {}", migrator_path_display))
}
