//! sqlmend CLI
//!
//! Plans, applies and inspects schema reconciliation for entities described
//! in a JSON file.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use sqlmend::sqlmend_core::{DialectKind, EntityDescriptor, KeyRole};
use sqlmend::{introspect, Executor, MySqlExecutor, Repository, SqliteExecutor};

/// Reconcile database tables with entity descriptions.
#[derive(Parser)]
#[command(name = "sqlmend")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL (`sqlite:<path>` or `mysql://...`).
    #[arg(short, long, env = "DATABASE_URL", default_value = "sqlite:sqlmend.db")]
    database: String,

    /// JSON file holding a list of entity descriptors.
    #[arg(short, long, default_value = "entities.json")]
    entities: PathBuf,

    /// Prefix prepended to every table name.
    #[arg(short, long, env = "SQLMEND_PREFIX", default_value = "")]
    prefix: String,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the DDL that would reconcile each entity, without executing it.
    Plan {
        /// Only this table.
        #[arg(short, long)]
        table: Option<String>,
    },

    /// Apply the DDL that reconciles each entity.
    Reconcile {
        /// Only this table.
        #[arg(short, long)]
        table: Option<String>,
    },

    /// Print the live schema of a table.
    Inspect {
        /// Table name.
        table: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let Some(kind) = DialectKind::from_url(&cli.database) else {
        bail!("unsupported database URL: {}", cli.database);
    };

    match kind {
        DialectKind::Sqlite => {
            let executor = SqliteExecutor::connect(&cli.database).await?;
            run(&cli, executor).await
        }
        DialectKind::MySql => {
            let executor = MySqlExecutor::connect(&cli.database).await?;
            run(&cli, executor).await
        }
    }
}

async fn run<E: Executor + Clone>(cli: &Cli, executor: E) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Plan { table } => {
            for repository in repositories(cli, table.as_deref(), &executor)? {
                let plan = repository.plan().await?;
                if plan.is_empty() {
                    println!("-- {}: up to date", repository.table());
                } else {
                    println!("-- {}", repository.table());
                    println!("{plan}");
                }
            }
        }

        Commands::Reconcile { table } => {
            let mut changed = 0;
            for repository in repositories(cli, table.as_deref(), &executor)? {
                if repository.reconcile().await? {
                    changed += 1;
                }
            }
            info!(changed, "Reconciliation complete");
        }

        Commands::Inspect { table } => {
            let table = format!("{}{table}", cli.prefix);
            let live = introspect(&executor, &table).await?;
            if !live.exists() {
                println!("Table '{table}' does not exist.");
                return Ok(());
            }
            println!("\n{table}");
            println!("{:-<60}", "");
            for field in &live.fields {
                let role = [KeyRole::Primary, KeyRole::Unique, KeyRole::Multi]
                    .into_iter()
                    .find(|role| live.keys(*role).contains(field.as_str()))
                    .and_then(KeyRole::code)
                    .unwrap_or("");
                println!(
                    " {:<24} {:<28} {role}",
                    field,
                    live.column_type(field).unwrap_or("")
                );
            }
            println!();
        }
    }

    Ok(())
}

/// Builds one repository per descriptor, optionally restricted to a table.
/// `only` names the table without prefix.
fn repositories<E: Executor + Clone>(
    cli: &Cli,
    only: Option<&str>,
    executor: &E,
) -> anyhow::Result<Vec<Repository<E>>> {
    let descriptors = load_descriptors(&cli.entities)?;
    let repositories = descriptors
        .iter()
        .filter(|d| only.is_none_or(|table| d.table == table))
        .map(|d| {
            Repository::from_descriptor(executor.clone(), d)
                .map(|repository| repository.with_prefix(&cli.prefix))
                .with_context(|| format!("invalid entity '{}'", d.table))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    if let (Some(table), true) = (only, repositories.is_empty()) {
        bail!("no entity describes table '{table}'");
    }
    Ok(repositories)
}

fn load_descriptors(path: &Path) -> anyhow::Result<Vec<EntityDescriptor>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}
