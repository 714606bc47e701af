//! PostgreSQL database lifecycle tool.
//!
//! This binary checks whether the configured database exists, terminates
//! the sessions connected to it, drops it, and probes whether it accepts
//! writes.
//!
//! # Security Guarantees
//! - Configuration values containing `$` or backticks are refused
//! - The password is never accepted on the command line
//! - Drops require explicit confirmation with `--yes`

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use pgwarden_core::config::{ConfigKey, ConfigStore, EnvConfig, LayeredConfig, MemoryConfig};
use pgwarden_core::health::{
    DatabaseHealthCheckPlugin, HealthCheckRegistry, HealthCheckResult, HealthIndicator,
    PgHealthCheckStore,
};
use pgwarden_core::process::client_version;
use pgwarden_core::{
    DatabaseTarget, PgAdminConnector, PgLifecycleManager, ShellProcessRunner, init_logging,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "pgwarden")]
#[command(about = "PostgreSQL database lifecycle tool")]
#[command(version)]
#[command(long_about = "
pgwarden - Safe PostgreSQL database lifecycle operations

Connection settings are read from the environment (prefixed, PGWARDEN_ by
default) and, with --config, from a JSON file:

  DB_HOST, DB_PORT (5432), DB_USERNAME, DB_PASSWORD, DB_DATABASE,
  USE_SUDO_TO_MANAGE_DATABASE (true)

With USE_SUDO_TO_MANAGE_DATABASE=true the database is dropped with
`sudo dropdb`; otherwise with password-authenticated `psql`.

EXAMPLES:
  PGWARDEN_DB_HOST=localhost PGWARDEN_DB_USERNAME=app PGWARDEN_DB_DATABASE=shop_db pgwarden exists
  pgwarden --config pgwarden.json --prompt-password drop --yes
  pgwarden --config pgwarden.json health --json
")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    /// JSON configuration file
    #[arg(
        long,
        env = "PGWARDEN_CONFIG",
        help = "JSON file with configuration values (environment variables take precedence)"
    )]
    config: Option<PathBuf>,

    /// Environment variable prefix
    #[arg(
        long,
        default_value = "PGWARDEN_",
        help = "Prefix of the environment variables holding configuration values"
    )]
    env_prefix: String,

    /// Prompt for the database password
    #[arg(
        long,
        help = "Read the database password interactively when none is configured"
    )]
    prompt_password: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Drop the configured database
    Drop(DropArgs),
    /// Print whether the configured database exists
    Exists,
    /// Terminate all sessions connected to the configured database
    Terminate,
    /// Check that the configured database accepts writes
    Health(HealthArgs),
    /// Print the local psql client version
    ClientVersion,
}

#[derive(Args)]
struct DropArgs {
    /// Confirm the drop
    #[arg(long, help = "Confirm that the database should be dropped")]
    yes: bool,
}

#[derive(Args)]
struct HealthArgs {
    /// Emit JSON
    #[arg(long, help = "Print the report as JSON")]
    json: bool,

    /// Connection timeout in seconds
    #[arg(long, default_value = "10", help = "Seconds to wait for a connection")]
    timeout: u64,
}

#[derive(Args)]
struct GlobalArgs {
    /// Increase verbosity
    #[arg(
        short,
        long,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv)"
    )]
    verbose: u8,

    /// Suppress output
    #[arg(short, long, help = "Suppress all log output except errors")]
    quiet: bool,
}

#[derive(Serialize)]
struct HealthReport<'a> {
    healthy: bool,
    checks: BTreeMap<&'a str, &'a HealthCheckResult>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    init_logging(cli.global.verbose, cli.global.quiet)?;

    let config = build_config(&cli)?;

    match &cli.command {
        Command::Drop(args) => drop_database(config, args).await,
        Command::Exists => {
            let exists = manager(config).database_exists().await?;
            println!("{}", exists);
            Ok(ExitCode::SUCCESS)
        }
        Command::Terminate => {
            let terminated = manager(config).terminate_connections().await?;
            println!("{}", terminated.len());
            Ok(ExitCode::SUCCESS)
        }
        Command::Health(args) => run_health_checks(config.as_ref(), args).await,
        Command::ClientVersion => {
            let version = client_version(&ShellProcessRunner::new())
                .await
                .context("Failed to determine the psql client version")?;
            println!("{}", version);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Builds the configuration: environment over file, with an interactively
/// read password on top when requested.
fn build_config(cli: &Cli) -> Result<Arc<dyn ConfigStore>> {
    let base = file_and_env_config(cli.config.as_ref(), &cli.env_prefix)?;

    let password_missing = base
        .get(ConfigKey::Password)
        .is_none_or(|password| password.is_empty());
    if cli.prompt_password && password_missing {
        let password = rpassword::prompt_password("Database password: ")
            .context("Failed to read password")?;
        let prompted = MemoryConfig::new().with(ConfigKey::Password, password);
        return Ok(Arc::new(LayeredConfig::new(vec![
            Box::new(prompted),
            Box::new(base),
        ])));
    }

    Ok(Arc::new(base))
}

fn file_and_env_config(file: Option<&PathBuf>, env_prefix: &str) -> Result<LayeredConfig> {
    let mut layers: Vec<Box<dyn ConfigStore>> = vec![Box::new(EnvConfig::with_prefix(env_prefix))];
    if let Some(path) = file {
        let store = MemoryConfig::from_json_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
        layers.push(Box::new(store));
    }
    Ok(LayeredConfig::new(layers))
}

fn manager(config: Arc<dyn ConfigStore>) -> PgLifecycleManager {
    PgLifecycleManager::new(config, PgAdminConnector::new(), ShellProcessRunner::new())
}

/// Drops the database. Exit code 1 when the command reported no effect.
async fn drop_database(config: Arc<dyn ConfigStore>, args: &DropArgs) -> Result<ExitCode> {
    let manager = manager(config);
    let target = manager.target()?;

    if !args.yes {
        bail!("Refusing to drop {} without --yes", target);
    }

    let outcome = manager.drop_database().await?;
    println!("{}", outcome);

    if outcome.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// Runs the health checks against the target database. Exit code 1 when
/// any check is unhealthy.
async fn run_health_checks(config: &dyn ConfigStore, args: &HealthArgs) -> Result<ExitCode> {
    let target = DatabaseTarget::from_config(config)?;
    let store = PgHealthCheckStore::connect_lazy(&target, Duration::from_secs(args.timeout))?;

    // An unreachable server is reported by the probe itself.
    if let Err(e) = store.ensure_table().await {
        warn!(error = %e, "Could not prepare the health check table");
    }

    let mut registry = HealthCheckRegistry::new();
    registry.register(Box::new(DatabaseHealthCheckPlugin::new(HealthIndicator::new(
        store.clone(),
    ))));

    let results = registry.run_all().await;
    store.close().await;

    let report = HealthReport {
        healthy: results.iter().all(|(_, result)| result.healthy),
        checks: results
            .iter()
            .map(|(name, result)| (name.as_str(), result))
            .collect(),
    };
    info!(database = %target, healthy = report.healthy, "Health checks finished");

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize health report")?
        );
    } else {
        for (name, result) in &report.checks {
            match &result.message {
                None => println!("{}: healthy", name),
                Some(message) => println!("{}: unhealthy ({})", name, message),
            }
        }
    }

    if report.healthy {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
