//! taskdb-migrate CLI - schema migrations for the task manager database.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use taskdb_migrate::migrations::{self, initial, profile, schools, subtasks};
use taskdb_migrate::{
    Config, ConnectionManager, DatabaseBootstrap, MigrateError, Migration, MigrationRunner,
    ResetEngine, RunReport, StepOutcome,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "taskdb-migrate")]
#[command(about = "Idempotent MySQL schema migrations for the task manager database")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Database host (overrides DB_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Database port (overrides DB_PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Database user (overrides DB_USER)
    #[arg(long)]
    user: Option<String>,

    /// Database password (overrides DB_PASSWORD)
    #[arg(long)]
    password: Option<String>,

    /// Target database (overrides DB_NAME)
    #[arg(long)]
    database: Option<String>,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and set its charset and collation
    CreateDb,

    /// Create the core tables
    InitSchema,

    /// Add profile columns to users
    MigrateProfile,

    /// Convert subtask status to the is_completed flag
    MigrateSubtasks,

    /// Create subtasks and subtask_images if they do not exist
    CreateSubtaskTables,

    /// Drop the legacy schools table
    RetireSchools,

    /// Run every migration in order
    Migrate {
        /// Create the database first
        #[arg(long)]
        create_db: bool,
    },

    /// Drop every table in the database
    Reset {
        /// Confirm that all tables and their data will be deleted
        #[arg(long)]
        yes: bool,
    },

    /// Show which steps are already applied, without changing anything
    Status,

    /// Test the database connection
    HealthCheck,
}

impl Commands {
    /// Health checks may connect to the server alone.
    fn needs_database(&self) -> bool {
        !matches!(self, Commands::HealthCheck)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    // Setup logging
    setup_logging(&cli.verbosity, &cli.log_format)
        .map_err(|e| MigrateError::Config(e.to_string()))?;

    if let Commands::Reset { yes: false } = cli.command {
        return Err(MigrateError::Config(
            "reset drops every table and its data; pass --yes to confirm".to_string(),
        ));
    }

    let config = load_config(&cli)?;
    config.validate(cli.command.needs_database())?;

    // Setup signal handling for graceful shutdown (SIGINT and SIGTERM)
    let cancel_token = setup_signal_handler().await?;
    let runner = MigrationRunner::with_cancellation(cancel_token);

    match cli.command {
        Commands::CreateDb => {
            let database = config.database()?.to_string();
            let settings = config.schema.clone();
            let report = ConnectionManager::scoped(&server_only(&config), move |store| {
                Box::pin(async move {
                    DatabaseBootstrap::new(store, &settings)
                        .bootstrap(&database)
                        .await
                })
            })
            .await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "Database {} ready ({} / {})",
                    report.database, report.charset, report.collation
                );
            }
        }

        Commands::InitSchema => {
            run_migration(&config, runner, initial::migration(), cli.output_json).await?
        }
        Commands::MigrateProfile => {
            run_migration(&config, runner, profile::migration(), cli.output_json).await?
        }
        Commands::MigrateSubtasks => {
            run_migration(&config, runner, subtasks::convert(), cli.output_json).await?
        }
        Commands::CreateSubtaskTables => {
            run_migration(&config, runner, subtasks::create(), cli.output_json).await?
        }
        Commands::RetireSchools => {
            run_migration(&config, runner, schools::migration(), cli.output_json).await?
        }
        Commands::Migrate { create_db: false } => {
            run_migration(&config, runner, migrations::full_sequence(), cli.output_json).await?
        }

        Commands::Migrate { create_db: true } => {
            let database = config.database()?.to_string();
            let settings = config.schema.clone();
            let migration = migrations::full_sequence();
            let report = ConnectionManager::scoped(&server_only(&config), move |store| {
                Box::pin(async move {
                    DatabaseBootstrap::new(&mut *store, &settings)
                        .bootstrap(&database)
                        .await?;
                    runner.run(store, &migration).await
                })
            })
            .await?;
            print_run_report(&report, cli.output_json)?;
        }

        Commands::Reset { .. } => {
            let report = ConnectionManager::scoped(&config, |store| {
                Box::pin(async move { ResetEngine::new(store).reset().await })
            })
            .await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Reset completed!");
                println!("  Dropped: {}", report.dropped.len());
                for failed in &report.failed {
                    println!("  Failed: {} ({})", failed.table, failed.error);
                }
            }
            if !report.is_complete() {
                warn!("{} table(s) could not be dropped", report.failed.len());
            }
        }

        Commands::Status => {
            let migration = migrations::full_sequence();
            let statuses = ConnectionManager::scoped(&config, move |store| {
                Box::pin(async move { runner.status(store, &migration).await })
            })
            .await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&statuses)?);
            } else {
                for status in &statuses {
                    let mark = if status.satisfied { "x" } else { " " };
                    println!("  [{}] {}", mark, status.id);
                }
                let pending = statuses.iter().filter(|s| !s.satisfied).count();
                println!("\n  Pending: {}/{}", pending, statuses.len());
            }
        }

        Commands::HealthCheck => {
            let started = Instant::now();
            let version = ConnectionManager::scoped(&config, |store| {
                Box::pin(async move {
                    store.ping().await?;
                    store.server_version().await
                })
            })
            .await?;
            let latency_ms = started.elapsed().as_millis() as u64;

            if cli.output_json {
                let result = serde_json::json!({
                    "healthy": true,
                    "address": config.connection.address(),
                    "database": config.connection.database,
                    "server_version": version,
                    "latency_ms": latency_ms,
                });
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!("  MySQL {}: OK ({}ms)", config.connection.address(), latency_ms);
                println!("  Server version: {}", version);
            }
        }
    }

    Ok(())
}

/// YAML file, then environment, then command-line flags.
fn load_config(cli: &Cli) -> Result<Config, MigrateError> {
    let mut config = match &cli.config {
        Some(path) => {
            let config = Config::load(path)?;
            info!("Loaded configuration from {:?}", path);
            config
        }
        None => Config::default(),
    };
    config.apply_env()?;

    let conn = &mut config.connection;
    if let Some(host) = &cli.host {
        conn.host = host.clone();
    }
    if let Some(port) = cli.port {
        conn.port = port;
    }
    if let Some(user) = &cli.user {
        conn.user = user.clone();
    }
    if let Some(password) = &cli.password {
        conn.password = password.clone();
    }
    if let Some(database) = &cli.database {
        conn.database = Some(database.clone());
    }
    Ok(config)
}

/// The same configuration with no database selected.
fn server_only(config: &Config) -> Config {
    Config {
        connection: config.connection.without_database(),
        schema: config.schema.clone(),
    }
}

async fn run_migration(
    config: &Config,
    runner: MigrationRunner,
    migration: Migration,
    output_json: bool,
) -> Result<(), MigrateError> {
    let report = ConnectionManager::scoped(config, move |store| {
        Box::pin(async move { runner.run(store, &migration).await })
    })
    .await?;
    print_run_report(&report, output_json)
}

fn print_run_report(report: &RunReport, output_json: bool) -> Result<(), MigrateError> {
    if output_json {
        println!("{}", report.to_json()?);
        return Ok(());
    }

    let duration = (report.completed_at - report.started_at).num_milliseconds() as f64 / 1000.0;
    println!("\nMigration {} completed!", report.migration);
    println!("  Run ID: {}", report.run_id);
    println!("  Duration: {:.2}s", duration);
    println!("  Applied: {}", report.applied());
    println!("  Skipped: {}", report.skipped());
    for step in &report.steps {
        match &step.outcome {
            StepOutcome::Applied { statements, .. } => {
                println!("    applied  {} ({} statement(s))", step.id, statements)
            }
            StepOutcome::Skipped { reason } => println!("    skipped  {} ({})", step.id, reason),
        }
    }
    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        other => return Err(format!("unknown verbosity '{}'", other)),
    };

    // Logs go to stderr so --output-json stays parseable
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        "json" => subscriber.json().init(),
        "text" => subscriber.init(),
        other => return Err(format!("unknown log format '{}'", other)),
    }

    Ok(())
}

/// Setup signal handlers for graceful shutdown.
/// Handles both SIGINT (Ctrl-C) and SIGTERM.
/// The runner stops before the next step once the token is cancelled.
#[cfg(unix)]
async fn setup_signal_handler() -> Result<CancellationToken, MigrateError> {
    let cancel_token = CancellationToken::new();

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    let token_int = cancel_token.clone();
    tokio::spawn(async move {
        sigint.recv().await;
        eprintln!("\nReceived SIGINT. Stopping after the current step...");
        token_int.cancel();
    });

    let token_term = cancel_token.clone();
    tokio::spawn(async move {
        sigterm.recv().await;
        eprintln!("\nReceived SIGTERM. Stopping after the current step...");
        token_term.cancel();
    });

    Ok(cancel_token)
}

/// Setup signal handler for Windows (only Ctrl-C)
#[cfg(not(unix))]
async fn setup_signal_handler() -> Result<CancellationToken, MigrateError> {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nReceived Ctrl-C. Stopping after the current step...");
            token.cancel();
        }
    });

    Ok(cancel_token)
}
