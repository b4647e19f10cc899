use anyhow::{anyhow, Context, Result};
use axum::{routing::get, Router};
use clap::{Parser, Subcommand};
use modkit::{apply_http_layers, cancel_on_signal, health_check, serve, HostOptions};
use runtime::{AppConfig, CliArgs, DatabaseConfig};
use sea_orm::DatabaseConnection;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use url::Url;
use users::config::UsersConfig;
use users::infra::storage::db::{self, DbOptions};
use users::UsersModule;

/// Name of the module section under `modules:` in the config file.
const USERS_MODULE: &str = "users";

/// Expand a sqlite DSN into an absolute-path DSN using a base directory.
/// - Keeps in-memory DSNs as-is.
/// - Normalizes backslashes into forward slashes (important on Windows).
fn absolutize_sqlite_dsn(dsn: &str, base_dir: &Path, create_dirs: bool) -> Result<String> {
    if db::is_memory_dsn(dsn) {
        return Ok(dsn.to_string());
    }
    let db_path = dsn
        .strip_prefix("sqlite://")
        .ok_or_else(|| anyhow!("DSN must start with sqlite:// (got: {})", dsn))?;

    let (path_str, query) = match db_path.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (db_path, None),
    };

    let mut p = PathBuf::from(path_str);
    if p.as_os_str().is_empty() {
        return Err(anyhow!("Empty SQLite path in DSN"));
    }
    if p.is_relative() {
        p = base_dir.join(p);
    }

    if let Some(dir) = p.parent() {
        if create_dirs {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("cannot create database directory {}", dir.display()))?;
        }
    }

    // Rebuild DSN with absolute path and normalized slashes
    let mut out = String::from("sqlite://");
    out.push_str(&p.to_string_lossy().replace('\\', "/"));
    if let Some(q) = query {
        out.push('?');
        out.push_str(q);
    }
    Ok(out)
}

/// Only SQLite is supported: full-text search and REGEXP are SQLite features here.
fn ensure_sqlite(cfg: &DatabaseConfig) -> Result<()> {
    let raw = cfg.url.trim();
    if raw.is_empty() {
        return Err(anyhow!("Database URL not configured"));
    }
    let url = Url::parse(raw).map_err(|e| anyhow!("Invalid database DSN '{}': {}", raw, e))?;
    match url.scheme() {
        "sqlite" => Ok(()),
        other => Err(anyhow!("Unsupported database type: {}", other)),
    }
}

/// Users Server - user records over HTTP
#[derive(Parser)]
#[command(name = "users-server")]
#[command(about = "Users Server - user records with soft delete, bulk ingest, search and stats")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port for HTTP server (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Print current configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Use an in-memory database
    #[arg(long)]
    mock: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Run,
    /// Check configuration
    Check,
    /// Create the unique email index and the full-text index, then rebuild it
    ProvisionIndexes,
    /// Recompute stale normalized emails on existing records
    BackfillEmailLower,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // CLI args passed down to config/app
    let args = CliArgs {
        config: cli.config.as_ref().map(|p| p.to_string_lossy().to_string()),
        port: cli.port,
        print_config: cli.print_config,
        verbose: cli.verbose,
        mock: cli.mock,
    };

    // Load configuration (normalized home_dir is applied inside)
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    config.apply_cli_overrides(&args);

    // Print config and exit if requested
    if cli.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    let logging_config = config.logging.clone().unwrap_or_default();
    runtime::logging::init_logging_from_config(&logging_config, &config.home_dir());
    tracing::info!("Users Server starting");

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_server(config).await,
        Commands::Check => check_config(config),
        Commands::ProvisionIndexes => provision_indexes(config).await,
        Commands::BackfillEmailLower => backfill_email_lower(config).await,
    }
}

fn users_config(config: &AppConfig) -> Result<UsersConfig> {
    config.module_config(USERS_MODULE)
}

async fn connect_database(config: &AppConfig) -> Result<DatabaseConnection> {
    let db_config = config
        .database
        .clone()
        .ok_or_else(|| anyhow!("No database configuration found"))?;
    ensure_sqlite(&db_config)?;

    let dsn = absolutize_sqlite_dsn(db_config.url.trim(), &config.home_dir(), true)?;
    let opts = DbOptions {
        max_conns: db_config.max_conns.unwrap_or(db::DEFAULT_MAX_CONNS),
        busy_timeout: Duration::from_millis(
            db_config
                .busy_timeout_ms
                .unwrap_or(db::DEFAULT_BUSY_TIMEOUT_MS) as u64,
        ),
    };

    tracing::info!("Connecting to database: {}", dsn);
    db::connect(&dsn, &opts).await
}

async fn init_module(config: &AppConfig) -> Result<(UsersModule, bool)> {
    let users_cfg = users_config(config)?;
    let memory = config
        .database
        .as_ref()
        .is_some_and(|d| db::is_memory_dsn(&d.url));
    let conn = connect_database(config).await?;
    let module = UsersModule::init(conn, users_cfg).await?;
    Ok((module, memory))
}

async fn run_server(config: AppConfig) -> Result<()> {
    tracing::info!("Initializing users module...");
    let (module, memory) = init_module(&config).await?;

    // nothing outside this process can provision an in-memory database
    if memory {
        tracing::info!("In-memory database: provisioning indexes at startup");
        module.provision_indexes().await?;
    }

    let router = Router::new().route("/health", get(health_check));
    let router = module.register_rest(router)?;
    let host_opts = HostOptions {
        cors_enabled: config.server.cors_enabled,
        ..Default::default()
    }
    .with_timeout_secs(config.server.timeout_sec);
    let router = apply_http_layers(router, &host_opts);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind HTTP listener on {addr}"))?;

    let cancel = CancellationToken::new();
    cancel_on_signal(cancel.clone());
    serve(listener, router, cancel).await?;

    tracing::info!("Users Server stopped");
    Ok(())
}

fn check_config(config: AppConfig) -> Result<()> {
    tracing::info!("Checking configuration...");

    if let Some(db_config) = &config.database {
        ensure_sqlite(db_config)?;
    }
    let users_cfg = users_config(&config)?;
    tracing::debug!(?users_cfg, "users module configuration");

    tracing::info!("Configuration is valid");
    println!("Configuration check passed");
    println!("{}", config.to_yaml()?);
    Ok(())
}

async fn provision_indexes(config: AppConfig) -> Result<()> {
    let (module, _) = init_module(&config).await?;
    module.provision_indexes().await?;
    println!("Indexes provisioned");
    Ok(())
}

async fn backfill_email_lower(config: AppConfig) -> Result<()> {
    let (module, _) = init_module(&config).await?;
    let report = module.backfill_email_lower().await?;
    println!(
        "Backfill finished: scanned={} updated={} skipped={}",
        report.scanned, report.updated, report.skipped
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_sqlite_paths_resolve_under_home() {
        let tmp = tempfile::tempdir().unwrap();
        let dsn = absolutize_sqlite_dsn("sqlite://database/users.db?mode=rwc", tmp.path(), true)
            .unwrap();
        assert!(dsn.starts_with("sqlite://"));
        assert!(dsn.ends_with("database/users.db?mode=rwc"));
        assert!(tmp.path().join("database").is_dir());
    }

    #[test]
    fn memory_dsn_is_untouched() {
        let dsn = absolutize_sqlite_dsn("sqlite::memory:", Path::new("/nowhere"), false).unwrap();
        assert_eq!(dsn, "sqlite::memory:");
    }

    #[test]
    fn only_sqlite_is_accepted() {
        let cfg = |url: &str| DatabaseConfig {
            url: url.into(),
            max_conns: None,
            busy_timeout_ms: None,
        };
        assert!(ensure_sqlite(&cfg("sqlite://users.db")).is_ok());
        assert!(ensure_sqlite(&cfg("postgres://localhost/app")).is_err());
        assert!(ensure_sqlite(&cfg("   ")).is_err());
    }
}
