//! Local BloodHound CE stack launcher.
//!
//! Brings up PostgreSQL, Neo4j, and BloodHound CE on the local container
//! engine, migrates legacy custom queries into the running database on
//! first run, then blocks until the operator asks for teardown.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{Months, Utc};
use clap::Parser;
use container_engine::{ContainerEngine, DockerEngine};
use query_migration::{migrate, MigrationTarget, QueryInjector};
use stack_orchestration::{StackConfig, StackOrchestrator, NEO4J_DATA_DIR, POSTGRES_DATA_DIR};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bh-harness")]
#[command(about = "Local BloodHound CE stack launcher")]
#[command(version)]
struct Cli {
    /// Skip pulling images before starting containers (registries rate-limit pulls)
    #[arg(long)]
    no_pull: bool,

    /// Echo container log lines while waiting for readiness
    #[arg(long)]
    logs: bool,

    /// Admin password expiration timestamp, `%Y-%m-%d %H:%M:%S` (default: ten years out)
    #[arg(long)]
    expiration: Option<String>,

    /// Path to the legacy custom-queries JSON document
    #[arg(long, default_value = "customqueries.json")]
    queries: PathBuf,

    /// Base path for the stack's data folders (default: current directory)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Force query injection into an existing data directory (duplicates existing rows)
    #[arg(long)]
    force: bool,

    /// Engine socket override, e.g. unix:///run/podman/podman.sock
    #[arg(long)]
    socket: Option<String>,

    /// Bound in seconds on each readiness wait; 0 waits forever
    #[arg(long, default_value_t = 900)]
    ready_timeout: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    run(cli).await
}

async fn run(cli: Cli) -> Result<()> {
    let data_root = match &cli.data_dir {
        Some(path) => path.clone(),
        None => std::env::current_dir().context("could not determine working directory")?,
    };

    // A data directory without the PostgreSQL folder means a fresh project,
    // which is the one moment query injection is safe by default.
    let fresh = is_fresh_project(&data_root);
    let inject = cli.force || fresh;
    if fresh {
        info!(path = %data_root.display(), "new project detected, creating data folders");
    }
    if inject && !cli.queries.exists() {
        bail!(
            "custom queries file not found at {}",
            cli.queries.display()
        );
    }

    ensure_data_dirs(&data_root).await?;

    let engine: Arc<dyn ContainerEngine> = Arc::new(connect_engine(cli.socket.as_deref())?);
    let config = StackConfig {
        data_root,
        pull_images: !cli.no_pull,
        echo_logs: cli.logs,
        ready_timeout: (cli.ready_timeout > 0).then(|| Duration::from_secs(cli.ready_timeout)),
        ..Default::default()
    };

    let mut orchestrator = StackOrchestrator::new(engine.clone(), config);
    // launch() tears down whatever it started before returning an error
    orchestrator.launch().await?;

    // Migration-side failures leave the live stack alone: the operator can
    // still use it, and teardown happens once at the end either way.
    let mut post_launch_failure: Option<anyhow::Error> = None;

    let target = MigrationTarget {
        container_id: orchestrator
            .database_id()
            .context("database container id missing after launch")?
            .to_string(),
        db_user: orchestrator.config().db_user.clone(),
        db_name: orchestrator.config().db_name.clone(),
        admin_name: orchestrator.config().admin_name.clone(),
    };
    let injector = QueryInjector::new(engine.as_ref(), &target);

    let expiration = match cli.expiration.clone() {
        Some(value) => value,
        None => default_expiration()?,
    };
    info!(%expiration, "updating admin password expiration");
    if let Err(e) = injector.extend_password_expiration(&expiration).await {
        error!(error = %e, "password expiration update failed");
        post_launch_failure = Some(e.into());
    }

    if inject {
        info!(document = %cli.queries.display(), "migrating legacy custom queries");
        match migrate(engine.as_ref(), &target, &cli.queries).await {
            Ok(report) => info!(
                injected = report.injected,
                skipped = report.skipped,
                "custom query migration finished"
            ),
            Err(e) => {
                error!(error = %e, "custom query migration failed; the stack stays up");
                post_launch_failure = Some(e.into());
            }
        }
    }

    println!("Access BloodHound at {}", orchestrator.config().app_url());
    println!("Username: {}", orchestrator.config().admin_name);
    println!("Password: {}", orchestrator.config().admin_pass);
    wait_for_operator().await;

    info!("cleaning up");
    let total = orchestrator.services().len();
    let stopped = orchestrator.shutdown_all().await;
    if stopped < total {
        warn!("some containers could not be stopped; see warnings above");
    }

    match post_launch_failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn connect_engine(socket: Option<&str>) -> Result<DockerEngine> {
    let engine = match socket {
        Some(path) => DockerEngine::connect_socket(path),
        None => DockerEngine::connect(),
    };
    engine.context(
        "could not reach the container engine: is it running as a service, \
         and do you have permission to use its socket?",
    )
}

fn is_fresh_project(data_root: &Path) -> bool {
    !data_root.join(POSTGRES_DATA_DIR).exists()
}

async fn ensure_data_dirs(data_root: &Path) -> Result<()> {
    for dir in [POSTGRES_DATA_DIR, NEO4J_DATA_DIR] {
        let path = data_root.join(dir);
        tokio::fs::create_dir_all(&path)
            .await
            .with_context(|| format!("failed to create data folder {}", path.display()))?;
    }
    Ok(())
}

fn default_expiration() -> Result<String> {
    let expires = Utc::now()
        .checked_add_months(Months::new(120))
        .context("expiration date out of range")?;
    Ok(expires.format("%Y-%m-%d %H:%M:%S").to_string())
}

async fn wait_for_operator() {
    println!("Press Enter to stop the stack and exit...");
    let mut line = String::new();
    let mut stdin = BufReader::new(tokio::io::stdin());
    tokio::select! {
        _ = stdin.read_line(&mut line) => {}
        _ = tokio::signal::ctrl_c() => {
            println!();
        }
    }
}
