//! `dagflow` CLI entry-point.
//!
//! Available sub-commands:
//! - `serve`: start the API server.
//! - `migrate`: run pending database migrations.
//! - `validate`: check a workflow's graph for cycles.
//! - `execute`: run a workflow to completion.
//! - `rollback`: record a rollback for one node.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use actions::HttpActionExecutor;
use engine::{ExecutorConfig, WorkflowExecutor};

/// Used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "cli=info,api=info,engine=info,db=info,actions=info,tower_http=info";

#[derive(Parser)]
#[command(name = "dagflow", about = "Closure-table workflow engine", version)]
struct Cli {
    #[command(flatten)]
    store: StoreArgs,

    #[command(flatten)]
    executor: ExecutorArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct StoreArgs {
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://dagflow.db?mode=rwc", global = true)]
    database_url: String,

    #[arg(long, default_value_t = 5, global = true)]
    max_connections: u32,
}

#[derive(Args)]
struct ExecutorArgs {
    /// Retries per task after a retryable failure.
    #[arg(long, env = "DAGFLOW_MAX_RETRIES", default_value_t = 3, global = true)]
    max_retries: u32,

    /// Base back-off delay in milliseconds; doubles on each retry.
    #[arg(long, env = "DAGFLOW_RETRY_DELAY_MS", default_value_t = 100, global = true)]
    retry_delay_ms: u64,

    /// Per-invocation timeout in seconds; 0 disables it.
    #[arg(long, env = "DAGFLOW_TASK_TIMEOUT_SECS", default_value_t = 30, global = true)]
    task_timeout_secs: u64,
}

impl ExecutorArgs {
    fn config(&self) -> ExecutorConfig {
        ExecutorConfig {
            max_retries: self.max_retries,
            retry_base_delay: Duration::from_millis(self.retry_delay_ms),
            task_timeout: (self.task_timeout_secs > 0).then(|| Duration::from_secs(self.task_timeout_secs)),
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Start the REST API server.
    Serve {
        #[arg(long, default_value = "0.0.0.0:8080")]
        bind: SocketAddr,
    },
    /// Run pending database migrations.
    Migrate,
    /// Check every starting node's subgraph of a workflow for cycles.
    Validate { workflow_id: Uuid },
    /// Execute a workflow and print the report.
    Execute { workflow_id: Uuid },
    /// Append a rollback entry for a node.
    Rollback { node_id: Uuid },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)))
        .init();

    let cli = Cli::parse();

    let pool = db::pool::create_pool(&cli.store.database_url, cli.store.max_connections)
        .await
        .with_context(|| format!("failed to open database {}", cli.store.database_url))?;
    db::pool::run_migrations(&pool).await.context("migration failed")?;

    if let Command::Migrate = cli.command {
        info!("Migrations applied successfully");
        return Ok(());
    }

    let config = cli.executor.config();
    let actions = match config.task_timeout {
        Some(limit) => HttpActionExecutor::with_timeout(limit).context("failed to build HTTP client")?,
        None => HttpActionExecutor::new(),
    };
    let executor = Arc::new(WorkflowExecutor::new(pool, Arc::new(actions), config));

    match cli.command {
        Command::Migrate => {}
        Command::Serve { bind } => {
            info!("Starting API server on {bind}");
            api::serve(bind, api::AppState::new(executor)).await?;
        }
        Command::Validate { workflow_id } => {
            let starts = executor.workflows().starting_nodes(workflow_id).await?;
            if starts.is_empty() {
                anyhow::bail!("workflow {workflow_id} has no starting nodes");
            }
            for start in &starts {
                executor.graph().validate_acyclic(start.id).await?;
            }
            println!("Workflow {workflow_id} is acyclic ({} starting node(s)).", starts.len());
        }
        Command::Execute { workflow_id } => {
            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupt received, cancelling run");
                    on_signal.cancel();
                }
            });

            let report = executor.execute_workflow(workflow_id, &cancel).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Rollback { node_id } => {
            let entry = executor.rollback_node(node_id).await?;
            println!("{}", serde_json::to_string_pretty(&entry)?);
        }
    }

    Ok(())
}
