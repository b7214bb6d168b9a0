//! Workflow execution engine.
//!
//! `WorkflowExecutor` is the central orchestrator:
//! 1. Resolves the workflow's starting nodes and checks their subgraphs for
//!    cycles.
//! 2. Walks the union of their descendants, shallowest first, deferring
//!    nodes whose ancestors have not succeeded yet and skipping nodes whose
//!    success is still current.
//! 3. Dispatches each ready node's tasks through the [`TaskDispatcher`],
//!    retrying retryable failures with exponential back-off.
//! 4. Appends one execution-log entry per node and moves the workflow
//!    through `pending → running → completed | failed`.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use actions::ActionExecutor;
use db::DbPool;

use crate::dispatcher::{TaskDispatcher, TaskOutcome};
use crate::graph::GraphStore;
use crate::log::ExecutionLog;
use crate::models::{ExecutionLogEntry, LogStatus, Node, NodeTask, WorkflowStatus};
use crate::resolver::DependencyResolver;
use crate::tasks::TaskCatalog;
use crate::workflows::WorkflowStore;
use crate::EngineError;

const SUCCESS_MESSAGE: &str = "Node executed successfully";
const ROLLBACK_MESSAGE: &str = "Node rolled back successfully";

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tuning knobs for the executor.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Maximum number of times a retryable task failure will be retried.
    pub max_retries: u32,
    /// Base delay for exponential back-off between retries.
    pub retry_base_delay: Duration,
    /// Upper bound on a single task invocation. `None` waits forever.
    pub task_timeout: Option<Duration>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_base_delay: Duration::from_millis(100),
            task_timeout: Some(Duration::from_secs(30)),
        }
    }
}

// ---------------------------------------------------------------------------
// Output of a completed execution
// ---------------------------------------------------------------------------

/// Summary of a workflow run that reached `completed`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionReport {
    pub workflow_id: Uuid,
    pub status: WorkflowStatus,
    /// Nodes executed by this run, in execution order.
    pub executed: Vec<Uuid>,
    /// Nodes whose latest log entry was already `success`.
    pub skipped: Vec<Uuid>,
}

// ---------------------------------------------------------------------------
// Per-workflow exclusion
// ---------------------------------------------------------------------------

type RunningSet = Arc<Mutex<HashSet<Uuid>>>;

/// Holds a workflow id in the running set until dropped.
struct RunGuard {
    running: RunningSet,
    workflow_id: Uuid,
}

impl RunGuard {
    fn acquire(running: &RunningSet, workflow_id: Uuid) -> Result<Self, EngineError> {
        let mut set = running.lock().unwrap_or_else(PoisonError::into_inner);
        if !set.insert(workflow_id) {
            return Err(EngineError::AlreadyRunning(workflow_id));
        }
        Ok(Self { running: Arc::clone(running), workflow_id })
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let mut set = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        set.remove(&self.workflow_id);
    }
}

// ---------------------------------------------------------------------------
// WorkflowExecutor
// ---------------------------------------------------------------------------

/// Orchestrates workflow runs against one store.
///
/// Construct one executor per process and share it behind an `Arc`.
/// Concurrent runs of *different* workflows are fine;
/// a second run of the same workflow is rejected while the first is active.
pub struct WorkflowExecutor {
    graph: GraphStore,
    resolver: DependencyResolver,
    dispatcher: TaskDispatcher,
    log: ExecutionLog,
    workflows: WorkflowStore,
    tasks: TaskCatalog,
    config: ExecutorConfig,
    running: RunningSet,
}

impl WorkflowExecutor {
    /// Create a new executor.
    pub fn new(pool: DbPool, executor: Arc<dyn ActionExecutor>, config: ExecutorConfig) -> Self {
        Self {
            graph: GraphStore::new(pool.clone()),
            resolver: DependencyResolver::new(pool.clone()),
            dispatcher: TaskDispatcher::new(pool.clone(), executor, config.task_timeout),
            log: ExecutionLog::new(pool.clone()),
            workflows: WorkflowStore::new(pool.clone()),
            tasks: TaskCatalog::new(pool),
            config,
            running: Arc::default(),
        }
    }

    pub fn graph(&self) -> &GraphStore {
        &self.graph
    }

    pub fn resolver(&self) -> &DependencyResolver {
        &self.resolver
    }

    pub fn log(&self) -> &ExecutionLog {
        &self.log
    }

    pub fn workflows(&self) -> &WorkflowStore {
        &self.workflows
    }

    pub fn tasks(&self) -> &TaskCatalog {
        &self.tasks
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run the workflow from its starting nodes.
    ///
    /// # Errors
    /// - `AlreadyRunning` if this executor is already running the workflow.
    /// - `NotFound` for an unknown workflow or one without starting nodes.
    /// - `Cycle`, `Dispatch`, `DependencyNotReady`, `Cancelled` and
    ///   `Persistence` end the run with the workflow marked `failed`.
    #[instrument(skip(self, cancel))]
    pub async fn execute_workflow(
        &self,
        workflow_id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<ExecutionReport, EngineError> {
        let _guard = RunGuard::acquire(&self.running, workflow_id)?;

        self.workflows.get_workflow(workflow_id).await?;
        let starts = self.workflows.starting_nodes(workflow_id).await?;
        if starts.is_empty() {
            return Err(EngineError::not_found("starting node", workflow_id));
        }

        let result = self.run(workflow_id, &starts, cancel).await;

        match &result {
            Ok(report) => {
                info!(
                    executed = report.executed.len(),
                    skipped = report.skipped.len(),
                    "workflow completed"
                );
            }
            Err(e) => {
                error!("workflow failed: {e}");
                // Best effort: the run error is returned either way.
                if let Err(status_err) = self.workflows.set_status(workflow_id, WorkflowStatus::Failed).await {
                    warn!("could not mark workflow failed: {status_err}");
                }
            }
        }

        result
    }

    async fn run(
        &self,
        workflow_id: Uuid,
        starts: &[Node],
        cancel: &CancellationToken,
    ) -> Result<ExecutionReport, EngineError> {
        for start in starts {
            self.graph.validate_acyclic(start.id).await?;
        }

        self.workflows.set_status(workflow_id, WorkflowStatus::Running).await?;

        // ------------------------------------------------------------------
        // Union of every starting node's descendants, first binding first.
        // ------------------------------------------------------------------
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        for start in starts {
            for node in self.graph.get_descendants(start.id).await? {
                if seen.insert(node.id) {
                    queue.push_back(node);
                }
            }
        }
        info!("walking {} node(s) from {} starting node(s)", queue.len(), starts.len());

        let mut executed = Vec::new();
        let mut skipped = Vec::new();
        // Nodes deferred since the last node that ran.
        let mut deferred = 0usize;

        while let Some(node) = queue.pop_front() {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }

            if !self.resolver.all_parents_completed(node.id).await? {
                queue.push_back(node);
                deferred += 1;
                if deferred >= queue.len() {
                    let blocked: Vec<Uuid> = queue.iter().map(|n| n.id).collect();
                    warn!(?blocked, "no runnable nodes left");
                    return Err(EngineError::DependencyNotReady(blocked));
                }
                continue;
            }

            if self.resolver.has_current_success(node.id).await? {
                skipped.push(node.id);
                continue;
            }

            self.execute_ready_node(Some(workflow_id), &node, cancel).await?;
            executed.push(node.id);
            deferred = 0;
        }

        self.workflows.set_status(workflow_id, WorkflowStatus::Completed).await?;

        Ok(ExecutionReport {
            workflow_id,
            status: WorkflowStatus::Completed,
            executed,
            skipped,
        })
    }

    /// Run one node outside a full walk. The workflow's status is not
    /// touched.
    ///
    /// # Errors
    /// `AlreadyRunning` while the workflow is being executed, `NotFound` for
    /// an unknown workflow or node, `DependencyNotReady` if an ancestor has
    /// not succeeded, `Dispatch` if a task failed.
    #[instrument(skip(self))]
    pub async fn execute_node(&self, workflow_id: Uuid, node_id: Uuid) -> Result<ExecutionLogEntry, EngineError> {
        let _guard = RunGuard::acquire(&self.running, workflow_id)?;

        self.workflows.get_workflow(workflow_id).await?;
        let node = self.graph.get_node(node_id).await?;
        self.resolver.ensure_ready(node_id).await?;

        self.execute_ready_node(Some(workflow_id), &node, &CancellationToken::new())
            .await
    }

    /// Record that a node's effects were undone, which re-gates every node
    /// below it.
    /// External side effects of its tasks are not reversed.
    #[instrument(skip(self))]
    pub async fn rollback_node(&self, node_id: Uuid) -> Result<ExecutionLogEntry, EngineError> {
        self.graph.get_node(node_id).await?;
        let workflow_id = self.log.latest(node_id).await?.and_then(|entry| entry.workflow_id);

        let entry = self
            .log
            .append(workflow_id, node_id, LogStatus::Rollback, ROLLBACK_MESSAGE)
            .await?;
        info!("node rolled back");
        Ok(entry)
    }

    // -----------------------------------------------------------------------
    // Internal: run a node whose dependencies are satisfied.
    // -----------------------------------------------------------------------

    async fn execute_ready_node(
        &self,
        workflow_id: Option<Uuid>,
        node: &Node,
        cancel: &CancellationToken,
    ) -> Result<ExecutionLogEntry, EngineError> {
        let mut failed = Vec::new();
        for node_task in self.dispatcher.node_tasks(node.id).await? {
            let outcome = self.dispatch_with_retry(&node_task, cancel).await?;
            if !outcome.succeeded() {
                failed.push(outcome);
            }
        }

        if failed.is_empty() {
            info!(node_id = %node.id, title = %node.title, "node succeeded");
            return self
                .log
                .append(workflow_id, node.id, LogStatus::Success, SUCCESS_MESSAGE)
                .await;
        }

        let message = failure_message(&failed);
        error!(node_id = %node.id, title = %node.title, "{message}");
        self.log
            .append(workflow_id, node.id, LogStatus::Failed, &message)
            .await?;

        Err(EngineError::Dispatch { node_id: node.id, message })
    }

    // -----------------------------------------------------------------------
    // Internal: dispatch a single task with retry logic.
    // -----------------------------------------------------------------------

    async fn dispatch_with_retry(
        &self,
        node_task: &NodeTask,
        cancel: &CancellationToken,
    ) -> Result<TaskOutcome, EngineError> {
        let mut attempt = 0u32;

        loop {
            let outcome = self.dispatcher.dispatch(node_task, attempt).await?;
            if outcome.succeeded() || !outcome.retryable || attempt >= self.config.max_retries {
                return Ok(outcome);
            }

            let delay = self.config.retry_base_delay.saturating_mul(2u32.saturating_pow(attempt));
            attempt += 1;

            warn!(
                "task '{}' retryable failure (attempt {}/{}), retrying in {:?}",
                outcome.title, attempt, self.config.max_retries, delay
            );

            tokio::select! {
                _ = cancel.cancelled() => return Err(EngineError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

fn failure_message(failed: &[TaskOutcome]) -> String {
    let parts: Vec<String> = failed
        .iter()
        .map(|o| format!("{} ({})", o.title, o.error.as_deref().unwrap_or("unknown error")))
        .collect();
    format!("Node failed: {} task(s) failed: {}", failed.len(), parts.join("; "))
}
