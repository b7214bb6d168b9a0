//! Task Dispatcher: runs a node's tasks against an [`ActionExecutor`].
//!
//! Each call to [`TaskDispatcher::dispatch`] is exactly one attempt; the
//! outcome is written back onto the `node_tasks` row. Retrying is the
//! engine's job.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use actions::{ActionError, ActionExecutor, ActionRequest};
use db::repository::tasks::{self, TaskResultUpdate};
use db::DbPool;

use crate::models::{NodeTask, TaskStatus};
use crate::EngineError;

/// Result of one dispatch attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskOutcome {
    pub node_task_id: Uuid,
    pub task_id: Uuid,
    pub title: String,
    pub status: TaskStatus,
    pub attempt: u32,
    pub status_code: Option<u16>,
    pub response: Option<Value>,
    pub error: Option<String>,
    /// Whether another attempt could change the result.
    pub retryable: bool,
}

impl TaskOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == TaskStatus::Success
    }
}

#[derive(Clone)]
pub struct TaskDispatcher {
    pool: DbPool,
    executor: Arc<dyn ActionExecutor>,
    timeout: Option<Duration>,
}

impl TaskDispatcher {
    pub fn new(pool: DbPool, executor: Arc<dyn ActionExecutor>, timeout: Option<Duration>) -> Self {
        Self { pool, executor, timeout }
    }

    /// Live task bindings of a node, by ascending order.
    pub async fn node_tasks(&self, node_id: Uuid) -> Result<Vec<NodeTask>, EngineError> {
        tasks::list_node_tasks(&self.pool, node_id)
            .await?
            .into_iter()
            .map(NodeTask::try_from)
            .collect()
    }

    /// Invoke one task once and record the outcome on its binding.
    ///
    /// `attempt` is zero-based and is stored as the binding's retry count.
    /// Only persistence failures are returned as `Err`; a failed invocation
    /// is a `TaskOutcome` with status `failed`.
    pub async fn dispatch(&self, node_task: &NodeTask, attempt: u32) -> Result<TaskOutcome, EngineError> {
        let request = ActionRequest {
            method: node_task.task.method,
            action: node_task.task.action.clone(),
            params: node_task.task.params.clone(),
        };

        let invoked = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, self.executor.invoke(&request)).await {
                Ok(result) => result,
                Err(_) => Err(ActionError::Retryable(format!("timed out after {limit:?}"))),
            },
            None => self.executor.invoke(&request).await,
        };

        let mut outcome = TaskOutcome {
            node_task_id: node_task.id,
            task_id: node_task.task.id,
            title: node_task.task.title.clone(),
            status: TaskStatus::Failed,
            attempt,
            status_code: None,
            response: None,
            error: None,
            retryable: false,
        };

        match invoked {
            Ok(response) => {
                outcome.status_code = Some(response.status);
                if response.is_success() {
                    outcome.status = TaskStatus::Success;
                } else {
                    outcome.retryable = response.is_retryable();
                    outcome.error = Some(format!("action returned status {}", response.status));
                }
                outcome.response = Some(response.body);
            }
            Err(err) => {
                outcome.retryable = err.is_retryable();
                outcome.error = Some(err.to_string());
            }
        }

        if outcome.succeeded() {
            info!(task = %outcome.title, attempt, "task succeeded");
        } else {
            warn!(
                task = %outcome.title,
                attempt,
                retryable = outcome.retryable,
                "task failed: {}",
                outcome.error.as_deref().unwrap_or("unknown error")
            );
        }

        let status = outcome.status.to_string();
        tasks::record_task_result(
            &self.pool,
            node_task.id,
            TaskResultUpdate {
                status: &status,
                retry_count: i64::from(attempt),
                status_code: outcome.status_code.map(i64::from),
                response: outcome.response.clone(),
                error_message: outcome.error.as_deref(),
            },
            Utc::now(),
        )
        .await?;

        Ok(outcome)
    }

    /// Dispatch every task of the node once, in order. A failed task does not
    /// stop the ones after it.
    pub async fn run_tasks(&self, node_id: Uuid) -> Result<Vec<TaskOutcome>, EngineError> {
        let mut outcomes = Vec::new();
        for node_task in self.node_tasks(node_id).await? {
            outcomes.push(self.dispatch(&node_task, 0).await?);
        }
        Ok(outcomes)
    }
}
