//! Execution Log: append-only trail of node executions and rollbacks.

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use db::repository::logs;
use db::DbPool;

use crate::models::{ExecutionLogEntry, LogStatus};
use crate::EngineError;

#[derive(Clone)]
pub struct ExecutionLog {
    pool: DbPool,
}

impl ExecutionLog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn append(
        &self,
        workflow_id: Option<Uuid>,
        node_id: Uuid,
        status: LogStatus,
        message: &str,
    ) -> Result<ExecutionLogEntry, EngineError> {
        let row = logs::append_log(
            &self.pool,
            workflow_id,
            node_id,
            &status.to_string(),
            message,
            Utc::now(),
        )
        .await?;
        debug!(node_id = %node_id, %status, "log entry appended");
        ExecutionLogEntry::try_from(row)
    }

    /// The authoritative (most recent) entry for a node.
    pub async fn latest(&self, node_id: Uuid) -> Result<Option<ExecutionLogEntry>, EngineError> {
        logs::latest_for_node(&self.pool, node_id)
            .await?
            .map(ExecutionLogEntry::try_from)
            .transpose()
    }

    pub async fn entries_for_node(&self, node_id: Uuid) -> Result<Vec<ExecutionLogEntry>, EngineError> {
        logs::list_for_node(&self.pool, node_id)
            .await?
            .into_iter()
            .map(ExecutionLogEntry::try_from)
            .collect()
    }

    pub async fn entries_for_workflow(&self, workflow_id: Uuid) -> Result<Vec<ExecutionLogEntry>, EngineError> {
        logs::list_for_workflow(&self.pool, workflow_id)
            .await?
            .into_iter()
            .map(ExecutionLogEntry::try_from)
            .collect()
    }
}
