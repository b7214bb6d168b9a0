//! Workflow store: workflow records, status transitions and starting-node
//! bindings.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use db::repository::{nodes, workflows};
use db::DbPool;

use crate::error::or_not_found;
use crate::models::{nodes_from_rows, Node, Workflow, WorkflowStatus};
use crate::EngineError;

#[derive(Clone)]
pub struct WorkflowStore {
    pool: DbPool,
}

impl WorkflowStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create a workflow in `pending` status.
    pub async fn create_workflow(&self, name: &str, description: Option<&str>) -> Result<Workflow, EngineError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EngineError::Validation("workflow name must not be empty".into()));
        }

        let row = workflows::create_workflow(&self.pool, name, description, Utc::now()).await?;
        info!(workflow_id = %row.id, "workflow created");
        Workflow::try_from(row)
    }

    pub async fn get_workflow(&self, id: Uuid) -> Result<Workflow, EngineError> {
        let row = workflows::get_workflow(&self.pool, id)
            .await
            .map_err(or_not_found("workflow", id))?;
        Workflow::try_from(row)
    }

    pub async fn set_status(&self, id: Uuid, status: WorkflowStatus) -> Result<(), EngineError> {
        workflows::update_workflow_status(&self.pool, id, &status.to_string(), Utc::now())
            .await
            .map_err(or_not_found("workflow", id))
    }

    /// Bind `node_id` as a starting node of the workflow. Bindings are
    /// ordered by creation; the first is the entry point.
    ///
    /// # Errors
    /// - [`EngineError::NotFound`] if the workflow or node is missing.
    /// - [`EngineError::Validation`] if the node is already bound.
    pub async fn create_starting_node(&self, workflow_id: Uuid, node_id: Uuid) -> Result<(), EngineError> {
        self.get_workflow(workflow_id).await?;
        nodes::get_node(&self.pool, node_id)
            .await
            .map_err(or_not_found("node", node_id))?;

        match workflows::create_starting_node(&self.pool, workflow_id, node_id, Utc::now()).await {
            Ok(_) => {
                info!(workflow_id = %workflow_id, node_id = %node_id, "starting node bound");
                Ok(())
            }
            Err(e) if e.is_unique_violation() => Err(EngineError::Validation(format!(
                "node '{node_id}' is already a starting node of workflow '{workflow_id}'"
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Live starting nodes in binding order.
    pub async fn starting_nodes(&self, workflow_id: Uuid) -> Result<Vec<Node>, EngineError> {
        let rows = workflows::list_starting_nodes(&self.pool, workflow_id).await?;
        nodes_from_rows(rows)
    }
}
