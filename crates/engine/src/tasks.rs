//! Task catalog: reusable task definitions and their node bindings.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use db::repository::{nodes, tasks};
use db::DbPool;

use crate::error::or_not_found;
use crate::models::{NewTask, NodeTask, Task};
use crate::EngineError;

#[derive(Clone)]
pub struct TaskCatalog {
    pool: DbPool,
}

impl TaskCatalog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Store a task definition.
    ///
    /// # Errors
    /// [`EngineError::Validation`] if the title or action is blank.
    pub async fn create_task(&self, new: NewTask) -> Result<Task, EngineError> {
        if new.title.trim().is_empty() {
            return Err(EngineError::Validation("task title must not be empty".into()));
        }
        if new.action.trim().is_empty() {
            return Err(EngineError::Validation("task action must not be empty".into()));
        }

        let row = tasks::create_task(
            &self.pool,
            new.title.trim(),
            &new.task_type,
            &new.method.to_string(),
            new.action.trim(),
            new.params,
            Utc::now(),
        )
        .await?;

        info!(task_id = %row.id, "task created");
        Task::try_from(row)
    }

    pub async fn get_task(&self, id: Uuid) -> Result<Task, EngineError> {
        let row = tasks::get_task(&self.pool, id)
            .await
            .map_err(or_not_found("task", id))?;
        Task::try_from(row)
    }

    /// Bind a task to a node at position `order`.
    ///
    /// # Errors
    /// - [`EngineError::NotFound`] if the node or the task is missing.
    /// - [`EngineError::Validation`] if the node already has a task at `order`.
    pub async fn attach_task(&self, node_id: Uuid, task_id: Uuid, order: i64) -> Result<NodeTask, EngineError> {
        nodes::get_node(&self.pool, node_id)
            .await
            .map_err(or_not_found("node", node_id))?;
        self.get_task(task_id).await?;

        let row = match tasks::attach_task(&self.pool, node_id, task_id, order, Utc::now()).await {
            Ok(row) => row,
            Err(e) if e.is_unique_violation() => {
                return Err(EngineError::Validation(format!(
                    "node '{node_id}' already has a task at order {order}"
                )));
            }
            Err(e) => return Err(e.into()),
        };

        NodeTask::try_from(row)
    }

    /// Live bindings of a node, by ascending order, with their last results.
    pub async fn node_tasks(&self, node_id: Uuid) -> Result<Vec<NodeTask>, EngineError> {
        tasks::list_node_tasks(&self.pool, node_id)
            .await?
            .into_iter()
            .map(NodeTask::try_from)
            .collect()
    }

    /// Soft-delete a binding; the task definition stays.
    pub async fn detach_task(&self, node_task_id: Uuid) -> Result<(), EngineError> {
        tasks::detach_task(&self.pool, node_task_id, Utc::now())
            .await
            .map_err(or_not_found("node task", node_task_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphStore;
    use crate::models::TaskStatus;
    use actions::HttpMethod;
    use db::pool::create_in_memory_pool;
    use serde_json::json;

    fn new_task(title: &str, action: &str) -> NewTask {
        NewTask {
            title: title.into(),
            task_type: "http".into(),
            method: HttpMethod::Get,
            action: action.into(),
            params: json!({ "q": "x" }),
        }
    }

    #[tokio::test]
    async fn create_and_attach() {
        let pool = create_in_memory_pool().await.unwrap();
        let graph = GraphStore::new(pool.clone());
        let catalog = TaskCatalog::new(pool);

        let node = graph.create_node("n", "Task", None).await.unwrap();
        let task = catalog.create_task(new_task("lookup", "http://svc/lookup")).await.unwrap();
        assert_eq!(task.method, HttpMethod::Get);
        assert_eq!(catalog.get_task(task.id).await.unwrap().params, json!({ "q": "x" }));

        let binding = catalog.attach_task(node, task.id, 1).await.unwrap();
        assert_eq!(binding.status, TaskStatus::Pending);
        assert_eq!(binding.retry_count, 0);
        assert_eq!(binding.task.id, task.id);

        assert!(matches!(
            catalog.attach_task(node, task.id, 1).await,
            Err(EngineError::Validation(_))
        ));

        catalog.detach_task(binding.id).await.unwrap();
        catalog.attach_task(node, task.id, 1).await.unwrap();
    }

    #[tokio::test]
    async fn invalid_definitions_and_targets_are_rejected() {
        let pool = create_in_memory_pool().await.unwrap();
        let catalog = TaskCatalog::new(pool);

        assert!(matches!(
            catalog.create_task(new_task(" ", "http://x")).await,
            Err(EngineError::Validation(_))
        ));
        assert!(matches!(
            catalog.create_task(new_task("t", "")).await,
            Err(EngineError::Validation(_))
        ));

        let task = catalog.create_task(new_task("t", "http://x")).await.unwrap();
        assert!(matches!(
            catalog.attach_task(Uuid::new_v4(), task.id, 1).await,
            Err(EngineError::NotFound { entity: "node", .. })
        ));
    }
}
