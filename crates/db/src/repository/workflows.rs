//! Workflow and starting-node operations.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    DbError, DbPool,
    models::{NodeRow, StartingNodeRow, WorkflowRow},
};

/// Insert a new workflow in `pending` status.
pub async fn create_workflow(
    pool: &DbPool,
    name: &str,
    description: Option<&str>,
    now: DateTime<Utc>,
) -> Result<WorkflowRow, DbError> {
    let id = Uuid::new_v4();

    let row = sqlx::query_as::<_, WorkflowRow>(
        r#"
        INSERT INTO workflows (id, name, description, status, created_at)
        VALUES (?1, ?2, ?3, 'pending', ?4)
        RETURNING id, name, description, status, created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(name)
    .bind(description)
    .bind(now)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Fetch a single live workflow by its primary key.
pub async fn get_workflow(pool: &DbPool, id: Uuid) -> Result<WorkflowRow, DbError> {
    let row = sqlx::query_as::<_, WorkflowRow>(
        r#"
        SELECT id, name, description, status, created_at, updated_at
        FROM workflows
        WHERE id = ?1 AND deleted_at IS NULL
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Update the `status` of a workflow.
///
/// Returns `DbError::NotFound` if no row was updated.
pub async fn update_workflow_status(
    pool: &DbPool,
    id: Uuid,
    status: &str,
    now: DateTime<Utc>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE workflows SET status = ?1, updated_at = ?2 WHERE id = ?3 AND deleted_at IS NULL",
    )
    .bind(status)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}

/// Bind `node_id` as a starting node of `workflow_id`.
pub async fn create_starting_node(
    pool: &DbPool,
    workflow_id: Uuid,
    node_id: Uuid,
    now: DateTime<Utc>,
) -> Result<StartingNodeRow, DbError> {
    let row = sqlx::query_as::<_, StartingNodeRow>(
        r#"
        INSERT INTO workflow_starting_nodes (workflow_id, node_id, created_at)
        VALUES (?1, ?2, ?3)
        RETURNING id, workflow_id, node_id, created_at
        "#,
    )
    .bind(workflow_id)
    .bind(node_id)
    .bind(now)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Live starting nodes of a workflow in binding order; the first one is the
/// entry point.
pub async fn list_starting_nodes(pool: &DbPool, workflow_id: Uuid) -> Result<Vec<NodeRow>, DbError> {
    let rows = sqlx::query_as::<_, NodeRow>(
        r#"
        SELECT n.id, n.title, n.type, n.description, n.created_at, n.updated_at, n.deleted_at
        FROM workflow_starting_nodes ws
        JOIN nodes n ON ws.node_id = n.id
        WHERE ws.workflow_id = ?1 AND ws.deleted_at IS NULL AND n.deleted_at IS NULL
        ORDER BY ws.id ASC
        "#,
    )
    .bind(workflow_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{node, pool};

    #[tokio::test]
    async fn starting_nodes_come_back_in_binding_order() {
        let pool = pool().await;
        let wf = create_workflow(&pool, "onboarding", None, Utc::now()).await.unwrap();
        assert_eq!(wf.status, "pending");

        let second = node(&pool, "second", "Start").await;
        let first = node(&pool, "first", "Start").await;
        create_starting_node(&pool, wf.id, first, Utc::now()).await.unwrap();
        create_starting_node(&pool, wf.id, second, Utc::now()).await.unwrap();

        let ids: Vec<Uuid> = list_starting_nodes(&pool, wf.id).await.unwrap().into_iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![first, second]);

        let dup = create_starting_node(&pool, wf.id, first, Utc::now()).await.unwrap_err();
        assert!(dup.is_unique_violation());
    }

    #[tokio::test]
    async fn status_update_on_missing_workflow_is_not_found() {
        let pool = pool().await;
        let err = update_workflow_status(&pool, Uuid::new_v4(), "running", Utc::now()).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound));
    }
}
