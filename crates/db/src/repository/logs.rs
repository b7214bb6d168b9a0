//! Execution log (`workflow_logs`) operations.
//!
//! The table is append-only: there is no update or delete here. Entries are
//! ordered by their autoincrement `id`; the highest id for a node is the
//! node's current state.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    DbError, DbPool,
    models::{AncestorStateRow, NodeRow, WorkflowLogRow},
};

/// Append one entry.
pub async fn append_log(
    pool: &DbPool,
    workflow_id: Option<Uuid>,
    node_id: Uuid,
    status: &str,
    message: &str,
    now: DateTime<Utc>,
) -> Result<WorkflowLogRow, DbError> {
    let row = sqlx::query_as::<_, WorkflowLogRow>(
        r#"
        INSERT INTO workflow_logs (workflow_id, node_id, status, message, executed_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        RETURNING id, workflow_id, node_id, status, message, executed_at
        "#,
    )
    .bind(workflow_id)
    .bind(node_id)
    .bind(status)
    .bind(message)
    .bind(now)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// The most recent entry for a node, if any.
pub async fn latest_for_node(pool: &DbPool, node_id: Uuid) -> Result<Option<WorkflowLogRow>, DbError> {
    let row = sqlx::query_as::<_, WorkflowLogRow>(
        r#"
        SELECT id, workflow_id, node_id, status, message, executed_at
        FROM workflow_logs
        WHERE node_id = ?1
        ORDER BY id DESC
        LIMIT 1
        "#,
    )
    .bind(node_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Every entry for a node, oldest first.
pub async fn list_for_node(pool: &DbPool, node_id: Uuid) -> Result<Vec<WorkflowLogRow>, DbError> {
    let rows = sqlx::query_as::<_, WorkflowLogRow>(
        r#"
        SELECT id, workflow_id, node_id, status, message, executed_at
        FROM workflow_logs
        WHERE node_id = ?1
        ORDER BY id ASC
        "#,
    )
    .bind(node_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Every entry written on behalf of a workflow, oldest first.
pub async fn list_for_workflow(pool: &DbPool, workflow_id: Uuid) -> Result<Vec<WorkflowLogRow>, DbError> {
    let rows = sqlx::query_as::<_, WorkflowLogRow>(
        r#"
        SELECT id, workflow_id, node_id, status, message, executed_at
        FROM workflow_logs
        WHERE workflow_id = ?1
        ORDER BY id ASC
        "#,
    )
    .bind(workflow_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Every live ancestor of `node_id` at depth 1 or more, nearest first, each
/// with its most recent log entry id and status (both `None` if it never ran).
pub async fn ancestor_states(pool: &DbPool, node_id: Uuid) -> Result<Vec<AncestorStateRow>, DbError> {
    let rows = sqlx::query_as::<_, AncestorStateRow>(
        r#"
        SELECT n.id, n.title, n.type, n.description, n.created_at, n.updated_at, n.deleted_at,
               nc.depth,
               latest.id AS latest_log_id,
               latest.status AS latest_status
        FROM node_closure nc
        JOIN nodes n ON nc.ancestor = n.id
        LEFT JOIN workflow_logs latest ON latest.id = (
            SELECT MAX(wl.id) FROM workflow_logs wl WHERE wl.node_id = nc.ancestor
        )
        WHERE nc.descendant = ?1
          AND nc.depth > 0
          AND n.deleted_at IS NULL
        ORDER BY nc.depth ASC, n.rowid ASC
        "#,
    )
    .bind(node_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Distinct nodes with a `success` entry at or before the most recent entry
/// of `current`, most recently executed first.
pub async fn executed_before(pool: &DbPool, current: Uuid) -> Result<Vec<NodeRow>, DbError> {
    let rows = sqlx::query_as::<_, NodeRow>(
        r#"
        SELECT n.id, n.title, n.type, n.description, n.created_at, n.updated_at, n.deleted_at
        FROM workflow_logs wl
        JOIN nodes n ON wl.node_id = n.id
        WHERE wl.status = 'success'
          AND wl.id <= (SELECT MAX(id) FROM workflow_logs WHERE node_id = ?1)
        GROUP BY n.id
        ORDER BY MAX(wl.id) DESC
        "#,
    )
    .bind(current)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
