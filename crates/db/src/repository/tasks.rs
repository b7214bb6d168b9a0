//! Task definitions and node ↔ task bindings.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::types::Json;
use uuid::Uuid;

use crate::{
    DbError, DbPool,
    models::{NodeTaskRow, TaskRow},
};

/// Insert a reusable task definition.
pub async fn create_task(
    pool: &DbPool,
    title: &str,
    task_type: &str,
    method: &str,
    action: &str,
    params: Value,
    now: DateTime<Utc>,
) -> Result<TaskRow, DbError> {
    let id = Uuid::new_v4();

    let row = sqlx::query_as::<_, TaskRow>(
        r#"
        INSERT INTO tasks (id, title, type, method, action, params, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        RETURNING id, title, type, method, action, params, created_at
        "#,
    )
    .bind(id)
    .bind(title)
    .bind(task_type)
    .bind(method)
    .bind(action)
    .bind(Json(params))
    .bind(now)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Fetch a live task definition.
pub async fn get_task(pool: &DbPool, id: Uuid) -> Result<TaskRow, DbError> {
    let row = sqlx::query_as::<_, TaskRow>(
        r#"
        SELECT id, title, type, method, action, params, created_at
        FROM tasks
        WHERE id = ?1 AND deleted_at IS NULL
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

const NODE_TASK_SELECT: &str = r#"
    SELECT nt.id, nt.node_id, nt.task_id, nt.task_order, nt.status, nt.retry_count,
           nt.status_code, nt.response, nt.error_message, nt.created_at, nt.updated_at,
           t.title AS task_title, t.type AS task_type, t.method, t.action, t.params,
           t.created_at AS task_created_at
    FROM node_tasks nt
    JOIN tasks t ON nt.task_id = t.id
"#;

/// Attach `task_id` to `node_id` at position `order`.
///
/// A second live binding with the same order on the same node violates a
/// unique index.
pub async fn attach_task(
    pool: &DbPool,
    node_id: Uuid,
    task_id: Uuid,
    order: i64,
    now: DateTime<Utc>,
) -> Result<NodeTaskRow, DbError> {
    let id = Uuid::new_v4();

    sqlx::query(
        r#"
        INSERT INTO node_tasks (id, node_id, task_id, task_order, status, retry_count, created_at)
        VALUES (?1, ?2, ?3, ?4, 'pending', 0, ?5)
        "#,
    )
    .bind(id)
    .bind(node_id)
    .bind(task_id)
    .bind(order)
    .bind(now)
    .execute(pool)
    .await?;

    get_node_task(pool, id).await
}

/// Fetch one live binding joined with its task.
pub async fn get_node_task(pool: &DbPool, id: Uuid) -> Result<NodeTaskRow, DbError> {
    let sql = format!("{NODE_TASK_SELECT} WHERE nt.id = ?1 AND nt.deleted_at IS NULL");

    let row = sqlx::query_as::<_, NodeTaskRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// All live bindings of a node whose task is live too, by ascending order.
pub async fn list_node_tasks(pool: &DbPool, node_id: Uuid) -> Result<Vec<NodeTaskRow>, DbError> {
    let sql = format!(
        "{NODE_TASK_SELECT} WHERE nt.node_id = ?1 AND nt.deleted_at IS NULL AND t.deleted_at IS NULL \
         ORDER BY nt.task_order ASC"
    );

    let rows = sqlx::query_as::<_, NodeTaskRow>(&sql)
        .bind(node_id)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Outcome of one dispatch attempt, as written back to `node_tasks`.
#[derive(Debug, Clone)]
pub struct TaskResultUpdate<'a> {
    pub status: &'a str,
    pub retry_count: i64,
    pub status_code: Option<i64>,
    pub response: Option<Value>,
    pub error_message: Option<&'a str>,
}

/// Record the result of a dispatch attempt on a binding.
pub async fn record_task_result(
    pool: &DbPool,
    node_task_id: Uuid,
    update: TaskResultUpdate<'_>,
    now: DateTime<Utc>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        r#"
        UPDATE node_tasks
        SET status = ?1, retry_count = ?2, status_code = ?3, response = ?4,
            error_message = ?5, updated_at = ?6
        WHERE id = ?7
        "#,
    )
    .bind(update.status)
    .bind(update.retry_count)
    .bind(update.status_code)
    .bind(update.response.map(Json))
    .bind(update.error_message)
    .bind(now)
    .bind(node_task_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}

/// Soft-delete a binding.
pub async fn detach_task(pool: &DbPool, node_task_id: Uuid, now: DateTime<Utc>) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE node_tasks SET deleted_at = ?1 WHERE id = ?2 AND deleted_at IS NULL",
    )
    .bind(now)
    .bind(node_task_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}
