//! Node CRUD operations.
//!
//! Creating a node also writes its reflexive closure row so the closure
//! table always has exactly one depth-0 entry per node.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{DbError, DbPool, models::NodeRow};

/// Insert a node and its `(id, id, 0)` closure row in one transaction.
pub async fn create_node(
    pool: &DbPool,
    title: &str,
    node_type: &str,
    description: Option<&str>,
    now: DateTime<Utc>,
) -> Result<NodeRow, DbError> {
    let id = Uuid::new_v4();
    let mut tx = pool.begin().await?;

    let row = sqlx::query_as::<_, NodeRow>(
        r#"
        INSERT INTO nodes (id, title, type, description, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        RETURNING id, title, type, description, created_at, updated_at, deleted_at
        "#,
    )
    .bind(id)
    .bind(title)
    .bind(node_type)
    .bind(description)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("INSERT INTO node_closure (ancestor, descendant, depth) VALUES (?1, ?1, 0)")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(row)
}

/// Fetch a live (not soft-deleted) node by its primary key.
pub async fn get_node(pool: &DbPool, id: Uuid) -> Result<NodeRow, DbError> {
    let row = sqlx::query_as::<_, NodeRow>(
        r#"
        SELECT id, title, type, description, created_at, updated_at, deleted_at
        FROM nodes
        WHERE id = ?1 AND deleted_at IS NULL
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Update the mutable metadata of a live node.
pub async fn update_node(
    pool: &DbPool,
    id: Uuid,
    title: &str,
    description: Option<&str>,
    now: DateTime<Utc>,
) -> Result<NodeRow, DbError> {
    let row = sqlx::query_as::<_, NodeRow>(
        r#"
        UPDATE nodes
        SET title = ?1, description = ?2, updated_at = ?3
        WHERE id = ?4 AND deleted_at IS NULL
        RETURNING id, title, type, description, created_at, updated_at, deleted_at
        "#,
    )
    .bind(title)
    .bind(description)
    .bind(now)
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Mark a node as deleted. Closure rows are kept so past executions stay
/// explainable.
///
/// Returns `DbError::NotFound` if no live row was updated.
pub async fn soft_delete_node(pool: &DbPool, id: Uuid, now: DateTime<Utc>) -> Result<(), DbError> {
    let result = sqlx::query("UPDATE nodes SET deleted_at = ?1 WHERE id = ?2 AND deleted_at IS NULL")
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support;

    #[tokio::test]
    async fn create_node_writes_reflexive_closure_row() {
        let pool = test_support::pool().await;
        let node = create_node(&pool, "Fetch", "Task", Some("fetch data"), Utc::now())
            .await
            .unwrap();

        let depth: i64 = sqlx::query_scalar(
            "SELECT depth FROM node_closure WHERE ancestor = ?1 AND descendant = ?1",
        )
        .bind(node.id)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(depth, 0);

        let fetched = get_node(&pool, node.id).await.unwrap();
        assert_eq!(fetched.title, "Fetch");
        assert_eq!(fetched.node_type, "Task");
        assert_eq!(fetched.description.as_deref(), Some("fetch data"));
    }

    #[tokio::test]
    async fn soft_deleted_node_is_not_found() {
        let pool = test_support::pool().await;
        let id = test_support::node(&pool, "gone", "Task").await;

        soft_delete_node(&pool, id, Utc::now()).await.unwrap();

        assert!(matches!(get_node(&pool, id).await, Err(DbError::NotFound)));
        assert!(matches!(soft_delete_node(&pool, id, Utc::now()).await, Err(DbError::NotFound)));
    }

    #[tokio::test]
    async fn update_node_sets_updated_at() {
        let pool = test_support::pool().await;
        let id = test_support::node(&pool, "old", "Task").await;

        let row = update_node(&pool, id, "new", None, Utc::now()).await.unwrap();
        assert_eq!(row.title, "new");
        assert!(row.updated_at.is_some());
    }
}
