//! Closure-table operations.
//!
//! `node_closure` stores every `(ancestor, descendant, depth)` pair implied
//! by the graph's edges. Reads never traverse the graph; they filter this
//! table. Writes happen only through [`add_relationship`].

use uuid::Uuid;

use crate::{
    DbError, DbPool,
    models::{ClosureRow, NodeRow},
};

/// Link `ancestor → descendant` and extend the closure, atomically.
///
/// Inside one transaction:
/// 1. both nodes must be live (`DbError::NotFound` otherwise);
/// 2. the link is rejected with `DbError::Cycle` when `ancestor` is already
///    reachable from `descendant` (including `ancestor == descendant`);
/// 3. every ancestor `p` of `ancestor` is connected to every descendant `c`
///    of `descendant` at depth `d(p, ancestor) + 1 + d(descendant, c)`,
///    keeping the shorter depth when the pair already exists.
///
/// A rejected link leaves the table untouched.
pub async fn add_relationship(
    pool: &DbPool,
    ancestor: Uuid,
    descendant: Uuid,
) -> Result<u64, DbError> {
    let mut tx = pool.begin().await?;

    let live: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM nodes WHERE id IN (?1, ?2) AND deleted_at IS NULL",
    )
    .bind(ancestor)
    .bind(descendant)
    .fetch_one(&mut *tx)
    .await?;

    let expected = if ancestor == descendant { 1 } else { 2 };
    if live != expected {
        return Err(DbError::NotFound);
    }

    let back_path: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM node_closure WHERE ancestor = ?1 AND descendant = ?2",
    )
    .bind(descendant)
    .bind(ancestor)
    .fetch_one(&mut *tx)
    .await?;

    if back_path > 0 || ancestor == descendant {
        tx.rollback().await?;
        return Err(DbError::Cycle { ancestor, descendant });
    }

    // Nodes created before their reflexive row existed still need one for
    // the cross join below.
    sqlx::query(
        "INSERT OR IGNORE INTO node_closure (ancestor, descendant, depth) VALUES (?1, ?1, 0), (?2, ?2, 0)",
    )
    .bind(ancestor)
    .bind(descendant)
    .execute(&mut *tx)
    .await?;

    let result = sqlx::query(
        r#"
        INSERT INTO node_closure (ancestor, descendant, depth)
        SELECT up.ancestor, down.descendant, up.depth + down.depth + 1
        FROM node_closure AS up, node_closure AS down
        WHERE up.descendant = ?1 AND down.ancestor = ?2
        ON CONFLICT (ancestor, descendant)
        DO UPDATE SET depth = MIN(node_closure.depth, excluded.depth)
        "#,
    )
    .bind(ancestor)
    .bind(descendant)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(result.rows_affected())
}

/// All live descendants of `ancestor`, the node itself included, ordered by
/// depth and then by node creation order.
pub async fn get_descendants(pool: &DbPool, ancestor: Uuid) -> Result<Vec<NodeRow>, DbError> {
    let rows = sqlx::query_as::<_, NodeRow>(
        r#"
        SELECT n.id, n.title, n.type, n.description, n.created_at, n.updated_at, n.deleted_at
        FROM node_closure nc
        JOIN nodes n ON nc.descendant = n.id
        WHERE nc.ancestor = ?1 AND n.deleted_at IS NULL
        ORDER BY nc.depth ASC, n.rowid ASC
        "#,
    )
    .bind(ancestor)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Live nodes with a depth-1 entry towards `node` (its direct parents), in
/// creation order.
pub async fn get_immediate_ancestors(pool: &DbPool, node: Uuid) -> Result<Vec<NodeRow>, DbError> {
    let rows = sqlx::query_as::<_, NodeRow>(
        r#"
        SELECT n.id, n.title, n.type, n.description, n.created_at, n.updated_at, n.deleted_at
        FROM node_closure nc
        JOIN nodes n ON nc.ancestor = n.id
        WHERE nc.descendant = ?1 AND nc.depth = 1 AND n.deleted_at IS NULL
        ORDER BY n.rowid ASC
        "#,
    )
    .bind(node)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Every closure row where `ancestor` is the ancestor, shallowest first.
pub async fn entries_from(pool: &DbPool, ancestor: Uuid) -> Result<Vec<ClosureRow>, DbError> {
    let rows = sqlx::query_as::<_, ClosureRow>(
        r#"
        SELECT nc.ancestor, nc.descendant, nc.depth
        FROM node_closure nc
        JOIN nodes n ON nc.descendant = n.id
        WHERE nc.ancestor = ?1
        ORDER BY nc.depth ASC, n.rowid ASC
        "#,
    )
    .bind(ancestor)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Integrity check used by acyclicity validation.
///
/// Returns `(reflexive rows of node, reflexive rows with depth > 0 among the
/// node and its descendants)`. A healthy node yields `(1, 0)`.
pub async fn self_reachability(pool: &DbPool, node: Uuid) -> Result<(i64, i64), DbError> {
    let row: (i64, i64) = sqlx::query_as(
        r#"
        SELECT
            (SELECT COUNT(*) FROM node_closure
             WHERE ancestor = descendant AND ancestor = ?1),
            (SELECT COUNT(*) FROM node_closure sc
             WHERE sc.ancestor = sc.descendant AND sc.depth > 0
               AND sc.ancestor IN (SELECT descendant FROM node_closure WHERE ancestor = ?1))
        "#,
    )
    .bind(node)
    .fetch_one(pool)
    .await?;

    Ok(row)
}
