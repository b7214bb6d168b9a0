//! Dependency Resolver: decides whether a node may run, from the closure
//! table and the execution log.
//!
//! Every ancestor gates its descendants, not only direct parents: rolling a
//! node back re-gates its whole subtree. `End` nodes never gate.
//!
//! The check is advisory: it never waits. The engine decides whether a
//! not-ready node is deferred, reported, or rejected.

use tracing::debug;
use uuid::Uuid;

use db::models::AncestorStateRow;
use db::repository::logs;
use db::DbPool;

use crate::models::{nodes_from_rows, LogStatus, Node};
use crate::EngineError;

/// A gating ancestor and its most recent log entry.
#[derive(Debug, Clone)]
struct AncestorState {
    node: Node,
    latest_log_id: Option<i64>,
    latest_status: Option<LogStatus>,
}

impl TryFrom<AncestorStateRow> for AncestorState {
    type Error = EngineError;

    fn try_from(row: AncestorStateRow) -> Result<Self, Self::Error> {
        Ok(Self {
            node: Node::try_from(row.node)?,
            latest_log_id: row.latest_log_id,
            latest_status: row
                .latest_status
                .map(|s| s.parse().map_err(EngineError::Validation))
                .transpose()?,
        })
    }
}

#[derive(Clone)]
pub struct DependencyResolver {
    pool: DbPool,
}

impl DependencyResolver {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn gating_ancestors(&self, node_id: Uuid) -> Result<Vec<AncestorState>, EngineError> {
        let mut gating = Vec::new();
        for row in logs::ancestor_states(&self.pool, node_id).await? {
            let state = AncestorState::try_from(row)?;
            if state.node.node_type.gates_descendants() {
                gating.push(state);
            }
        }
        Ok(gating)
    }

    /// True iff every live ancestor of `node_id` that is not an `End` node
    /// has `success` as its most recent log status. Roots are ready.
    pub async fn all_parents_completed(&self, node_id: Uuid) -> Result<bool, EngineError> {
        let ancestors = self.gating_ancestors(node_id).await?;
        let pending = ancestors
            .iter()
            .filter(|a| a.latest_status != Some(LogStatus::Success))
            .count();
        debug!(node_id = %node_id, ancestors = ancestors.len(), pending, "dependency check");
        Ok(pending == 0)
    }

    /// Like [`all_parents_completed`](Self::all_parents_completed) but as an
    /// error.
    ///
    /// # Errors
    /// [`EngineError::DependencyNotReady`] when an ancestor has not succeeded.
    pub async fn ensure_ready(&self, node_id: Uuid) -> Result<(), EngineError> {
        if self.all_parents_completed(node_id).await? {
            Ok(())
        } else {
            Err(EngineError::DependencyNotReady(vec![node_id]))
        }
    }

    /// Whether the node's latest entry is `success` and no gating ancestor
    /// has been logged since. A success that predates an ancestor's rerun or
    /// rollback is stale.
    pub async fn has_current_success(&self, node_id: Uuid) -> Result<bool, EngineError> {
        let latest = match logs::latest_for_node(&self.pool, node_id).await? {
            Some(row) if row.status == LogStatus::Success.to_string() => row.id,
            _ => return Ok(false),
        };

        let stale = self
            .gating_ancestors(node_id)
            .await?
            .iter()
            .any(|a| a.latest_log_id.is_some_and(|id| id > latest));
        Ok(!stale)
    }

    /// Nodes that succeeded at or before the most recent entry of `current`,
    /// most recent first. Empty when `current` never ran.
    pub async fn get_executed_nodes(&self, current: Uuid) -> Result<Vec<Node>, EngineError> {
        let rows = logs::executed_before(&self.pool, current).await?;
        nodes_from_rows(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphStore;
    use crate::log::ExecutionLog;
    use crate::models::LogStatus;
    use db::pool::create_in_memory_pool;

    struct Fixture {
        graph: GraphStore,
        log: ExecutionLog,
        resolver: DependencyResolver,
    }

    async fn fixture() -> Fixture {
        let pool = create_in_memory_pool().await.expect("pool");
        Fixture {
            graph: GraphStore::new(pool.clone()),
            log: ExecutionLog::new(pool.clone()),
            resolver: DependencyResolver::new(pool),
        }
    }

    #[tokio::test]
    async fn readiness_follows_parent_log_state() {
        let f = fixture().await;
        let parent = f.graph.create_node("parent", "Task", None).await.unwrap();
        let child = f.graph.create_node("child", "Task", None).await.unwrap();

        // No ancestors: trivially ready.
        assert!(f.resolver.all_parents_completed(child).await.unwrap());

        f.graph.add_relationship(parent, child).await.unwrap();
        assert!(!f.resolver.all_parents_completed(child).await.unwrap());
        assert!(matches!(
            f.resolver.ensure_ready(child).await,
            Err(EngineError::DependencyNotReady(ids)) if ids == vec![child]
        ));

        f.log.append(None, parent, LogStatus::Success, "ok").await.unwrap();
        assert!(f.resolver.all_parents_completed(child).await.unwrap());

        f.log.append(None, parent, LogStatus::Rollback, "undo").await.unwrap();
        assert!(!f.resolver.all_parents_completed(child).await.unwrap());
    }

    #[tokio::test]
    async fn end_parent_does_not_gate() {
        let f = fixture().await;
        let end = f.graph.create_node("end", "End", None).await.unwrap();
        let after = f.graph.create_node("after", "Task", None).await.unwrap();
        f.graph.add_relationship(end, after).await.unwrap();

        assert!(f.resolver.all_parents_completed(after).await.unwrap());
    }

    #[tokio::test]
    async fn rollback_regates_every_descendant() {
        let f = fixture().await;
        let a = f.graph.create_node("a", "Start", None).await.unwrap();
        let b = f.graph.create_node("b", "Task", None).await.unwrap();
        let c = f.graph.create_node("c", "Task", None).await.unwrap();
        f.graph.add_relationship(a, b).await.unwrap();
        f.graph.add_relationship(b, c).await.unwrap();

        f.log.append(None, a, LogStatus::Success, "ok").await.unwrap();
        f.log.append(None, b, LogStatus::Success, "ok").await.unwrap();
        f.log.append(None, c, LogStatus::Success, "ok").await.unwrap();
        assert!(f.resolver.all_parents_completed(c).await.unwrap());
        assert!(f.resolver.has_current_success(c).await.unwrap());

        f.log.append(None, a, LogStatus::Rollback, "undo").await.unwrap();
        assert!(!f.resolver.all_parents_completed(b).await.unwrap());
        assert!(!f.resolver.all_parents_completed(c).await.unwrap());

        // Rerunning `a` makes the success entries below it stale.
        f.log.append(None, a, LogStatus::Success, "again").await.unwrap();
        assert!(f.resolver.all_parents_completed(c).await.unwrap());
        assert!(!f.resolver.has_current_success(b).await.unwrap());
        assert!(!f.resolver.has_current_success(c).await.unwrap());
        assert!(f.resolver.has_current_success(a).await.unwrap());
    }

    #[tokio::test]
    async fn failed_parent_keeps_child_gated() {
        let f = fixture().await;
        let parent = f.graph.create_node("parent", "Start", None).await.unwrap();
        let child = f.graph.create_node("child", "Task", None).await.unwrap();
        f.graph.add_relationship(parent, child).await.unwrap();

        f.log.append(None, parent, LogStatus::Failed, "boom").await.unwrap();
        assert!(!f.resolver.all_parents_completed(child).await.unwrap());
    }

    #[tokio::test]
    async fn executed_nodes_are_listed_newest_first() {
        let f = fixture().await;
        let a = f.graph.create_node("a", "Start", None).await.unwrap();
        let b = f.graph.create_node("b", "Task", None).await.unwrap();
        let c = f.graph.create_node("c", "Task", None).await.unwrap();

        f.log.append(None, a, LogStatus::Success, "ok").await.unwrap();
        f.log.append(None, b, LogStatus::Failed, "boom").await.unwrap();
        f.log.append(None, c, LogStatus::Success, "ok").await.unwrap();

        let ids: Vec<Uuid> = f.resolver.get_executed_nodes(c).await.unwrap().iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![c, a]);

        let before_b: Vec<Uuid> = f.resolver.get_executed_nodes(b).await.unwrap().iter().map(|n| n.id).collect();
        assert_eq!(before_b, vec![a]);
    }
}
