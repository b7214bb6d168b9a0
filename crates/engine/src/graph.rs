//! Graph Store: node identity and the closure-table relation.
//!
//! All writes to the closure table go through
//! [`db::repository::closure::add_relationship`]; this type adds input
//! validation and maps persistence errors onto [`EngineError`] kinds.

use chrono::Utc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use db::repository::{closure, nodes};
use db::DbPool;

use crate::error::or_not_found;
use crate::models::{nodes_from_rows, ClosureEntry, Node, NodeType};
use crate::EngineError;

#[derive(Clone)]
pub struct GraphStore {
    pool: DbPool,
}

fn require_title(title: &str) -> Result<&str, EngineError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(EngineError::Validation("node title must not be empty".into()));
    }
    Ok(title)
}

impl GraphStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create a node and return its id.
    ///
    /// # Errors
    /// [`EngineError::Validation`] if `title` or `node_type` is empty, or the
    /// type is not one of `Start`, `Task`, `End`.
    #[instrument(skip(self, description))]
    pub async fn create_node(
        &self,
        title: &str,
        node_type: &str,
        description: Option<&str>,
    ) -> Result<Uuid, EngineError> {
        let title = require_title(title)?;
        if node_type.trim().is_empty() {
            return Err(EngineError::Validation("node type must not be empty".into()));
        }
        let node_type: NodeType = node_type.parse().map_err(EngineError::Validation)?;

        let row = nodes::create_node(
            &self.pool,
            title,
            &node_type.to_string(),
            description,
            Utc::now(),
        )
        .await?;

        info!(node_id = %row.id, "node created");
        Ok(row.id)
    }

    /// Fetch a live node.
    pub async fn get_node(&self, id: Uuid) -> Result<Node, EngineError> {
        let row = nodes::get_node(&self.pool, id)
            .await
            .map_err(or_not_found("node", id))?;
        Node::try_from(row)
    }

    /// Replace the title and description of a node.
    pub async fn update_node(
        &self,
        id: Uuid,
        title: &str,
        description: Option<&str>,
    ) -> Result<Node, EngineError> {
        let title = require_title(title)?;
        let row = nodes::update_node(&self.pool, id, title, description, Utc::now())
            .await
            .map_err(or_not_found("node", id))?;
        Node::try_from(row)
    }

    /// Hide a node from traversal and lookup. Its closure rows stay.
    pub async fn soft_delete_node(&self, id: Uuid) -> Result<(), EngineError> {
        nodes::soft_delete_node(&self.pool, id, Utc::now())
            .await
            .map_err(or_not_found("node", id))?;
        info!(node_id = %id, "node soft-deleted");
        Ok(())
    }

    /// Add the edge `ancestor → descendant` and extend the closure atomically.
    ///
    /// # Errors
    /// - [`EngineError::NotFound`] if either node is missing.
    /// - [`EngineError::Cycle`] if `ancestor` is already reachable from
    ///   `descendant`; the closure table is left unchanged.
    #[instrument(skip(self))]
    pub async fn add_relationship(&self, ancestor: Uuid, descendant: Uuid) -> Result<(), EngineError> {
        match closure::add_relationship(&self.pool, ancestor, descendant).await {
            Ok(written) => {
                debug!("closure extended by {written} row(s)");
                Ok(())
            }
            Err(db::DbError::NotFound) => {
                let missing = if nodes::get_node(&self.pool, ancestor).await.is_err() {
                    ancestor
                } else {
                    descendant
                };
                Err(EngineError::not_found("node", missing))
            }
            Err(db::DbError::Cycle { .. }) => {
                warn!("rejected relationship: would create a cycle");
                Err(EngineError::Cycle(descendant))
            }
            Err(other) => Err(other.into()),
        }
    }

    /// Every live node reachable from `ancestor`, itself included, shallowest
    /// first.
    pub async fn get_descendants(&self, ancestor: Uuid) -> Result<Vec<Node>, EngineError> {
        let rows = closure::get_descendants(&self.pool, ancestor).await?;
        nodes_from_rows(rows)
    }

    /// Direct parents of `node`.
    pub async fn get_immediate_ancestors(&self, node: Uuid) -> Result<Vec<Node>, EngineError> {
        let rows = closure::get_immediate_ancestors(&self.pool, node).await?;
        nodes_from_rows(rows)
    }

    /// The earliest-created direct parent of `node`, if any.
    pub async fn get_immediate_ancestor(&self, node: Uuid) -> Result<Option<Node>, EngineError> {
        Ok(self.get_immediate_ancestors(node).await?.into_iter().next())
    }

    /// Closure rows starting at `node`.
    pub async fn closure_entries(&self, node: Uuid) -> Result<Vec<ClosureEntry>, EngineError> {
        let rows = closure::entries_from(&self.pool, node).await?;
        rows.into_iter().map(ClosureEntry::try_from).collect()
    }

    /// Check that neither `node` nor anything below it is reachable from
    /// itself.
    ///
    /// # Errors
    /// [`EngineError::Cycle`] when `node` has more than one reflexive entry,
    /// or any reflexive entry with a non-zero depth exists in its subgraph.
    pub async fn validate_acyclic(&self, node: Uuid) -> Result<(), EngineError> {
        let (reflexive, looped) = closure::self_reachability(&self.pool, node).await?;
        if reflexive > 1 || looped > 0 {
            warn!(node_id = %node, reflexive, looped, "cycle detected in closure table");
            return Err(EngineError::Cycle(node));
        }
        Ok(())
    }
}
