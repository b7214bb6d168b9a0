//! Engine-level error types.

use thiserror::Error;
use uuid::Uuid;

/// Errors produced by the graph store and the workflow engine.
#[derive(Debug, Error)]
pub enum EngineError {
    // ------ Client errors ------

    /// Malformed input (empty title, unknown node type, duplicate binding, …).
    #[error("validation error: {0}")]
    Validation(String),

    /// The entity is absent or soft-deleted.
    #[error("{entity} '{id}' not found")]
    NotFound {
        entity: &'static str,
        id: String,
    },

    // ------ Graph errors ------

    /// A closure insertion or validation found a node reachable from itself.
    #[error("cycle detected at node '{0}'")]
    Cycle(Uuid),

    // ------ Execution errors ------

    /// Some predecessors of these nodes have not succeeded.
    #[error("dependencies not ready for {} node(s): {}", .0.len(), join_ids(.0))]
    DependencyNotReady(Vec<Uuid>),

    /// At least one task of the node failed; the run stops here.
    #[error("node '{node_id}' failed: {message}")]
    Dispatch {
        node_id: Uuid,
        message: String,
    },

    /// Another execution of the same workflow is in progress in this process.
    #[error("workflow '{0}' is already running")]
    AlreadyRunning(Uuid),

    /// The run was cancelled through its cancellation token.
    #[error("execution cancelled")]
    Cancelled,

    /// Persistence error from the db crate.
    #[error("database error: {0}")]
    Persistence(db::DbError),
}

fn join_ids(ids: &[Uuid]) -> String {
    ids.iter().map(Uuid::to_string).collect::<Vec<_>>().join(", ")
}

impl EngineError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound { entity, id: id.to_string() }
    }

    /// `Validation` and `NotFound` are caused by the caller's input; every
    /// other kind is a server-side failure.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::NotFound { .. })
    }
}

impl From<db::DbError> for EngineError {
    fn from(err: db::DbError) -> Self {
        match err {
            db::DbError::Cycle { ancestor, .. } => Self::Cycle(ancestor),
            other => Self::Persistence(other),
        }
    }
}

/// Map `DbError::NotFound` to a typed `NotFound`, everything else through `From`.
pub(crate) fn or_not_found(entity: &'static str, id: impl ToString) -> impl FnOnce(db::DbError) -> EngineError {
    move |err| match err {
        db::DbError::NotFound => EngineError::not_found(entity, id),
        other => other.into(),
    }
}
