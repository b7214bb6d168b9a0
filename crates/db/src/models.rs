//! Row structs that map 1-to-1 onto database tables.
//!
//! These are *persistence* models: they carry no domain behaviour.
//! Domain types live in the `engine` crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// nodes
// ---------------------------------------------------------------------------

/// A persisted graph node row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NodeRow {
    pub id: Uuid,
    pub title: String,
    /// `Start`, `Task` or `End`.
    #[sqlx(rename = "type")]
    pub node_type: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// node_closure
// ---------------------------------------------------------------------------

/// One (ancestor, descendant, depth) pair of the closure table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ClosureRow {
    pub ancestor: Uuid,
    pub descendant: Uuid,
    pub depth: i64,
}

// ---------------------------------------------------------------------------
// workflows
// ---------------------------------------------------------------------------

/// A persisted workflow row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkflowRow {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// A workflow → starting node binding.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StartingNodeRow {
    pub id: i64,
    pub workflow_id: Uuid,
    pub node_id: Uuid,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// tasks / node_tasks
// ---------------------------------------------------------------------------

/// A reusable task definition row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TaskRow {
    pub id: Uuid,
    pub title: String,
    #[sqlx(rename = "type")]
    pub task_type: String,
    pub method: String,
    pub action: String,
    pub params: Json<Value>,
    pub created_at: DateTime<Utc>,
}

/// A node ↔ task binding joined with the task definition it points at.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NodeTaskRow {
    pub id: Uuid,
    pub node_id: Uuid,
    pub task_id: Uuid,
    pub task_order: i64,
    pub status: String,
    pub retry_count: i64,
    pub status_code: Option<i64>,
    pub response: Option<Json<Value>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    // Joined from `tasks`.
    pub task_title: String,
    pub task_type: String,
    pub method: String,
    pub action: String,
    pub params: Json<Value>,
    pub task_created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// workflow_logs
// ---------------------------------------------------------------------------

/// One append-only execution log entry.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkflowLogRow {
    pub id: i64,
    pub workflow_id: Option<Uuid>,
    pub node_id: Uuid,
    pub status: String,
    pub message: String,
    pub executed_at: DateTime<Utc>,
}

/// A live ancestor of some node, with the ancestor's most recent log entry.
#[derive(Debug, Clone, FromRow)]
pub struct AncestorStateRow {
    #[sqlx(flatten)]
    pub node: NodeRow,
    pub depth: i64,
    pub latest_log_id: Option<i64>,
    pub latest_status: Option<String>,
}
