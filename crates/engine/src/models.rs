//! Core domain models for the workflow engine.
//!
//! Rows from the `db` crate are converted into these types at the store
//! boundary; string columns become closed enums here, so an unknown value in
//! the database surfaces as an error instead of leaking through.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use actions::HttpMethod;
use db::models::{ClosureRow, NodeRow, NodeTaskRow, TaskRow, WorkflowLogRow, WorkflowRow};

use crate::EngineError;

// ---------------------------------------------------------------------------
// NodeType
// ---------------------------------------------------------------------------

/// Role of a node in the workflow topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    Start,
    Task,
    /// Terminal sentinel; never gates its descendants.
    End,
}

impl NodeType {
    /// Whether a node of this type must have succeeded before its children run.
    pub fn gates_descendants(self) -> bool {
        match self {
            Self::Start | Self::Task => true,
            Self::End => false,
        }
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Start => write!(f, "Start"),
            Self::Task  => write!(f, "Task"),
            Self::End   => write!(f, "End"),
        }
    }
}

impl std::str::FromStr for NodeType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" => Ok(Self::Start),
            "task"  => Ok(Self::Task),
            "end"   => Ok(Self::End),
            other   => Err(format!("unknown node type: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Node / ClosureEntry
// ---------------------------------------------------------------------------

/// A unit of workflow topology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: Uuid,
    pub title: String,
    pub node_type: NodeType,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<NodeRow> for Node {
    type Error = EngineError;

    fn try_from(row: NodeRow) -> Result<Self, Self::Error> {
        let node_type = row.node_type.parse().map_err(EngineError::Validation)?;
        Ok(Self {
            id: row.id,
            title: row.title,
            node_type,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        })
    }
}

pub(crate) fn nodes_from_rows(rows: Vec<NodeRow>) -> Result<Vec<Node>, EngineError> {
    rows.into_iter().map(Node::try_from).collect()
}

/// One `(ancestor, descendant, depth)` pair of the closure relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosureEntry {
    pub ancestor: Uuid,
    pub descendant: Uuid,
    pub depth: u32,
}

impl TryFrom<ClosureRow> for ClosureEntry {
    type Error = EngineError;

    fn try_from(row: ClosureRow) -> Result<Self, Self::Error> {
        let depth = u32::try_from(row.depth)
            .map_err(|_| EngineError::Validation(format!("invalid closure depth: {}", row.depth)))?;
        Ok(Self {
            ancestor: row.ancestor,
            descendant: row.descendant,
            depth,
        })
    }
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

/// Lifecycle of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending   => write!(f, "pending"),
            Self::Running   => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed    => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for WorkflowStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending"   => Ok(Self::Pending),
            "running"   => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed"    => Ok(Self::Failed),
            other       => Err(format!("unknown workflow status: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub status: WorkflowStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl TryFrom<WorkflowRow> for Workflow {
    type Error = EngineError;

    fn try_from(row: WorkflowRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            name: row.name,
            description: row.description,
            status: row.status.parse().map_err(EngineError::Validation)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// ---------------------------------------------------------------------------
// Task / NodeTask
// ---------------------------------------------------------------------------

/// A reusable action definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub task_type: String,
    pub method: HttpMethod,
    pub action: String,
    pub params: Value,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<TaskRow> for Task {
    type Error = EngineError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            title: row.title,
            task_type: row.task_type,
            method: row.method.parse().map_err(EngineError::Validation)?,
            action: row.action,
            params: row.params.0,
            created_at: row.created_at,
        })
    }
}

/// Input for [`TaskCatalog::create_task`](crate::tasks::TaskCatalog::create_task).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(rename = "type", default = "default_task_type")]
    pub task_type: String,
    pub method: HttpMethod,
    pub action: String,
    #[serde(default)]
    pub params: Value,
}

fn default_task_type() -> String {
    "http".to_string()
}

/// Outcome status of a task binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Success,
    Failed,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Success => write!(f, "success"),
            Self::Failed  => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "success" => Ok(Self::Success),
            "failed"  => Ok(Self::Failed),
            other     => Err(format!("unknown task status: {other}")),
        }
    }
}

/// A task attached to a node, with the result of its last dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeTask {
    pub id: Uuid,
    pub node_id: Uuid,
    pub order: i64,
    pub status: TaskStatus,
    pub retry_count: u32,
    pub status_code: Option<u16>,
    pub response: Option<Value>,
    pub error_message: Option<String>,
    pub task: Task,
}

impl TryFrom<NodeTaskRow> for NodeTask {
    type Error = EngineError;

    fn try_from(row: NodeTaskRow) -> Result<Self, Self::Error> {
        let task = Task {
            id: row.task_id,
            title: row.task_title,
            task_type: row.task_type,
            method: row.method.parse().map_err(EngineError::Validation)?,
            action: row.action,
            params: row.params.0,
            created_at: row.task_created_at,
        };
        Ok(Self {
            id: row.id,
            node_id: row.node_id,
            order: row.task_order,
            status: row.status.parse().map_err(EngineError::Validation)?,
            retry_count: u32::try_from(row.retry_count)
                .map_err(|_| EngineError::Validation(format!("invalid retry count: {}", row.retry_count)))?,
            status_code: row
                .status_code
                .map(|c| u16::try_from(c).map_err(|_| EngineError::Validation(format!("invalid status code: {c}"))))
                .transpose()?,
            response: row.response.map(|j| j.0),
            error_message: row.error_message,
            task,
        })
    }
}

// ---------------------------------------------------------------------------
// Execution log
// ---------------------------------------------------------------------------

/// Status recorded in an execution log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStatus {
    Success,
    Failed,
    Rollback,
}

impl std::fmt::Display for LogStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success  => write!(f, "success"),
            Self::Failed   => write!(f, "failed"),
            Self::Rollback => write!(f, "rollback"),
        }
    }
}

impl std::str::FromStr for LogStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success"  => Ok(Self::Success),
            "failed"   => Ok(Self::Failed),
            "rollback" => Ok(Self::Rollback),
            other      => Err(format!("unknown log status: {other}")),
        }
    }
}

/// One append-only record of a node execution attempt or rollback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    pub id: i64,
    pub workflow_id: Option<Uuid>,
    pub node_id: Uuid,
    pub status: LogStatus,
    pub message: String,
    pub executed_at: DateTime<Utc>,
}

impl TryFrom<WorkflowLogRow> for ExecutionLogEntry {
    type Error = EngineError;

    fn try_from(row: WorkflowLogRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            workflow_id: row.workflow_id,
            node_id: row.node_id,
            status: row.status.parse().map_err(EngineError::Validation)?,
            message: row.message,
            executed_at: row.executed_at,
        })
    }
}
