//! Execution endpoints. Runs are synchronous: the response carries the
//! outcome.

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use super::ApiResult;
use crate::AppState;
use engine::{ExecutionLogEntry, ExecutionReport};

pub async fn execute_workflow(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> ApiResult<Json<ExecutionReport>> {
    // Server shutdown cancels in-flight runs.
    let cancel = state.shutdown.child_token();
    Ok(Json(state.executor.execute_workflow(id, &cancel).await?))
}

pub async fn execute_node(
    Path((workflow_id, node_id)): Path<(Uuid, Uuid)>,
    State(state): State<AppState>,
) -> ApiResult<Json<ExecutionLogEntry>> {
    Ok(Json(state.executor.execute_node(workflow_id, node_id).await?))
}

pub async fn rollback_node(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> ApiResult<Json<ExecutionLogEntry>> {
    Ok(Json(state.executor.rollback_node(id).await?))
}
