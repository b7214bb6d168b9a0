use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use super::ApiResult;
use crate::AppState;
use engine::{ExecutionLogEntry, Node, Workflow};

#[derive(Deserialize)]
pub struct CreateWorkflowDto {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Deserialize)]
pub struct StartingNodeDto {
    pub node_id: Uuid,
}

pub async fn create(
    State(state): State<AppState>,
    Json(payload): Json<CreateWorkflowDto>,
) -> ApiResult<(StatusCode, Json<Workflow>)> {
    let workflow = state
        .executor
        .workflows()
        .create_workflow(&payload.name, payload.description.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(workflow)))
}

pub async fn get(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> ApiResult<Json<Workflow>> {
    Ok(Json(state.executor.workflows().get_workflow(id).await?))
}

/// Returns every starting node of the workflow, in binding order.
pub async fn add_starting_node(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<StartingNodeDto>,
) -> ApiResult<(StatusCode, Json<Vec<Node>>)> {
    let workflows = state.executor.workflows();
    workflows.create_starting_node(id, payload.node_id).await?;
    Ok((StatusCode::CREATED, Json(workflows.starting_nodes(id).await?)))
}

pub async fn logs(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<ExecutionLogEntry>>> {
    state.executor.workflows().get_workflow(id).await?;
    Ok(Json(state.executor.log().entries_for_workflow(id).await?))
}
