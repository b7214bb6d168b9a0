use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use super::ApiResult;
use crate::AppState;
use engine::{NewTask, NodeTask, Task};

#[derive(Deserialize)]
pub struct AttachTaskDto {
    pub task_id: Uuid,
    pub order: i64,
}

pub async fn create(
    State(state): State<AppState>,
    Json(payload): Json<NewTask>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    let task = state.executor.tasks().create_task(payload).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn attach(
    Path(node_id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<AttachTaskDto>,
) -> ApiResult<(StatusCode, Json<NodeTask>)> {
    let binding = state
        .executor
        .tasks()
        .attach_task(node_id, payload.task_id, payload.order)
        .await?;
    Ok((StatusCode::CREATED, Json(binding)))
}
