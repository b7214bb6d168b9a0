use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use super::ApiResult;
use crate::AppState;
use engine::{ClosureEntry, Node};

#[derive(Deserialize)]
pub struct CreateNodeDto {
    pub title: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Deserialize)]
pub struct RelationshipDto {
    pub ancestor_id: Uuid,
    pub descendant_id: Uuid,
}

pub async fn create(
    State(state): State<AppState>,
    Json(payload): Json<CreateNodeDto>,
) -> ApiResult<(StatusCode, Json<Node>)> {
    let graph = state.executor.graph();
    let id = graph
        .create_node(&payload.title, &payload.node_type, payload.description.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(graph.get_node(id).await?)))
}

pub async fn get(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> ApiResult<Json<Node>> {
    Ok(Json(state.executor.graph().get_node(id).await?))
}

pub async fn descendants(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<Node>>> {
    let graph = state.executor.graph();
    graph.get_node(id).await?;
    Ok(Json(graph.get_descendants(id).await?))
}

/// Returns the ancestor's closure rows after the insertion.
pub async fn relate(
    State(state): State<AppState>,
    Json(payload): Json<RelationshipDto>,
) -> ApiResult<(StatusCode, Json<Vec<ClosureEntry>>)> {
    let graph = state.executor.graph();
    graph.add_relationship(payload.ancestor_id, payload.descendant_id).await?;
    Ok((StatusCode::CREATED, Json(graph.closure_entries(payload.ancestor_id).await?)))
}
