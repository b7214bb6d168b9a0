//! `api` crate: HTTP REST API layer.
//!
//! Exposes:
//!   POST   /api/v1/nodes
//!   GET    /api/v1/nodes/:id
//!   GET    /api/v1/nodes/:id/descendants
//!   POST   /api/v1/nodes/:id/rollback
//!   POST   /api/v1/nodes/:id/tasks
//!   POST   /api/v1/relationships
//!   POST   /api/v1/tasks
//!   POST   /api/v1/workflows
//!   GET    /api/v1/workflows/:id
//!   POST   /api/v1/workflows/:id/starting-nodes
//!   POST   /api/v1/workflows/:id/execute
//!   POST   /api/v1/workflows/:id/nodes/:node_id/execute
//!   GET    /api/v1/workflows/:id/logs

pub mod error;
pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

use engine::WorkflowExecutor;
use handlers::{executions, nodes, tasks, workflows};

pub use error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub executor: Arc<WorkflowExecutor>,
    /// Cancelled on shutdown; every run gets a child token.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(executor: Arc<WorkflowExecutor>) -> Self {
        Self { executor, shutdown: CancellationToken::new() }
    }
}

pub fn router(state: AppState) -> Router {
    let v1 = Router::new()
        .route("/nodes", post(nodes::create))
        .route("/nodes/:id", get(nodes::get))
        .route("/nodes/:id/descendants", get(nodes::descendants))
        .route("/nodes/:id/rollback", post(executions::rollback_node))
        .route("/nodes/:id/tasks", post(tasks::attach))
        .route("/relationships", post(nodes::relate))
        .route("/tasks", post(tasks::create))
        .route("/workflows", post(workflows::create))
        .route("/workflows/:id", get(workflows::get))
        .route("/workflows/:id/starting-nodes", post(workflows::add_starting_node))
        .route("/workflows/:id/execute", post(executions::execute_workflow))
        .route("/workflows/:id/nodes/:node_id/execute", post(executions::execute_node))
        .route("/workflows/:id/logs", get(workflows::logs));

    Router::new()
        .nest("/api/v1", v1)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Bind `addr` and serve until ctrl-c; in-flight runs are cancelled on the
/// way out.
pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let shutdown = state.shutdown.clone();
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "dagflow api listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown requested");
            }
            shutdown.cancel();
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use actions::mock::MockExecutor;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use engine::ExecutorConfig;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;

    async fn app(mock: MockExecutor) -> Router {
        let pool = db::pool::create_in_memory_pool().await.expect("pool");
        let config = ExecutorConfig {
            max_retries: 0,
            retry_base_delay: Duration::from_millis(1),
            task_timeout: None,
        };
        let executor = Arc::new(WorkflowExecutor::new(pool, Arc::new(mock), config));
        router(AppState::new(executor))
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(b) => Body::from(b.to_string()),
                None => Body::empty(),
            })
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }

    async fn create_node(app: &Router, title: &str, node_type: &str) -> String {
        let (status, body) = call(app, "POST", "/api/v1/nodes", Some(json!({ "title": title, "type": node_type }))).await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_str().unwrap().to_string()
    }

    async fn relate(app: &Router, a: &str, d: &str) -> StatusCode {
        call(
            app,
            "POST",
            "/api/v1/relationships",
            Some(json!({ "ancestor_id": a, "descendant_id": d })),
        )
        .await
        .0
    }

    #[tokio::test]
    async fn build_and_run_a_workflow_over_http() {
        let mock = MockExecutor::new();
        let app = app(mock.clone()).await;

        let start = create_node(&app, "start", "Start").await;
        let a = create_node(&app, "A", "Task").await;
        let end = create_node(&app, "end", "End").await;
        assert_eq!(relate(&app, &start, &a).await, StatusCode::CREATED);
        assert_eq!(relate(&app, &a, &end).await, StatusCode::CREATED);

        let (status, task) = call(
            &app,
            "POST",
            "/api/v1/tasks",
            Some(json!({ "title": "notify", "method": "POST", "action": "http://svc/notify", "params": { "to": "ops" } })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(task["task_type"], "http");

        let (status, _) = call(
            &app,
            "POST",
            &format!("/api/v1/nodes/{a}/tasks"),
            Some(json!({ "task_id": task["id"], "order": 1 })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, wf) = call(&app, "POST", "/api/v1/workflows", Some(json!({ "name": "notify ops" }))).await;
        let wf_id = wf["id"].as_str().unwrap().to_string();
        let (status, starts) = call(
            &app,
            "POST",
            &format!("/api/v1/workflows/{wf_id}/starting-nodes"),
            Some(json!({ "node_id": start })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(starts.as_array().unwrap().len(), 1);

        let (status, descendants) = call(&app, "GET", &format!("/api/v1/nodes/{start}/descendants"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(descendants.as_array().unwrap().len(), 3);

        let (status, report) = call(&app, "POST", &format!("/api/v1/workflows/{wf_id}/execute"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["status"], "completed");
        assert_eq!(report["executed"].as_array().unwrap().len(), 3);
        assert_eq!(mock.calls_for("http://svc/notify"), 1);

        let (_, logs) = call(&app, "GET", &format!("/api/v1/workflows/{wf_id}/logs"), None).await;
        assert_eq!(logs.as_array().unwrap().len(), 3);

        let (status, entry) = call(&app, "POST", &format!("/api/v1/nodes/{a}/rollback"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(entry["status"], "rollback");

        let (status, body) = call(
            &app,
            "POST",
            &format!("/api/v1/workflows/{wf_id}/nodes/{end}/execute"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"].as_str().unwrap().contains("dependencies not ready"));
    }

    #[tokio::test]
    async fn client_errors_use_their_status_codes() {
        let app = app(MockExecutor::new()).await;

        let (status, body) = call(&app, "POST", "/api/v1/nodes", Some(json!({ "title": "", "type": "Task" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let (status, _) = call(&app, "GET", &format!("/api/v1/nodes/{}", uuid::Uuid::new_v4()), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let a = create_node(&app, "a", "Task").await;
        let b = create_node(&app, "b", "Task").await;
        assert_eq!(relate(&app, &a, &b).await, StatusCode::CREATED);
        assert_eq!(relate(&app, &b, &a).await, StatusCode::CONFLICT);
        assert_eq!(relate(&app, &a, &a).await, StatusCode::CONFLICT);
    }
}
