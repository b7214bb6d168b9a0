//! `HttpActionExecutor`: invokes task actions as HTTP requests.
//!
//! The action identifier is the target URL. For `POST`/`PUT`/`PATCH` the
//! parameter payload is sent as a JSON body; for `GET`/`DELETE` a top-level
//! object is flattened into the query string.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::{ActionError, ActionExecutor, ActionRequest, ActionResponse, HttpMethod};

#[derive(Debug, Clone)]
pub struct HttpActionExecutor {
    client: reqwest::Client,
}

impl HttpActionExecutor {
    pub fn new() -> Self {
        Self { client: reqwest::Client::new() }
    }

    /// Build an executor whose client enforces a per-request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, ActionError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ActionError::Fatal(format!("cannot build http client: {e}")))?;
        Ok(Self { client })
    }
}

impl Default for HttpActionExecutor {
    fn default() -> Self {
        Self::new()
    }
}

fn to_reqwest(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get    => reqwest::Method::GET,
        HttpMethod::Post   => reqwest::Method::POST,
        HttpMethod::Put    => reqwest::Method::PUT,
        HttpMethod::Patch  => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}

/// Flatten a JSON object into query pairs. Non-object payloads produce none.
fn query_pairs(params: &Value) -> Vec<(String, String)> {
    match params {
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| {
                let v = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), v)
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn classify(err: reqwest::Error) -> ActionError {
    if err.is_builder() {
        ActionError::Fatal(err.to_string())
    } else {
        ActionError::Retryable(err.to_string())
    }
}

#[async_trait]
impl ActionExecutor for HttpActionExecutor {
    async fn invoke(&self, request: &ActionRequest) -> Result<ActionResponse, ActionError> {
        let url = reqwest::Url::parse(&request.action)
            .map_err(|e| ActionError::Fatal(format!("invalid action url '{}': {e}", request.action)))?;

        let mut builder = self.client.request(to_reqwest(request.method), url);
        builder = if request.method.has_body() {
            builder.json(&request.params)
        } else {
            builder.query(&query_pairs(&request.params))
        };

        debug!("invoking {} {}", request.method, request.action);
        let response = builder.send().await.map_err(classify)?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(classify)?;
        let body = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        Ok(ActionResponse::new(status, body))
    }
}
