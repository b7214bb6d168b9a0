//! `MockExecutor`: a test double for `ActionExecutor`.
//!
//! Behaviour is scripted per action identifier; unscripted actions answer
//! `200 {}`. Every request is recorded so tests can assert on call order.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::{ActionError, ActionExecutor, ActionRequest, ActionResponse};

/// Behaviour injected into `MockExecutor` for one action.
#[derive(Debug, Clone)]
pub enum MockBehaviour {
    /// Answer with a fixed status and body.
    Respond { status: u16, body: Value },
    /// Answer `503` for the first `failures` calls, then the given status.
    Flaky { failures: usize, status: u16, body: Value },
    /// Fail with a `Retryable` error.
    FailRetryable(String),
    /// Fail with a `Fatal` error.
    FailFatal(String),
}

/// A mock executor that records every call it receives.
#[derive(Clone, Default)]
pub struct MockExecutor {
    behaviours: Arc<Mutex<HashMap<String, MockBehaviour>>>,
    /// All requests seen (in call order).
    pub calls: Arc<Mutex<Vec<ActionRequest>>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the behaviour of `action`.
    pub fn on(self, action: impl Into<String>, behaviour: MockBehaviour) -> Self {
        self.behaviours.lock().unwrap().insert(action.into(), behaviour);
        self
    }

    /// Shorthand for a fixed status with an empty object body.
    pub fn responding(self, action: impl Into<String>, status: u16) -> Self {
        self.on(action, MockBehaviour::Respond { status, body: json!({}) })
    }

    /// Number of invocations across all actions.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Number of invocations of one action.
    pub fn calls_for(&self, action: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.action == action)
            .count()
    }

    /// Actions in the order they were invoked.
    pub fn invoked_actions(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|r| r.action.clone()).collect()
    }
}

#[async_trait]
impl ActionExecutor for MockExecutor {
    async fn invoke(&self, request: &ActionRequest) -> Result<ActionResponse, ActionError> {
        let seen = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(request.clone());
            calls.iter().filter(|r| r.action == request.action).count()
        };

        let behaviour = self.behaviours.lock().unwrap().get(&request.action).cloned();

        match behaviour {
            None => Ok(ActionResponse::new(200, json!({}))),
            Some(MockBehaviour::Respond { status, body }) => Ok(ActionResponse::new(status, body)),
            Some(MockBehaviour::Flaky { failures, status, body }) => {
                if seen <= failures {
                    Ok(ActionResponse::new(503, json!({ "error": "unavailable" })))
                } else {
                    Ok(ActionResponse::new(status, body))
                }
            }
            Some(MockBehaviour::FailRetryable(msg)) => Err(ActionError::Retryable(msg)),
            Some(MockBehaviour::FailFatal(msg))     => Err(ActionError::Fatal(msg)),
        }
    }
}
