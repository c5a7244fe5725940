//! In-memory transport for unit tests.

#![allow(clippy::unwrap_used)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::Value;

use crate::api::{ApiError, ApiRequest, ApiResponse, Transport};
use crate::storage::KeyValueStore;

enum Scripted {
    Respond(ApiResponse),
    Fail(String),
}

/// Transport that answers from a script and records every request.
///
/// Routed answers (`on`) are matched by method and full URL; the last
/// answer for a route repeats. Unrouted requests consume the queue
/// (`respond_*`, `fail`) in order, then fall back to 404.
#[derive(Default)]
pub struct ScriptedTransport {
    queue: Mutex<VecDeque<Scripted>>,
    routes: Mutex<HashMap<(Method, String), VecDeque<ApiResponse>>>,
    requests: Mutex<Vec<ApiRequest>>,
    observer: Mutex<Option<(Arc<dyn KeyValueStore>, String)>>,
    observed: Mutex<Vec<Option<String>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond_status(&self, status: StatusCode) {
        self.queue
            .lock()
            .unwrap()
            .push_back(Scripted::Respond(ApiResponse::empty(status)));
    }

    pub fn respond_json(&self, status: StatusCode, body: Value) {
        self.queue
            .lock()
            .unwrap()
            .push_back(Scripted::Respond(ApiResponse::json_body(status, &body)));
    }

    pub fn fail(&self, message: &str) {
        self.queue
            .lock()
            .unwrap()
            .push_back(Scripted::Fail(message.to_string()));
    }

    pub fn on(&self, method: Method, url: &str, status: StatusCode, body: Value) {
        self.routes
            .lock()
            .unwrap()
            .entry((method, url.to_string()))
            .or_default()
            .push_back(ApiResponse::json_body(status, &body));
    }

    /// Record the value of `key` in `store` at the moment each request is sent.
    pub fn observe_storage(&self, store: Arc<dyn KeyValueStore>, key: &str) {
        *self.observer.lock().unwrap() = Some((store, key.to_string()));
    }

    pub fn observed(&self) -> Vec<Option<String>> {
        self.observed.lock().unwrap().clone()
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, method: &Method, url: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| &r.method == method && r.url == url)
            .count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        if let Some((store, key)) = self.observer.lock().unwrap().as_ref() {
            self.observed.lock().unwrap().push(store.get(key));
        }
        let key = (request.method.clone(), request.url.clone());
        self.requests.lock().unwrap().push(request);

        if let Some(answers) = self.routes.lock().unwrap().get_mut(&key) {
            let answer = if answers.len() > 1 {
                answers.pop_front()
            } else {
                answers.front().cloned()
            };
            if let Some(answer) = answer {
                return Ok(answer);
            }
        }

        match self.queue.lock().unwrap().pop_front() {
            Some(Scripted::Respond(response)) => Ok(response),
            Some(Scripted::Fail(message)) => Err(ApiError::Http(message)),
            None => Ok(ApiResponse::empty(StatusCode::NOT_FOUND)),
        }
    }
}
