//! Scripted transport used by unit tests.

use crate::api::error::{ApiError, ApiResult};
use crate::api::transport::{ApiRequest, RawResponse, Transport};
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Notify;

pub struct Reply {
    result: Result<RawResponse, String>,
    gate: Option<Arc<Notify>>,
}

impl Reply {
    pub fn json(status: u16, body: Value) -> Self {
        Self::raw(status, Some("application/json"), body.to_string().into_bytes())
    }

    pub fn raw(status: u16, content_type: Option<&str>, body: Vec<u8>) -> Self {
        let mut headers = HeaderMap::new();
        if let Some(content_type) = content_type {
            headers.insert(CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        }
        headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        Self {
            result: Ok(RawResponse {
                status: StatusCode::from_u16(status).unwrap(),
                headers,
                body,
            }),
            gate: None,
        }
    }

    pub fn empty(status: u16) -> Self {
        Self::raw(status, None, Vec::new())
    }

    pub fn failure(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
            gate: None,
        }
    }

    /// Hold the response until the gate is notified.
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }
}

/// Replies are keyed by method and URL path. Several replies for the same key
/// are served in order; the last one keeps answering.
#[derive(Default)]
pub struct MockTransport {
    replies: Mutex<HashMap<(Method, String), VecDeque<Reply>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on(&self, method: Method, path: &str, reply: Reply) -> &Self {
        self.replies
            .lock()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(reply);
        self
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// URLs (path and query) of all recorded requests.
    pub fn urls(&self) -> Vec<String> {
        self.requests
            .lock()
            .iter()
            .map(|request| match request.url.query() {
                Some(query) => format!("{}?{}", request.url.path(), query),
                None => request.url.path().to_string(),
            })
            .collect()
    }
}

fn clone_result(result: &Result<RawResponse, String>) -> Result<RawResponse, String> {
    match result {
        Ok(response) => Ok(response.clone()),
        Err(message) => Err(message.clone()),
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: ApiRequest) -> ApiResult<RawResponse> {
        let key = (request.method.clone(), request.url.path().to_string());
        self.requests.lock().push(request);

        let (result, gate) = {
            let mut replies = self.replies.lock();
            match replies.get_mut(&key) {
                Some(queue) if queue.len() > 1 => {
                    let reply = queue.pop_front().unwrap();
                    (reply.result, reply.gate)
                }
                Some(queue) if !queue.is_empty() => {
                    let reply = &queue[0];
                    (clone_result(&reply.result), reply.gate.clone())
                }
                _ => {
                    let reply = Reply::raw(404, Some("text/html"), b"not found".to_vec());
                    (reply.result, None)
                }
            }
        };

        if let Some(gate) = gate {
            gate.notified().await;
        }
        result.map_err(ApiError::Transport)
    }
}
