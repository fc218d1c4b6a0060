//! Test doubles for providers

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use super::{RemoteConfig, ResponseProvider, TipRequest};

#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub authorization: Option<String>,
    pub body: Value,
}

#[derive(Clone)]
struct MockState {
    status: StatusCode,
    body: String,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

async fn handle_completion(
    State(state): State<MockState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.seen.lock().unwrap().push(SeenRequest {
        authorization: headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
    });

    (
        state.status,
        [(header::CONTENT_TYPE, "application/json")],
        state.body.clone(),
    )
        .into_response()
}

/// Fake completions endpoint on a random local port
pub struct CompletionServer {
    addr: SocketAddr,
    state: MockState,
    handle: JoinHandle<()>,
}

impl CompletionServer {
    pub async fn start(status: StatusCode, body: String) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = MockState {
            status,
            body,
            seen: Arc::new(Mutex::new(Vec::new())),
        };

        let app = Router::new()
            .route("/chat/completions", post(handle_completion))
            .with_state(state.clone());

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    /// A server that answers every request with one successful completion
    pub async fn reply_content(content: &str) -> Self {
        let body = json!({
            "choices": [
                { "message": { "role": "assistant", "content": content } }
            ]
        });
        Self::start(StatusCode::OK, body.to_string()).await
    }

    pub fn endpoint(&self) -> String {
        format!("http://{}/chat/completions", self.addr)
    }

    pub fn remote_config(&self) -> RemoteConfig {
        RemoteConfig {
            endpoint: self.endpoint(),
            model: "test-model".into(),
            timeout: Some(Duration::from_secs(5)),
        }
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        self.state.seen.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.seen.lock().unwrap().len()
    }
}

impl Drop for CompletionServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// An endpoint on a port nothing listens on
pub async fn unreachable_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/chat/completions", addr)
}

/// Provider that returns a fixed reply and records each request.
///
/// A gated provider holds every turn until `release` is called.
pub struct ScriptedProvider {
    reply: String,
    wants_credential: bool,
    calls: AtomicUsize,
    requests: Mutex<Vec<TipRequest>>,
    gate: Option<Semaphore>,
}

impl ScriptedProvider {
    pub fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self::build(reply, None))
    }

    pub fn gated(reply: &str) -> Arc<Self> {
        Arc::new(Self::build(reply, Some(Semaphore::new(0))))
    }

    pub fn asking_for_credential(reply: &str) -> Arc<Self> {
        let mut provider = Self::build(reply, None);
        provider.wants_credential = true;
        Arc::new(provider)
    }

    fn build(reply: &str, gate: Option<Semaphore>) -> Self {
        Self {
            reply: reply.to_string(),
            wants_credential: false,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            gate,
        }
    }

    pub fn release(&self, turns: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(turns);
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<TipRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResponseProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn wants_credential(&self) -> bool {
        self.wants_credential
    }

    async fn respond(&self, request: &TipRequest) -> String {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        self.reply.clone()
    }
}
