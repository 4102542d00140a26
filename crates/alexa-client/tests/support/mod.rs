#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use alexa_client::{AlexaClient, ClientConfig, Device, Endpoints, RefreshSecret};
use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, oneshot};

pub const REFRESH_SECRET: &str = "Atnr|test-refresh-secret";
pub const SESSION_CSRF: &str = "csrf-from-probe";
pub const BEARER_TOKEN: &str = "Atna|test-bearer";

pub const COOKIE_EXCHANGE: &str = "/ap/exchangetoken/cookies";
pub const CSRF_PROBE: &str = "/api/language";
pub const BEARER_EXCHANGE: &str = "/auth/token";
pub const DEVICES: &str = "/api/devices-v2/device";
pub const BEHAVIOR_PREVIEW: &str = "/api/behaviors/preview";
pub const AUTOMATIONS: &str = "/api/behaviors/automations";
pub const PHOENIX: &str = "/api/phoenix";
pub const PHOENIX_STATE: &str = "/api/phoenix/state";
pub const ACTIVITY_PAGE: &str = "/alexa-privacy/apd/activity";
pub const HISTORY: &str = "/alexa-privacy/apd/rvh/customer-history-records-v2/";
pub const EVENTS: &str = "/v20160207/events";
pub const CONVERSATIONS: &str = "/v1/conversations";

#[derive(Debug, Clone)]
pub struct MockReply {
    pub status: StatusCode,
    pub headers: Vec<(&'static str, String)>,
    pub body: String,
}

impl MockReply {
    pub fn json(status: StatusCode, body: Value) -> Self {
        Self {
            status,
            headers: vec![("content-type", "application/json".to_string())],
            body: body.to_string(),
        }
    }

    pub fn ok(body: Value) -> Self {
        Self::json(StatusCode::OK, body)
    }

    pub fn text(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn empty(status: StatusCode) -> Self {
        Self::text(status, "")
    }

    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).expect("recorded body should be json")
    }
}

#[derive(Debug, Clone, Default)]
struct MockState {
    // The last scripted reply for a path is repeated once the queue drains to it.
    replies: Arc<Mutex<HashMap<String, VecDeque<MockReply>>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

/// One local server standing in for every backend host.
pub struct MockBackend {
    pub url: String,
    state: MockState,
    shutdown_tx: oneshot::Sender<()>,
    server_task: tokio::task::JoinHandle<()>,
}

impl MockBackend {
    pub async fn start() -> Self {
        init_tracing();
        let state = MockState::default();
        let app = Router::new()
            .fallback(mock_handler)
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener should bind");
        let local_addr = listener
            .local_addr()
            .expect("listener address should resolve");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let server_task = tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });

            server.await.expect("test server should run");
        });

        Self {
            url: format!("http://{local_addr}"),
            state,
            shutdown_tx,
            server_task,
        }
    }

    /// Backend with a working cookie exchange and CSRF probe.
    pub async fn with_session() -> Self {
        let backend = Self::start().await;
        backend
            .reply(
                COOKIE_EXCHANGE,
                MockReply::ok(cookie_exchange(&[
                    ("session-id", "sid-1"),
                    ("ubid-main", "ubid-1"),
                ])),
            )
            .await;
        backend
            .reply(
                CSRF_PROBE,
                MockReply::ok(json!({"language": "en-US"}))
                    .with_header("set-cookie", format!("csrf={SESSION_CSRF}; Path=/")),
            )
            .await;
        backend
    }

    pub async fn reply(&self, path: &str, reply: MockReply) {
        self.state
            .replies
            .lock()
            .await
            .entry(path.to_string())
            .or_default()
            .push_back(reply);
    }

    pub async fn requests(&self, path: &str) -> Vec<RecordedRequest> {
        self.state
            .requests
            .lock()
            .await
            .iter()
            .filter(|request| request.path == path)
            .cloned()
            .collect()
    }

    pub async fn all_paths(&self) -> Vec<String> {
        self.state
            .requests
            .lock()
            .await
            .iter()
            .map(|request| request.path.clone())
            .collect()
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig::new(RefreshSecret::new(REFRESH_SECRET), "amazon.com")
            .with_endpoints(Endpoints::single_host(&self.url))
            .with_poll_interval(Duration::from_millis(10))
    }

    pub async fn connect(&self) -> AlexaClient {
        AlexaClient::connect(self.config())
            .await
            .expect("client should connect against mock backend")
    }

    pub async fn stop(self) {
        self.shutdown_tx
            .send(())
            .expect("shutdown signal should send");
        self.server_task.await.expect("server task should join");
    }
}

async fn mock_handler(
    State(state): State<MockState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    let path = uri.path().to_string();
    state.requests.lock().await.push(RecordedRequest {
        method,
        path: path.clone(),
        query: uri.query().map(ToString::to_string),
        headers,
        body,
    });

    let reply = {
        let mut replies = state.replies.lock().await;
        match replies.get_mut(&path) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        }
    };

    let Some(reply) = reply else {
        return (StatusCode::NOT_FOUND, format!("no mock for {path}")).into_response();
    };

    let mut response_headers = HeaderMap::new();
    for (name, value) in reply.headers {
        response_headers.append(
            HeaderName::from_static(name),
            HeaderValue::from_str(&value).expect("mock header value should be valid"),
        );
    }
    (reply.status, response_headers, reply.body).into_response()
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("alexa_client=debug"))
        .with_test_writer()
        .try_init();
}

pub fn cookie_exchange(cookies: &[(&str, &str)]) -> Value {
    let cookies = cookies
        .iter()
        .map(|(name, value)| json!({"Name": name, "Value": value}))
        .collect::<Vec<_>>();
    json!({"response": {"tokens": {"cookies": {".amazon.com": cookies}}}})
}

pub fn echo_device() -> Device {
    Device {
        account_name: "Kitchen Echo".to_string(),
        serial_number: "G090LF0994210ABC".to_string(),
        device_type: "A4ZP7ZC4PI6TO".to_string(),
        device_family: "ECHO".to_string(),
        customer_id: "A1CUSTOMER".to_string(),
        online: true,
        capabilities: Vec::new(),
    }
}

pub fn bearer_reply() -> MockReply {
    MockReply::ok(json!({"access_token": BEARER_TOKEN, "token_type": "bearer", "expires_in": 3600}))
}

/// Parses the `sequenceJson` string embedded in a behavior request.
pub fn embedded_sequence(request: &RecordedRequest) -> Value {
    let payload = request.json();
    let raw = payload["sequenceJson"]
        .as_str()
        .expect("sequenceJson should be a string");
    serde_json::from_str(raw).expect("sequenceJson should hold json")
}
