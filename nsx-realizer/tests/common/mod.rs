//! In-memory NSX manager for integration tests.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use nsx_realizer::{LogicalPort, LogicalSwitch, LogicalSwitchState, NsxClient, NsxClientConfig};
use tokio::net::TcpListener;

pub const USERNAME: &str = "admin";
pub const PASSWORD: &str = "secret";
// base64("admin:secret")
const EXPECTED_AUTH: &str = "Basic YWRtaW46c2VjcmV0";

/// Reply to one state query.
#[derive(Debug, Clone)]
pub enum StateReply {
    State(LogicalSwitchState),
    Status(StatusCode),
    /// 200 with a body that is not JSON.
    Garbage,
}

impl StateReply {
    pub fn state(state: &str) -> Self {
        StateReply::State(LogicalSwitchState::new(state))
    }
}

/// One request as seen by the manager.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
}

#[derive(Default)]
struct Inner {
    switches: HashMap<String, LogicalSwitch>,
    ports: HashMap<String, LogicalPort>,
    states: VecDeque<StateReply>,
    fallback: Option<StateReply>,
    create_status: Option<StatusCode>,
    delete_status: Option<StatusCode>,
    requests: Vec<Recorded>,
    next_id: u32,
}

#[derive(Clone, Default)]
pub struct MockManager {
    inner: Arc<Mutex<Inner>>,
}

impl MockManager {
    /// Queue replies for the next state queries.
    pub fn script_states(&self, replies: impl IntoIterator<Item = StateReply>) {
        self.inner.lock().unwrap().states.extend(replies);
    }

    /// Reply used once the queue is empty (default: `success`).
    pub fn set_fallback(&self, reply: StateReply) {
        self.inner.lock().unwrap().fallback = Some(reply);
    }

    pub fn fail_creates_with(&self, status: StatusCode) {
        self.inner.lock().unwrap().create_status = Some(status);
    }

    pub fn fail_deletes_with(&self, status: StatusCode) {
        self.inner.lock().unwrap().delete_status = Some(status);
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.inner.lock().unwrap().requests.clone()
    }

    pub fn requests_to(&self, method: &str, path: &str) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.path == path)
            .collect()
    }

    pub fn switch(&self, id: &str) -> Option<LogicalSwitch> {
        self.inner.lock().unwrap().switches.get(id).cloned()
    }

    pub fn remove_switch(&self, id: &str) {
        self.inner.lock().unwrap().switches.remove(id);
    }

    pub fn port(&self, id: &str) -> Option<LogicalPort> {
        self.inner.lock().unwrap().ports.get(id).cloned()
    }

    fn next_id(&self, prefix: &str) -> String {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        format!("{}-{}", prefix, inner.next_id)
    }
}

/// Test server wrapper around the mock manager.
pub struct TestServer {
    pub addr: SocketAddr,
    pub manager: MockManager,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    pub async fn spawn() -> Self {
        let manager = MockManager::default();
        let router = router(manager.clone());

        // Port 0 lets the OS pick
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("Server error");
        });

        Self {
            addr,
            manager,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn client(&self) -> NsxClient {
        self.client_with_password(PASSWORD)
    }

    pub fn client_with_password(&self, password: &str) -> NsxClient {
        NsxClient::new(NsxClientConfig::new(self.base_url(), USERNAME, password))
            .expect("Failed to build client")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

fn router(manager: MockManager) -> Router {
    Router::new()
        .route("/api/v1/logical-switches", axum::routing::post(create_switch))
        .route(
            "/api/v1/logical-switches/{id}",
            get(get_switch).put(update_switch).delete(delete_switch),
        )
        .route("/api/v1/logical-switches/{id}/state", get(switch_state))
        .route("/api/v1/logical-ports", axum::routing::post(create_port))
        .route(
            "/api/v1/logical-ports/{id}",
            get(get_port).put(update_port).delete(delete_port),
        )
        .layer(middleware::from_fn_with_state(manager.clone(), record_and_authorize))
        .with_state(manager)
}

async fn record_and_authorize(
    State(manager): State<MockManager>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    manager.inner.lock().unwrap().requests.push(Recorded {
        method: request.method().to_string(),
        path: request.uri().path().to_string(),
        query: request.uri().query().map(str::to_string),
    });

    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == EXPECTED_AUTH);
    if !authorized {
        return StatusCode::FORBIDDEN.into_response();
    }
    next.run(request).await
}

async fn create_switch(
    State(manager): State<MockManager>,
    Json(mut switch): Json<LogicalSwitch>,
) -> Response {
    if let Some(status) = manager.inner.lock().unwrap().create_status {
        return status.into_response();
    }
    let id = manager.next_id("ls");
    switch.id = Some(id.clone());
    switch.revision = Some(0);
    manager
        .inner
        .lock()
        .unwrap()
        .switches
        .insert(id, switch.clone());
    (StatusCode::CREATED, Json(switch)).into_response()
}

async fn get_switch(State(manager): State<MockManager>, Path(id): Path<String>) -> Response {
    match manager.switch(&id) {
        Some(switch) => Json(switch).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn update_switch(
    State(manager): State<MockManager>,
    Path(id): Path<String>,
    Json(mut switch): Json<LogicalSwitch>,
) -> Response {
    let mut inner = manager.inner.lock().unwrap();
    let Some(current) = inner.switches.get(&id) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if current.revision != switch.revision {
        return StatusCode::PRECONDITION_FAILED.into_response();
    }
    switch.id = Some(id.clone());
    switch.revision = current.revision.map(|r| r + 1);
    inner.switches.insert(id, switch.clone());
    Json(switch).into_response()
}

async fn delete_switch(State(manager): State<MockManager>, Path(id): Path<String>) -> Response {
    let mut inner = manager.inner.lock().unwrap();
    if let Some(status) = inner.delete_status {
        return status.into_response();
    }
    match inner.switches.remove(&id) {
        Some(_) => StatusCode::OK.into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn switch_state(State(manager): State<MockManager>, Path(id): Path<String>) -> Response {
    let mut inner = manager.inner.lock().unwrap();
    let reply = inner
        .states
        .pop_front()
        .or_else(|| inner.fallback.clone())
        .unwrap_or_else(|| StateReply::state("success"));

    match reply {
        StateReply::Status(status) => status.into_response(),
        StateReply::Garbage => (StatusCode::OK, "<html>maintenance</html>").into_response(),
        StateReply::State(_) if !inner.switches.contains_key(&id) => {
            StatusCode::NOT_FOUND.into_response()
        }
        StateReply::State(mut state) => {
            state.logical_switch_id = Some(id);
            Json(state).into_response()
        }
    }
}

async fn create_port(
    State(manager): State<MockManager>,
    Json(mut port): Json<LogicalPort>,
) -> Response {
    if manager.switch(&port.logical_switch_id).is_none() {
        return StatusCode::BAD_REQUEST.into_response();
    }
    let id = manager.next_id("lp");
    port.id = Some(id.clone());
    port.revision = Some(0);
    manager.inner.lock().unwrap().ports.insert(id, port.clone());
    (StatusCode::CREATED, Json(port)).into_response()
}

async fn get_port(State(manager): State<MockManager>, Path(id): Path<String>) -> Response {
    match manager.port(&id) {
        Some(port) => Json(port).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn update_port(
    State(manager): State<MockManager>,
    Path(id): Path<String>,
    Json(mut port): Json<LogicalPort>,
) -> Response {
    let mut inner = manager.inner.lock().unwrap();
    let Some(current) = inner.ports.get(&id) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if current.revision != port.revision {
        return StatusCode::PRECONDITION_FAILED.into_response();
    }
    port.id = Some(id.clone());
    port.revision = current.revision.map(|r| r + 1);
    inner.ports.insert(id, port.clone());
    Json(port).into_response()
}

async fn delete_port(State(manager): State<MockManager>, Path(id): Path<String>) -> Response {
    match manager.inner.lock().unwrap().ports.remove(&id) {
        Some(_) => StatusCode::OK.into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
