use std::{
    cmp::Ordering,
    collections::HashMap,
    sync::Arc,
    time::Duration,
};

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use shared::domain::{BearerToken, Role, Session, UserProfile};
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: HashMap<String, String>,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub body: Option<Value>,
}

#[derive(Default)]
pub(crate) struct BackendState {
    pub records: Vec<Value>,
    pub next_id: i64,
    pub requests: Vec<RecordedRequest>,
    /// Artificial latency for list calls, keyed by the raw `sort` value.
    pub list_delays: HashMap<String, Duration>,
    /// Fixed `totalPages` instead of computing it from `records`.
    pub total_pages_override: Option<u32>,
    pub fail_with: Option<(StatusCode, String)>,
    pub update_returns_empty: bool,
    pub lookup_items: Vec<Value>,
    pub sign_in_response: Option<Value>,
}

#[derive(Clone)]
pub(crate) struct MockBackend {
    pub url: String,
    pub state: Arc<Mutex<BackendState>>,
}

impl MockBackend {
    pub async fn spawn(records: Vec<Value>) -> Self {
        std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
        let next_id = records
            .iter()
            .filter_map(|r| r.get("id").and_then(Value::as_i64))
            .max()
            .unwrap_or(0)
            + 1;
        let state = Arc::new(Mutex::new(BackendState {
            records,
            next_id,
            ..BackendState::default()
        }));
        let app = Router::new()
            .route("/api/auth/:action", post(handle_auth))
            .route("/api/:resource", get(handle_list))
            .route("/api/:resource/list", get(handle_lookup))
            .route("/api/:resource/create", post(handle_create))
            .route("/api/:resource/update/:id", put(handle_update))
            .route("/api/:resource/:id", axum::routing::delete(handle_delete))
            .with_state(Arc::clone(&state));
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Self {
            url: format!("http://{addr}"),
            state,
        }
    }

    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().await.requests.clone()
    }

    pub async fn requests_with(&self, method: Method) -> Vec<RecordedRequest> {
        self.requests()
            .await
            .into_iter()
            .filter(|r| r.method == method)
            .collect()
    }

    pub async fn delay_sort(&self, sort: &str, delay: Duration) {
        self.state
            .lock()
            .await
            .list_delays
            .insert(sort.to_string(), delay);
    }

    pub async fn fail_with(&self, status: StatusCode, body: &str) {
        self.state.lock().await.fail_with = Some((status, body.to_string()));
    }

    pub async fn recover(&self) {
        self.state.lock().await.fail_with = None;
    }
}

pub(crate) fn admin_session() -> Session {
    session_with_role("ROLE_ADMIN")
}

pub(crate) fn session_with_role(role: &str) -> Session {
    Session::new(
        BearerToken::new("test-token"),
        Role::new(role),
        UserProfile {
            name: "Test".into(),
            role: role.into(),
            ..UserProfile::default()
        },
    )
}

type Shared = State<Arc<Mutex<BackendState>>>;

fn record_request(
    state: &mut BackendState,
    method: Method,
    uri: &Uri,
    headers: &HeaderMap,
    query: HashMap<String, String>,
    body: &Bytes,
) {
    let header_text = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    state.requests.push(RecordedRequest {
        method,
        path: uri.path().to_string(),
        query,
        authorization: header_text(header::AUTHORIZATION),
        content_type: header_text(header::CONTENT_TYPE),
        body: serde_json::from_slice(body).ok(),
    });
}

fn failure(state: &BackendState) -> Option<Response> {
    state
        .fail_with
        .clone()
        .map(|(status, body)| (status, body).into_response())
}

fn compare_field(a: &Value, b: &Value, field: &str) -> Ordering {
    let pick = |v: &Value| {
        field
            .split('.')
            .try_fold(v, |current, part| current.get(part))
            .cloned()
            .unwrap_or(Value::Null)
    };
    let (x, y) = (pick(a), pick(b));
    match (numeric(&x), numeric(&y)) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => x.to_string().cmp(&y.to_string()),
    }
}

// Numeric strings such as `"2"` sort alongside real numbers.
fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

async fn handle_list(
    State(state): Shared,
    Path(_resource): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let sort = query.get("sort").cloned().unwrap_or_default();
    let delay = {
        let mut guard = state.lock().await;
        record_request(&mut guard, method, &uri, &headers, query.clone(), &Bytes::new());
        guard.list_delays.get(&sort).copied()
    };
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    let guard = state.lock().await;
    if let Some(response) = failure(&guard) {
        return response;
    }
    let page: usize = query.get("page").and_then(|p| p.parse().ok()).unwrap_or(0);
    let size: usize = query
        .get("size")
        .and_then(|s| s.parse().ok())
        .unwrap_or(5)
        .max(1);
    let (field, direction) = sort.split_once(',').unwrap_or(("id", "asc"));

    let mut records = guard.records.clone();
    records.sort_by(|a, b| {
        let ordering = compare_field(a, b, field);
        if direction == "desc" {
            ordering.reverse()
        } else {
            ordering
        }
    });
    let total_pages = guard
        .total_pages_override
        .unwrap_or_else(|| u32::try_from(records.len().div_ceil(size)).unwrap_or(u32::MAX));
    let content: Vec<Value> = records.into_iter().skip(page * size).take(size).collect();
    Json(json!({ "content": content, "totalPages": total_pages, "number": page })).into_response()
}

async fn handle_lookup(
    State(state): Shared,
    Path(_resource): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let mut guard = state.lock().await;
    record_request(&mut guard, method, &uri, &headers, HashMap::new(), &Bytes::new());
    if let Some(response) = failure(&guard) {
        return response;
    }
    Json(Value::Array(guard.lookup_items.clone())).into_response()
}

async fn handle_create(
    State(state): Shared,
    Path(_resource): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mut guard = state.lock().await;
    record_request(&mut guard, method, &uri, &headers, HashMap::new(), &body);
    if let Some(response) = failure(&guard) {
        return response;
    }
    let mut created: Value = serde_json::from_slice(&body).unwrap_or_else(|_| json!({}));
    let id = guard.next_id;
    guard.next_id += 1;
    if let Some(map) = created.as_object_mut() {
        map.insert("id".into(), json!(id));
    }
    guard.records.push(created.clone());
    (StatusCode::CREATED, Json(created)).into_response()
}

async fn handle_update(
    State(state): Shared,
    Path((_resource, id)): Path<(String, i64)>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mut guard = state.lock().await;
    record_request(&mut guard, method, &uri, &headers, HashMap::new(), &body);
    if let Some(response) = failure(&guard) {
        return response;
    }
    let patch: Value = serde_json::from_slice(&body).unwrap_or_else(|_| json!({}));
    let Some(existing) = guard
        .records
        .iter_mut()
        .find(|r| r.get("id").and_then(Value::as_i64) == Some(id))
    else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if let (Some(target), Some(fields)) = (existing.as_object_mut(), patch.as_object()) {
        for (key, value) in fields {
            target.insert(key.clone(), value.clone());
        }
        target.insert("updatedBy".into(), json!("server"));
    }
    let updated = existing.clone();
    if guard.update_returns_empty {
        return StatusCode::OK.into_response();
    }
    Json(updated).into_response()
}

async fn handle_delete(
    State(state): Shared,
    Path((_resource, id)): Path<(String, i64)>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let mut guard = state.lock().await;
    record_request(&mut guard, method, &uri, &headers, HashMap::new(), &Bytes::new());
    if let Some(response) = failure(&guard) {
        return response;
    }
    guard
        .records
        .retain(|r| r.get("id").and_then(Value::as_i64) != Some(id));
    StatusCode::OK.into_response()
}

async fn handle_auth(
    State(state): Shared,
    Path(_action): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    let mut guard = state.lock().await;
    record_request(&mut guard, method, &uri, &headers, query, &body);
    if let Some(response) = failure(&guard) {
        return response;
    }
    match &guard.sign_in_response {
        Some(response) if uri.path().ends_with("/signin") => Json(response.clone()).into_response(),
        _ => StatusCode::OK.into_response(),
    }
}
