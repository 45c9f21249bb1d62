//! Mock threat-intelligence API used by the integration tests.
//!
//! Serves `/api/v3/indicators` and `/api/v3/groups` plus single records at
//! `/{id}`, checks the HMAC signature on every request, and records the
//! query parameters it saw.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use tc_search::auth::{self, Credentials};

pub const ACCESS_ID: &str = "test-access-id";
pub const SECRET_KEY: &str = "test-secret-key";

/// One request as the mock received it.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub endpoint: String,
    pub params: HashMap<String, String>,
}

#[derive(Clone, Default)]
pub struct MockState {
    pub indicators: Arc<Vec<Value>>,
    pub groups: Arc<Vec<Value>>,
    /// Status to return instead of data, per endpoint.
    pub failures: Arc<HashMap<&'static str, (u16, Value)>>,
    /// `associatedGroups` / `associatedIndicators` fields per (endpoint, id).
    pub associations: Arc<HashMap<(&'static str, i64), Value>>,
    pub seen: Arc<Mutex<Vec<SeenRequest>>>,
}

impl MockState {
    pub fn seen(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }
}

pub fn indicator(id: i64, summary: &str, type_name: &str, owner: &str, rating: f64) -> Value {
    json!({
        "id": id,
        "type": type_name,
        "summary": summary,
        "rating": rating,
        "confidence": 70,
        "dateAdded": "2024-03-01T10:00:00Z",
        "lastModified": "2024-03-05T10:00:00Z",
        "ownerName": owner,
        "active": true,
        "tags": { "data": [ { "name": "c2" } ] }
    })
}

pub fn group(id: i64, name: &str, type_name: &str, owner: &str) -> Value {
    json!({
        "id": id,
        "type": type_name,
        "name": name,
        "dateAdded": "2024-02-01T10:00:00Z",
        "ownerName": owner
    })
}

/// Both associations of one record, in the shape the API nests them.
pub fn associated(groups: Vec<Value>, indicators: Vec<Value>) -> Value {
    json!({
        "associatedGroups": { "data": groups },
        "associatedIndicators": { "data": indicators }
    })
}

fn signed(headers: &HeaderMap, uri: &Uri) -> bool {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };
    let creds = Credentials::new(ACCESS_ID, SECRET_KEY);
    auth::verify(
        &creds,
        &header("authorization"),
        uri.path(),
        uri.query(),
        "GET",
        &header("timestamp"),
    )
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "status": "Failure", "message": "bad signature" })),
    )
        .into_response()
}

async fn handle(
    state: MockState,
    endpoint: &'static str,
    headers: HeaderMap,
    uri: Uri,
    params: HashMap<String, String>,
) -> Response {
    if !signed(&headers, &uri) {
        return unauthorized();
    }

    state.seen.lock().unwrap().push(SeenRequest {
        endpoint: endpoint.to_string(),
        params: params.clone(),
    });

    if let Some((status, body)) = state.failures.get(endpoint) {
        let status = StatusCode::from_u16(*status).unwrap();
        return (status, Json(body.clone())).into_response();
    }

    let all = match endpoint {
        "indicators" => state.indicators.as_ref(),
        _ => state.groups.as_ref(),
    };
    let owner = params.get("owner");
    let matching: Vec<&Value> = all
        .iter()
        .filter(|v| owner.map_or(true, |o| v["ownerName"].as_str() == Some(o.as_str())))
        .collect();
    let start: usize = params
        .get("resultStart")
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);
    let limit: usize = params
        .get("resultLimit")
        .and_then(|s| s.parse().ok())
        .unwrap_or(100);
    let data: Vec<&Value> = matching.iter().skip(start).take(limit).copied().collect();

    Json(json!({ "data": data, "count": matching.len(), "status": "Success" })).into_response()
}

async fn handle_item(
    state: MockState,
    endpoint: &'static str,
    id: i64,
    headers: HeaderMap,
    uri: Uri,
) -> Response {
    if !signed(&headers, &uri) {
        return unauthorized();
    }

    let fields: Vec<String> = uri
        .query()
        .unwrap_or_default()
        .split('&')
        .filter_map(|pair| pair.strip_prefix("fields="))
        .map(str::to_string)
        .collect();
    state.seen.lock().unwrap().push(SeenRequest {
        endpoint: format!("{}/{}", endpoint, id),
        params: HashMap::from([("fields".to_string(), fields.join(","))]),
    });

    if let Some((status, body)) = state.failures.get(endpoint) {
        let status = StatusCode::from_u16(*status).unwrap();
        return (status, Json(body.clone())).into_response();
    }

    let all = match endpoint {
        "indicators" => state.indicators.as_ref(),
        _ => state.groups.as_ref(),
    };
    let Some(item) = all.iter().find(|v| v["id"].as_i64() == Some(id)) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "status": "Failure", "message": "not found" })),
        )
            .into_response();
    };

    let mut item = item.clone();
    if fields.iter().any(|f| f.starts_with("associated")) {
        let extra = state
            .associations
            .get(&(endpoint, id))
            .cloned()
            .unwrap_or_else(|| associated(Vec::new(), Vec::new()));
        if let (Some(obj), Some(extra)) = (item.as_object_mut(), extra.as_object()) {
            obj.extend(extra.clone());
        }
    }
    Json(json!({ "data": item, "status": "Success" })).into_response()
}

pub fn router(state: MockState) -> Router {
    Router::new()
        .route(
            "/api/v3/indicators",
            get(
                |State(s): State<MockState>,
                 headers: HeaderMap,
                 uri: Uri,
                 Query(p): Query<HashMap<String, String>>| async move {
                    handle(s, "indicators", headers, uri, p).await
                },
            ),
        )
        .route(
            "/api/v3/groups",
            get(
                |State(s): State<MockState>,
                 headers: HeaderMap,
                 uri: Uri,
                 Query(p): Query<HashMap<String, String>>| async move {
                    handle(s, "groups", headers, uri, p).await
                },
            ),
        )
        .route(
            "/api/v3/indicators/{id}",
            get(
                |State(s): State<MockState>,
                 Path(id): Path<i64>,
                 headers: HeaderMap,
                 uri: Uri| async move {
                    handle_item(s, "indicators", id, headers, uri).await
                },
            ),
        )
        .route(
            "/api/v3/groups/{id}",
            get(
                |State(s): State<MockState>,
                 Path(id): Path<i64>,
                 headers: HeaderMap,
                 uri: Uri| async move { handle_item(s, "groups", id, headers, uri).await },
            ),
        )
        .with_state(state)
}

/// Start the mock on an ephemeral port. Returns the API base URL.
pub async fn start_mock(state: MockState) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/api/v3", addr)
}
