//! End-to-end tests for the search pipeline over HTTP.
//!
//! `HttpBackend` talks to an in-process axum mock that verifies request
//! signatures; a custom `Backend` implementation checks the trait seam.

mod common;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use common::{associated, group, indicator, start_mock, MockState, ACCESS_ID, SECRET_KEY};
use tc_search::auth::Credentials;
use tc_search::client::HttpBackend;
use tc_search_core::aggregate::aggregate;
use tc_search_core::backend::{Backend, BackendError, FetchPage, FetchParams};
use tc_search_core::detail::fetch_detail;
use tc_search_core::models::{
    Associations, RawItem, RecordKind, Scope, SearchFilters, SearchRequest,
};
use tc_search_core::search::{execute, SearchError};

fn http_backend(base_url: &str, secret: &str) -> HttpBackend {
    HttpBackend::new(
        base_url,
        Credentials::new(ACCESS_ID, secret),
        Duration::from_secs(5),
    )
    .unwrap()
}

fn sample_state() -> MockState {
    MockState {
        indicators: Arc::new(vec![
            indicator(1, "evil.com", "Host", "Acme", 4.0),
            indicator(2, "EVIL.com", "Host", "Partner", 2.0),
            indicator(3, "bad.org", "Host", "Acme", 1.0),
        ]),
        groups: Arc::new(vec![
            group(10, "APT29", "Adversary", "Acme"),
            group(11, "Cozy Campaign", "Campaign", "Acme"),
        ]),
        ..Default::default()
    }
}

// ─── HttpBackend ────────────────────────────────────────────────────

#[tokio::test]
async fn signed_search_groups_across_owners() {
    let state = sample_state();
    let base = start_mock(state.clone()).await;
    let backend = http_backend(&base, SECRET_KEY);

    let req = SearchRequest::new("evil.com", Scope::Indicators).with_page(0, 10);
    let outcome = execute(&req, &backend).await.unwrap();
    assert_eq!(outcome.total, 3);
    assert_eq!(outcome.records.len(), 3);

    let (grouped, stats) = aggregate(outcome.records);
    assert_eq!(grouped.len(), 2);
    assert_eq!(grouped[0].key, "evil.com");
    assert_eq!(grouped[0].members.len(), 2);
    assert_eq!(stats.unique_owners, 2);
    assert_eq!(grouped[0].tags(), vec!["c2"]);

    let seen = state.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].endpoint, "indicators");
    assert_eq!(
        seen[0].params["tql"],
        r#"typeName in ("Host") and summary in ("evil.com")"#
    );
    assert_eq!(seen[0].params["resultStart"], "0");
    assert_eq!(seen[0].params["resultLimit"], "10");
    assert_eq!(seen[0].params["fields"], "tags");
}

#[tokio::test]
async fn wrong_secret_is_unauthorized() {
    let base = start_mock(sample_state()).await;
    let backend = http_backend(&base, "not-the-secret");

    let req = SearchRequest::new("evil.com", Scope::Indicators);
    let err = execute(&req, &backend).await.unwrap_err();
    assert_eq!(err, SearchError::Backend(BackendError::Unauthorized));
}

#[tokio::test]
async fn both_scope_splits_the_page() {
    let state = sample_state();
    let base = start_mock(state.clone()).await;
    let backend = http_backend(&base, SECRET_KEY);

    let req = SearchRequest::new("APT29", Scope::Both).with_page(1, 5);
    execute(&req, &backend).await.unwrap();

    let seen: HashMap<String, HashMap<String, String>> = state
        .seen()
        .into_iter()
        .map(|s| (s.endpoint, s.params))
        .collect();
    assert_eq!(seen["indicators"]["resultLimit"], "3");
    assert_eq!(seen["indicators"]["resultStart"], "3");
    assert_eq!(seen["groups"]["resultLimit"], "2");
    assert_eq!(seen["groups"]["resultStart"], "2");
    assert_eq!(seen["groups"]["tql"], r#"name in ("APT29")"#);
}

#[tokio::test]
async fn owner_and_filters_reach_the_api() {
    let state = sample_state();
    let base = start_mock(state.clone()).await;
    let backend = http_backend(&base, SECRET_KEY);

    let req = SearchRequest::new("evil.com", Scope::Indicators).with_filters(SearchFilters {
        owner: Some("Partner".into()),
        rating_min: Some(2.0),
        ..Default::default()
    });
    let outcome = execute(&req, &backend).await.unwrap();
    assert_eq!(outcome.records.len(), 1);
    assert_eq!(outcome.records[0].owner_name, "Partner");

    let seen = state.seen();
    assert_eq!(seen[0].params["owner"], "Partner");
    assert_eq!(
        seen[0].params["tql"],
        r#"(typeName in ("Host") and summary in ("evil.com")) and rating >= 2.0"#
    );
}

#[tokio::test]
async fn api_errors_are_mapped() {
    let cases = [
        (429, json!({}), BackendError::RateLimited),
        (404, json!({}), BackendError::NotFound),
        (
            400,
            json!({ "status": "Failure", "message": "Invalid TQL" }),
            BackendError::Validation("Invalid TQL".into()),
        ),
        (500, json!({}), BackendError::Other(500)),
    ];
    for (status, body, expected) in cases {
        let state = MockState {
            failures: Arc::new(HashMap::from([("indicators", (status, body))])),
            ..sample_state()
        };
        let base = start_mock(state).await;
        let backend = http_backend(&base, SECRET_KEY);
        let req = SearchRequest::new("evil.com", Scope::Indicators);
        let err = execute(&req, &backend).await.unwrap_err();
        assert_eq!(err, SearchError::Backend(expected), "status {}", status);
    }
}

#[tokio::test]
async fn combined_scope_fails_when_one_side_fails() {
    let state = MockState {
        failures: Arc::new(HashMap::from([("groups", (429, json!({})))])),
        ..sample_state()
    };
    let base = start_mock(state).await;
    let backend = http_backend(&base, SECRET_KEY);

    let req = SearchRequest::new("evil.com", Scope::Both);
    let err = execute(&req, &backend).await.unwrap_err();
    assert_eq!(err, SearchError::Backend(BackendError::RateLimited));
}

#[tokio::test]
async fn unreachable_api_is_a_network_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let backend = http_backend(&format!("http://127.0.0.1:{}/api/v3", port), SECRET_KEY);
    let req = SearchRequest::new("evil.com", Scope::Indicators);
    match execute(&req, &backend).await {
        Err(SearchError::Backend(BackendError::Network(_))) => {}
        other => panic!("expected a network error, got {:?}", other.map(|o| o.total)),
    }
}

#[tokio::test]
async fn detail_includes_associations() {
    let state = MockState {
        associations: Arc::new(HashMap::from([(
            ("indicators", 1),
            associated(
                vec![group(10, "APT29", "Adversary", "Acme")],
                vec![indicator(3, "bad.org", "Host", "Partner", 1.0)],
            ),
        )])),
        ..sample_state()
    };
    let base = start_mock(state.clone()).await;
    let backend = http_backend(&base, SECRET_KEY);

    let detail = fetch_detail(&backend, RecordKind::Indicator, 1).await.unwrap();
    assert_eq!(detail.record.display_value, "evil.com");
    assert_eq!(detail.record.tags, vec!["c2".to_string()]);
    assert_eq!(detail.associations.groups.len(), 1);
    assert_eq!(detail.associations.groups[0].display_value, "APT29");
    assert_eq!(detail.associations.groups[0].kind, RecordKind::Group);
    assert_eq!(detail.associations.indicators[0].display_value, "bad.org");
    assert_eq!(detail.associations.indicators[0].owner_name, "Partner");

    let mut seen: Vec<(String, String)> = state
        .seen()
        .into_iter()
        .map(|s| (s.endpoint, s.params["fields"].clone()))
        .collect();
    seen.sort();
    assert_eq!(
        seen,
        vec![
            (
                "indicators/1".to_string(),
                "associatedGroups,associatedIndicators".to_string()
            ),
            ("indicators/1".to_string(), "tags".to_string()),
        ]
    );
}

#[tokio::test]
async fn group_detail_without_associations() {
    let base = start_mock(sample_state()).await;
    let backend = http_backend(&base, SECRET_KEY);

    let detail = fetch_detail(&backend, RecordKind::Group, 11).await.unwrap();
    assert_eq!(detail.record.display_value, "Cozy Campaign");
    assert_eq!(detail.record.type_name, "Campaign");
    assert!(detail.associations.is_empty());
}

#[tokio::test]
async fn detail_errors_are_mapped() {
    let base = start_mock(sample_state()).await;

    let backend = http_backend(&base, SECRET_KEY);
    let err = fetch_detail(&backend, RecordKind::Indicator, 404).await.unwrap_err();
    assert_eq!(err, BackendError::NotFound);
    // group ids are not indicator ids
    let err = backend.fetch_one(RecordKind::Indicator, 10).await.unwrap_err();
    assert_eq!(err, BackendError::NotFound);

    let backend = http_backend(&base, "not-the-secret");
    let err = backend
        .fetch_associations(RecordKind::Group, 10)
        .await
        .unwrap_err();
    assert_eq!(err, BackendError::Unauthorized);

    let state = MockState {
        failures: Arc::new(HashMap::from([("groups", (429, json!({})))])),
        ..sample_state()
    };
    let base = start_mock(state).await;
    let backend = http_backend(&base, SECRET_KEY);
    let err = fetch_detail(&backend, RecordKind::Group, 10).await.unwrap_err();
    assert_eq!(err, BackendError::RateLimited);
}

// ─── Custom backend ─────────────────────────────────────────────────

/// Serves a fixed list and counts calls.
struct FixedBackend {
    items: Vec<RawItem>,
    calls: AtomicUsize,
}

#[async_trait]
impl Backend for FixedBackend {
    async fn fetch(&self, params: FetchParams<'_>) -> Result<FetchPage, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let items: Vec<RawItem> = self
            .items
            .iter()
            .skip(params.result_start)
            .take(params.result_limit)
            .cloned()
            .collect();
        Ok(FetchPage {
            items,
            total: self.items.len() as u64,
        })
    }

    async fn fetch_one(&self, _kind: RecordKind, id: i64) -> Result<RawItem, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.items
            .iter()
            .find(|item| item.id == id)
            .cloned()
            .ok_or(BackendError::NotFound)
    }

    async fn fetch_associations(
        &self,
        _kind: RecordKind,
        _id: i64,
    ) -> Result<Associations, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Associations::default())
    }
}

#[tokio::test]
async fn custom_backend_through_arc() {
    let items: Vec<RawItem> = (0..7)
        .map(|i| {
            serde_json::from_value(indicator(i, &format!("host{}.example", i), "Host", "Acme", 3.0))
                .unwrap()
        })
        .collect();
    let backend = Arc::new(FixedBackend {
        items,
        calls: AtomicUsize::new(0),
    });

    let req = SearchRequest::new("host", Scope::Indicators).with_page(1, 3);
    let outcome = execute(&req, &backend).await.unwrap();
    let values: Vec<&str> = outcome
        .records
        .iter()
        .map(|r| r.display_value.as_str())
        .collect();
    assert_eq!(values, vec!["host3.example", "host4.example", "host5.example"]);
    assert_eq!(outcome.total, 7);
    assert!(outcome.pagination.has_next);
    assert!(outcome.pagination.has_previous);
    assert_eq!(backend.calls.load(Ordering::SeqCst), 1);

    let detail = fetch_detail(&backend, RecordKind::Indicator, 4).await.unwrap();
    assert_eq!(detail.record.display_value, "host4.example");
    assert!(detail.associations.is_empty());
    assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
}
