//! Backend abstraction for tc-search.
//!
//! The [`Backend`] trait is the only place the engine suspends: the
//! orchestrator hands it one query per record kind and receives a raw page
//! back. Single-record lookups and association listings back the detail
//! view. The HTTP client lives in the application crate; an
//! [`InMemoryBackend`](memory::InMemoryBackend) serves tests.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::models::{Associations, RawItem, RecordKind};

/// Parameters for one page fetch against one collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchParams<'a> {
    pub kind: RecordKind,
    /// Validated TQL expression.
    pub query: &'a str,
    pub result_start: usize,
    pub result_limit: usize,
    pub owner: Option<&'a str>,
    pub include_tags: bool,
}

/// One page of raw items plus the backend-reported total match count.
#[derive(Debug, Clone, Default)]
pub struct FetchPage {
    pub items: Vec<RawItem>,
    pub total: u64,
}

/// Typed failure from a backend call. Never retried by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("authentication failed: check API credentials")]
    Unauthorized,
    #[error("resource not found")]
    NotFound,
    #[error("rate limited by the API; try again shortly")]
    RateLimited,
    #[error("query rejected by the API: {0}")]
    Validation(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("API request failed with status {0}")]
    Other(u16),
}

/// Remote record source.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`fetch`](Backend::fetch) | Run one TQL query against indicators or groups |
/// | [`fetch_one`](Backend::fetch_one) | Look up a single record by id |
/// | [`fetch_associations`](Backend::fetch_associations) | Groups and indicators linked to a record |
#[async_trait]
pub trait Backend: Send + Sync {
    /// Fetch one page of raw items matching `params.query`.
    async fn fetch(&self, params: FetchParams<'_>) -> Result<FetchPage, BackendError>;

    /// Fetch a single item, tags included. Unknown ids are `NotFound`.
    async fn fetch_one(&self, kind: RecordKind, id: i64) -> Result<RawItem, BackendError>;

    async fn fetch_associations(
        &self,
        kind: RecordKind,
        id: i64,
    ) -> Result<Associations, BackendError>;
}

#[async_trait]
impl<B: Backend + ?Sized> Backend for std::sync::Arc<B> {
    async fn fetch(&self, params: FetchParams<'_>) -> Result<FetchPage, BackendError> {
        (**self).fetch(params).await
    }

    async fn fetch_one(&self, kind: RecordKind, id: i64) -> Result<RawItem, BackendError> {
        (**self).fetch_one(kind, id).await
    }

    async fn fetch_associations(
        &self,
        kind: RecordKind,
        id: i64,
    ) -> Result<Associations, BackendError> {
        (**self).fetch_associations(kind, id).await
    }
}
