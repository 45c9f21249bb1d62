//! In-memory [`Backend`] implementation for tests and offline demos.
//!
//! Items are stored per record kind and served in insertion order. TQL is
//! not evaluated: every stored item matches, and only the page window and
//! the owner restriction are applied. Lookups by id search the stored
//! items; associations are registered per record. Failures and latency can
//! be injected per kind and apply to every method. Only
//! [`Backend::fetch`] calls are recorded.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;

use crate::models::{Associations, RawItem, RecordKind};

use super::{Backend, BackendError, FetchPage, FetchParams};

/// A recorded [`Backend::fetch`] invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub kind: RecordKind,
    pub query: String,
    pub result_start: usize,
    pub result_limit: usize,
    pub owner: Option<String>,
}

#[derive(Default)]
struct KindState {
    items: Vec<RawItem>,
    associations: HashMap<i64, Associations>,
    failure: Option<BackendError>,
    delay: Option<Duration>,
}

/// In-memory backend for testing.
pub struct InMemoryBackend {
    kinds: RwLock<HashMap<RecordKind, KindState>>,
    calls: RwLock<Vec<RecordedCall>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            kinds: RwLock::new(HashMap::new()),
            calls: RwLock::new(Vec::new()),
        }
    }

    /// Append items served for `kind`.
    pub fn with_items(self, kind: RecordKind, items: Vec<RawItem>) -> Self {
        self.push_items(kind, items);
        self
    }

    /// Make every fetch for `kind` fail with `error`.
    pub fn with_failure(self, kind: RecordKind, error: BackendError) -> Self {
        self.set_failure(kind, Some(error));
        self
    }

    /// Delay every fetch for `kind` before answering.
    pub fn with_delay(self, kind: RecordKind, delay: Duration) -> Self {
        if let Ok(mut kinds) = self.kinds.write() {
            kinds.entry(kind).or_default().delay = Some(delay);
        }
        self
    }

    /// Register the associations returned for record `id` of `kind`.
    pub fn with_associations(self, kind: RecordKind, id: i64, associations: Associations) -> Self {
        if let Ok(mut kinds) = self.kinds.write() {
            kinds
                .entry(kind)
                .or_default()
                .associations
                .insert(id, associations);
        }
        self
    }

    pub fn push_items(&self, kind: RecordKind, items: Vec<RawItem>) {
        if let Ok(mut kinds) = self.kinds.write() {
            kinds.entry(kind).or_default().items.extend(items);
        }
    }

    pub fn set_failure(&self, kind: RecordKind, error: Option<BackendError>) {
        if let Ok(mut kinds) = self.kinds.write() {
            kinds.entry(kind).or_default().failure = error;
        }
    }

    /// All calls received so far, in arrival order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.read().map(|c| c.clone()).unwrap_or_default()
    }

    /// Read `kind`'s state, then apply its delay and injected failure.
    async fn lookup<T>(
        &self,
        kind: RecordKind,
        read: impl FnOnce(&KindState) -> Option<T>,
    ) -> Result<T, BackendError> {
        let (delay, failure, found) = {
            let kinds = self
                .kinds
                .read()
                .map_err(|_| BackendError::Network("in-memory backend poisoned".into()))?;
            match kinds.get(&kind) {
                Some(state) => (state.delay, state.failure.clone(), read(state)),
                None => (None, None, None),
            }
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = failure {
            return Err(err);
        }
        found.ok_or(BackendError::NotFound)
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for InMemoryBackend {
    async fn fetch(&self, params: FetchParams<'_>) -> Result<FetchPage, BackendError> {
        if let Ok(mut calls) = self.calls.write() {
            calls.push(RecordedCall {
                kind: params.kind,
                query: params.query.to_string(),
                result_start: params.result_start,
                result_limit: params.result_limit,
                owner: params.owner.map(str::to_string),
            });
        }

        let (delay, failure, matching) = {
            let kinds = self
                .kinds
                .read()
                .map_err(|_| BackendError::Network("in-memory backend poisoned".into()))?;
            match kinds.get(&params.kind) {
                Some(state) => {
                    let matching: Vec<RawItem> = state
                        .items
                        .iter()
                        .filter(|item| match params.owner {
                            Some(owner) => item.owner_name.as_deref() == Some(owner),
                            None => true,
                        })
                        .cloned()
                        .collect();
                    (state.delay, state.failure.clone(), matching)
                }
                None => (None, None, Vec::new()),
            }
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = failure {
            return Err(err);
        }

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(params.result_start)
            .take(params.result_limit)
            .collect();
        Ok(FetchPage { items, total })
    }

    async fn fetch_one(&self, kind: RecordKind, id: i64) -> Result<RawItem, BackendError> {
        self.lookup(kind, |state| state.items.iter().find(|i| i.id == id).cloned())
            .await
    }

    async fn fetch_associations(
        &self,
        kind: RecordKind,
        id: i64,
    ) -> Result<Associations, BackendError> {
        self.lookup(kind, |state| {
            state.items.iter().find(|i| i.id == id)?;
            Some(state.associations.get(&id).cloned().unwrap_or_default())
        })
        .await
    }
}
