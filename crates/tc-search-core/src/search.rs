//! Search orchestration across one or both record collections.
//!
//! [`execute`] turns a [`SearchRequest`] into one backend call per covered
//! record kind, maps raw items to [`Record`]s and reports the combined
//! total. [`plan`] performs the same query construction without I/O, so
//! callers can show the TQL that would be sent.
//!
//! # Combined scope
//!
//! For [`Scope::Both`] the page size is split with integer division: groups
//! get `page_size / 2`, indicators get the remainder. Both fetches run
//! concurrently and are joined; the first error fails the whole search and
//! the other fetch is dropped. Indicator records always precede group
//! records in the merged list.

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::backend::{Backend, BackendError, FetchPage, FetchParams};
use crate::models::{PaginationInfo, Record, RecordKind, Scope, SearchRequest};
use crate::query::{self, BuildError, PrepareError, QueryExpr, ValidationError};

/// Any failure surfaced by [`execute`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl From<PrepareError> for SearchError {
    fn from(err: PrepareError) -> Self {
        match err {
            PrepareError::Build(e) => SearchError::Build(e),
            PrepareError::Validation(e) => SearchError::Validation(e),
        }
    }
}

/// One backend call the orchestrator will make.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedFetch {
    pub kind: RecordKind,
    pub query: QueryExpr,
    pub result_start: usize,
    pub result_limit: usize,
}

/// Result of a successful [`execute`].
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    /// Indicators first, then groups; backend order within each kind.
    pub records: Vec<Record>,
    /// Sum of the backend-reported totals.
    pub total: u64,
    pub pagination: PaginationInfo,
    pub fetches: Vec<PlannedFetch>,
}

/// Split a combined page: `(indicator_share, group_share)`.
pub fn split_page_size(page_size: usize) -> (usize, usize) {
    let groups = page_size / 2;
    (page_size - groups, groups)
}

/// Build the per-kind queries and page windows for `request`.
///
/// A kind whose page share is zero (combined scope with `page_size == 1`)
/// is left out.
pub fn plan(request: &SearchRequest) -> Result<Vec<PlannedFetch>, SearchError> {
    if request.page_size == 0 {
        return Err(BuildError::InvalidPageSize.into());
    }

    let shares: Vec<(RecordKind, usize)> = match request.scope {
        Scope::Indicators => vec![(RecordKind::Indicator, request.page_size)],
        Scope::Groups => vec![(RecordKind::Group, request.page_size)],
        Scope::Both => {
            let (ind, grp) = split_page_size(request.page_size);
            vec![(RecordKind::Indicator, ind), (RecordKind::Group, grp)]
        }
    };

    let mut planned = Vec::with_capacity(shares.len());
    for (kind, limit) in shares.into_iter().filter(|(_, limit)| *limit > 0) {
        let expr = query::prepare(
            &request.query,
            kind.into(),
            request.auto_detect,
            request.force_tql,
            request.filters.as_ref(),
        )?;
        debug!(%kind, tql = %expr, "built query");
        planned.push(PlannedFetch {
            kind,
            query: expr,
            result_start: request.page * limit,
            result_limit: limit,
        });
    }
    Ok(planned)
}

async fn fetch_kind<B: Backend + ?Sized>(
    backend: &B,
    fetch: &PlannedFetch,
    owner: Option<&str>,
    include_tags: bool,
) -> Result<FetchPage, BackendError> {
    backend
        .fetch(FetchParams {
            kind: fetch.kind,
            query: fetch.query.as_str(),
            result_start: fetch.result_start,
            result_limit: fetch.result_limit,
            owner,
            include_tags,
        })
        .await
}

fn into_records(kind: RecordKind, page: FetchPage) -> Vec<Record> {
    page.items
        .into_iter()
        .map(|raw| Record::from_raw(kind, raw))
        .collect()
}

/// Run `request` against `backend`.
///
/// Query construction errors are returned before any backend call. Backend
/// errors are passed through unchanged and never retried.
pub async fn execute<B: Backend + ?Sized>(
    request: &SearchRequest,
    backend: &B,
) -> Result<SearchOutcome, SearchError> {
    let fetches = plan(request)?;
    let owner = request.owner();

    let (records, total) = match fetches.as_slice() {
        [single] => {
            let page = fetch_kind(backend, single, owner, request.include_tags).await?;
            let total = page.total;
            (into_records(single.kind, page), total)
        }
        [first, second] => {
            let (a, b) = tokio::try_join!(
                fetch_kind(backend, first, owner, request.include_tags),
                fetch_kind(backend, second, owner, request.include_tags),
            )?;
            let total = a.total + b.total;
            let mut records = into_records(first.kind, a);
            records.extend(into_records(second.kind, b));
            (records, total)
        }
        _ => (Vec::new(), 0),
    };

    info!(
        scope = %request.scope,
        page = request.page,
        returned = records.len(),
        total,
        "search complete"
    );

    Ok(SearchOutcome {
        records,
        total,
        pagination: PaginationInfo::new(request.page, request.page_size, total),
        fetches,
    })
}
