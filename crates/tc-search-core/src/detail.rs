//! Detail lookup for a single record.
//!
//! [`fetch_detail`] loads the record and its associations concurrently.
//! Either failure fails the lookup, the same way a combined-scope search
//! does.

use serde::Serialize;
use tracing::debug;

use crate::backend::{Backend, BackendError};
use crate::models::{Associations, Record, RecordKind};

/// One record with the groups and indicators linked to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordDetail {
    pub record: Record,
    pub associations: Associations,
}

pub async fn fetch_detail<B: Backend + ?Sized>(
    backend: &B,
    kind: RecordKind,
    id: i64,
) -> Result<RecordDetail, BackendError> {
    debug!(%kind, id, "fetching detail");
    let (raw, associations) = tokio::try_join!(
        backend.fetch_one(kind, id),
        backend.fetch_associations(kind, id),
    )?;
    Ok(RecordDetail {
        record: Record::from_raw(kind, raw),
        associations,
    })
}
