use foundation::ObjectId;
use thiserror::Error;

/// Failures surfaced by an object store backend.
///
/// Store failures are local to one fetch or one query; they never abort
/// anything beyond the request that hit them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("object {0} not found")]
    NotFound(ObjectId),
    #[error("backend error: {0}")]
    Backend(String),
}
