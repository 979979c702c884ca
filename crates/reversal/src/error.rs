use thiserror::Error;

use payrev_core::DomainError;
use payrev_infra::{LockError, StoreError};

/// Whole-call failure. Raised before any allocation is touched.
///
/// Per-allocation failures during execution never surface here; they are
/// reported as [`ReversalOutcome::Error`](crate::ReversalOutcome::Error).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReversalError {
    #[error("invalid reversal reason: {0}")]
    InvalidReason(String),

    #[error("no allocations found for the requested ids")]
    NoAllocationsFound,

    /// Reading the current state failed before anything was mutated.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Projected amounts left the representable range.
    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Why a single allocation could not be reversed.
#[derive(Debug, Error)]
pub(crate) enum ItemFailure {
    #[error("allocation not found")]
    AllocationMissing,

    #[error("{0} not found")]
    RecordMissing(String),

    #[error("lock timeout: {0}")]
    Lock(#[from] LockError),

    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),

    #[error("integrity error: {0}")]
    Integrity(#[from] DomainError),
}
