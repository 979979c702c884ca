//! Aggregate root trait + optimistic concurrency expectations.

use crate::error::{DomainError, DomainResult};

/// A persisted record with identity and a monotonically increasing version.
///
/// Every mutation of a ledger record bumps its version by one, so a writer can
/// detect that the row changed between its read and its write.
pub trait AggregateRoot {
    /// Strongly-typed identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the record identifier.
    fn id(&self) -> &Self::Id;

    /// Number of mutations applied since the record was created.
    fn version(&self) -> u64;
}

/// Optimistic concurrency expectation for a single row write.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip version checking (inserts, fixtures).
    Any,
    /// Require the stored row to be at an exact version.
    Exact(u64),
}

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }

    pub fn check(self, actual: u64) -> DomainResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(DomainError::conflict(format!(
                "stale write (expected: {self:?}, actual: {actual})"
            )))
        }
    }

    /// Expectation for the row `record` was read from.
    pub fn of<A: AggregateRoot>(record: &A) -> Self {
        ExpectedVersion::Exact(record.version())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_expectation_rejects_other_versions() {
        assert!(ExpectedVersion::Exact(3).check(3).is_ok());
        assert!(matches!(
            ExpectedVersion::Exact(3).check(4),
            Err(DomainError::Conflict(_))
        ));
        assert!(ExpectedVersion::Any.matches(42));
    }
}
