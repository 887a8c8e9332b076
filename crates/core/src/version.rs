//! Optimistic concurrency expectations for entity store writes.

use crate::error::{TraceError, TraceResult};

/// The version a writer expects the stored record to be at.
///
/// Callers read a record, mutate a copy, and present the version they read
/// when writing back. A mismatch means another operation committed in
/// between; the store reports `Conflict` and the caller aborts or retries.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip version checking (first insert of a new record, repairs).
    Any,
    /// Require the record to be at an exact version.
    Exact(u64),
}

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }

    pub fn check(self, actual: u64) -> TraceResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(TraceError::conflict(format!(
                "optimistic concurrency check failed (expected: {self:?}, actual: {actual})"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_matches_everything() {
        assert!(ExpectedVersion::Any.matches(0));
        assert!(ExpectedVersion::Any.matches(42));
    }

    #[test]
    fn exact_requires_equality() {
        assert!(ExpectedVersion::Exact(3).matches(3));
        assert!(!ExpectedVersion::Exact(3).matches(4));
        assert!(matches!(
            ExpectedVersion::Exact(3).check(4),
            Err(TraceError::Conflict(_))
        ));
    }
}
