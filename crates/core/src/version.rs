//! Optimistic concurrency expectations.

use crate::error::{LedgerError, LedgerResult};

/// Optimistic concurrency expectation for a record mutation.
///
/// Callers that read a record at version `n` pass `Exact(n)` with their
/// update; if the stored version has advanced since, the mutation fails with
/// a conflict and nothing is written. `Any` re-reads implicitly and skips
/// the check (idempotent maintenance operations, migrations).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip version checking.
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

    pub fn check(self, actual: u64) -> LedgerResult<()> {
        match self {
            ExpectedVersion::Any => Ok(()),
            ExpectedVersion::Exact(v) if v == actual => Ok(()),
            ExpectedVersion::Exact(v) => Err(LedgerError::conflict(v, actual)),
        }
    }
}
