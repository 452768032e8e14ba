//! Ledger error model.

use thiserror::Error;
use uuid::Uuid;

use crate::id::{EntityId, OwnershipId};
use crate::record::RecordKind;
use crate::validation::ValidationReport;

/// Result type used across the ledger.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Ledger-level error.
///
/// Keep this focused on deterministic domain failures (validation,
/// referential integrity, conflicts). Every variant identifies the specific
/// rule(s) or record(s) involved so callers can translate it for users.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// One or more business rules failed; carries the full report.
    #[error("validation failed: {0}")]
    Validation(ValidationReport),

    /// A referenced record does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: RecordKind, id: Uuid },

    /// A delete was blocked by ownership records referencing the target.
    #[error("cannot delete {kind} {id}: referenced by {} ownership record(s)", blocking.len())]
    ReferentialIntegrity {
        kind: RecordKind,
        id: Uuid,
        /// Ids of the ownership edges blocking the delete.
        blocking: Vec<OwnershipId>,
    },

    /// Stale version on update/delete (optimistic concurrency).
    #[error("conflict: expected version {expected}, found {found}")]
    Conflict { expected: u64, found: u64 },

    /// The write would create a directed cycle in the ownership graph.
    #[error("circular ownership: {owned} already reaches {owner}")]
    CircularOwnership { owner: EntityId, owned: EntityId },

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The persistence collaborator failed after an in-memory commit.
    #[error("persistence failed: {0}")]
    Persistence(String),
}

impl LedgerError {
    pub fn validation(report: ValidationReport) -> Self {
        Self::Validation(report)
    }

    pub fn not_found(kind: RecordKind, id: impl Into<Uuid>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn referential(
        kind: RecordKind,
        id: impl Into<Uuid>,
        blocking: Vec<OwnershipId>,
    ) -> Self {
        Self::ReferentialIntegrity {
            kind,
            id: id.into(),
            blocking,
        }
    }

    pub fn conflict(expected: u64, found: u64) -> Self {
        Self::Conflict { expected, found }
    }

    pub fn circular(owner: EntityId, owned: EntityId) -> Self {
        Self::CircularOwnership { owner, owned }
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }
}
