//! Record trait: identity + optimistic-concurrency version.

use serde::{Deserialize, Serialize};

/// Kind of record a mutation or audit entry targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Entity,
    ShareClass,
    Ownership,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Entity => "entity",
            RecordKind::ShareClass => "share_class",
            RecordKind::Ownership => "ownership",
        }
    }
}

impl core::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Versioned record marker + minimal interface.
///
/// Every mutable ledger record carries a monotonically increasing `version`
/// (starting at 1) used for optimistic concurrency checks.
pub trait Record {
    /// Strongly-typed record identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the record identifier.
    fn id(&self) -> &Self::Id;

    /// Version of the record's state, incremented on every committed update.
    fn version(&self) -> u64;
}
