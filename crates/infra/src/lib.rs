//! Orchestration and persistence for the unified ownership ledger.
//!
//! Hosts construct one [`Ledger`] (optionally backed by a [`SnapshotStore`])
//! and hand it to every collaborator; it composes the stores, the rule
//! engine, the audit trail and the event bus into a single write pipeline.

pub mod ledger;
pub mod snapshot;

pub use ledger::{Ledger, Subscription};
pub use snapshot::{InMemorySnapshotStore, LedgerSnapshot, SnapshotError, SnapshotStore};
