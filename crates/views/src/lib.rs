//! Derived read models computed fresh from store snapshots.
//!
//! Both views are pure functions; the ledger never caches them.

pub mod captable;
pub mod hierarchy;

pub use captable::{CapTableView, OwnershipSummary, ShareClassSummary};
pub use hierarchy::{EntityNode, OwnershipHierarchy};
