//! Entities domain module: legal/individual entity records and their store.
//!
//! This crate contains the entity model and CRUD store only; cross-store
//! invariants (referential delete guards) and audit/event side effects are
//! orchestrated by the ledger facade.

pub mod entity;
pub mod store;

pub use entity::{Entity, EntityKind, EntityPatch, EntityQuery, NewEntity, RegistrationInfo};
pub use store::EntityStore;
