//! Ownership domain module: the edge store, the ownership graph and the
//! business-rule engine that guards every write.

pub mod graph;
pub mod ownership;
pub mod rules;
pub mod store;

pub use graph::OwnershipGraph;
pub use ownership::{NewOwnership, Ownership, OwnershipPatch, OwnershipQuery};
pub use rules::{
    Rule, RuleContext, entity_delete_blockers, share_class_delete_blockers, validate_all,
    validate_rule,
};
pub use store::OwnershipStore;
