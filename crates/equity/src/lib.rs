//! Equity domain module: share classes and their store.

pub mod share_class;
pub mod store;

pub use share_class::{NewShareClass, ShareClass, ShareClassKind, ShareClassPatch};
pub use store::ShareClassStore;
