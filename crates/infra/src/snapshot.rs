//! Persistence seam: synchronous snapshot load/save of the record maps.
//!
//! The ledger does not assume any storage medium or schema beyond "map of
//! id → record, each with a version integer". Hosts implement
//! [`SnapshotStore`] over whatever they have (file, browser store,
//! database); the bundled in-memory implementation serves tests/dev.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use capledger_audit::AuditEntry;
use capledger_core::{EntityId, OwnershipId, ShareClassId};
use capledger_entities::Entity;
use capledger_equity::ShareClass;
use capledger_ownership::Ownership;

/// Full persistable state of the ledger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub entities: HashMap<EntityId, Entity>,
    pub share_classes: HashMap<ShareClassId, ShareClass>,
    pub ownerships: HashMap<OwnershipId, Ownership>,
    pub audit: Vec<AuditEntry>,
}

/// Snapshot persistence error.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot serialization failed: {0}")]
    Serialization(String),

    #[error("snapshot storage failed: {0}")]
    Storage(String),
}

/// Synchronous snapshot persistence collaborator.
///
/// `save` is called after each committed mutation; `load` once at startup.
pub trait SnapshotStore: Send + Sync {
    fn load(&self) -> Result<Option<LedgerSnapshot>, SnapshotError>;
    fn save(&self, snapshot: &LedgerSnapshot) -> Result<(), SnapshotError>;
}

impl<S> SnapshotStore for Arc<S>
where
    S: SnapshotStore + ?Sized,
{
    fn load(&self) -> Result<Option<LedgerSnapshot>, SnapshotError> {
        (**self).load()
    }

    fn save(&self, snapshot: &LedgerSnapshot) -> Result<(), SnapshotError> {
        (**self).save(snapshot)
    }
}

/// In-memory snapshot store.
///
/// Intended for tests/dev. Round-trips the snapshot through JSON so the
/// serialized shape stays honest with what a real medium would persist.
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    slot: RwLock<Option<serde_json::Value>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    fn load(&self) -> Result<Option<LedgerSnapshot>, SnapshotError> {
        let slot = self
            .slot
            .read()
            .map_err(|_| SnapshotError::Storage("snapshot slot lock poisoned".to_string()))?;

        match slot.as_ref() {
            None => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| SnapshotError::Serialization(e.to_string())),
        }
    }

    fn save(&self, snapshot: &LedgerSnapshot) -> Result<(), SnapshotError> {
        let value = serde_json::to_value(snapshot)
            .map_err(|e| SnapshotError::Serialization(e.to_string()))?;
        let mut slot = self
            .slot
            .write()
            .map_err(|_| SnapshotError::Storage("snapshot slot lock poisoned".to_string()))?;
        *slot = Some(value);
        Ok(())
    }
}
