//! In-memory ownership-edge store with optimistic-concurrency writes.
//!
//! The store is deliberately rule-free: candidates arrive already validated
//! by the rule engine (the facade assembles the context), and the store only
//! enforces identity, version checks and append/replace/remove mechanics.

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::debug;

use capledger_core::{
    EntityId, ExpectedVersion, LedgerError, LedgerResult, OwnershipId, RecordKind, ShareClassId,
};

use crate::ownership::{Ownership, OwnershipQuery};

#[derive(Debug, Default)]
pub struct OwnershipStore {
    records: RwLock<HashMap<OwnershipId, Ownership>>,
}

impl OwnershipStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit a freshly-created edge (version 1, id assigned by the caller).
    pub fn insert(&self, ownership: Ownership) -> LedgerResult<Ownership> {
        let mut records = self
            .records
            .write()
            .map_err(|_| LedgerError::persistence("ownership store lock poisoned"))?;
        if records.contains_key(&ownership.id) {
            return Err(LedgerError::invalid_id(format!(
                "duplicate ownership id {}",
                ownership.id
            )));
        }
        debug!(
            ownership = %ownership.id,
            owner = %ownership.owner_entity_id,
            owned = %ownership.owned_entity_id,
            "ownership created"
        );
        records.insert(ownership.id, ownership.clone());
        Ok(ownership)
    }

    /// Commit a validated update candidate, bumping the stored version.
    pub fn replace(
        &self,
        candidate: Ownership,
        expected: ExpectedVersion,
    ) -> LedgerResult<Ownership> {
        let mut records = self
            .records
            .write()
            .map_err(|_| LedgerError::persistence("ownership store lock poisoned"))?;
        let current = records
            .get(&candidate.id)
            .ok_or_else(|| LedgerError::not_found(RecordKind::Ownership, candidate.id))?;

        expected.check(current.version)?;

        let mut committed = candidate;
        committed.version = current.version + 1;
        debug!(ownership = %committed.id, version = committed.version, "ownership updated");
        records.insert(committed.id, committed.clone());
        Ok(committed)
    }

    /// Remove an edge, returning the removed record.
    pub fn remove(&self, id: OwnershipId, expected: ExpectedVersion) -> LedgerResult<Ownership> {
        let mut records = self
            .records
            .write()
            .map_err(|_| LedgerError::persistence("ownership store lock poisoned"))?;
        let current = records
            .get(&id)
            .ok_or_else(|| LedgerError::not_found(RecordKind::Ownership, id))?;

        expected.check(current.version)?;

        let removed = records.remove(&id);
        debug!(ownership = %id, "ownership deleted");
        removed.ok_or_else(|| LedgerError::not_found(RecordKind::Ownership, id))
    }

    pub fn get(&self, id: OwnershipId) -> Option<Ownership> {
        let records = self.records.read().ok()?;
        records.get(&id).cloned()
    }

    /// All edges, ordered by id (time-ordered for UUIDv7).
    pub fn all(&self) -> Vec<Ownership> {
        let records = match self.records.read() {
            Ok(r) => r,
            Err(_) => return vec![],
        };
        let mut edges: Vec<Ownership> = records.values().cloned().collect();
        edges.sort_by_key(|o| o.id);
        edges
    }

    /// Edges matching the filter, ordered by id.
    pub fn query(&self, query: &OwnershipQuery) -> Vec<Ownership> {
        let mut edges: Vec<Ownership> = match self.records.read() {
            Ok(records) => records
                .values()
                .filter(|o| o.matches(query))
                .cloned()
                .collect(),
            Err(_) => vec![],
        };
        edges.sort_by_key(|o| o.id);
        edges
    }

    /// Edges where the entity appears as owner OR owned, ordered by id.
    pub fn by_entity(&self, entity_id: EntityId) -> Vec<Ownership> {
        let mut edges: Vec<Ownership> = match self.records.read() {
            Ok(records) => records
                .values()
                .filter(|o| o.involves(entity_id))
                .cloned()
                .collect(),
            Err(_) => vec![],
        };
        edges.sort_by_key(|o| o.id);
        edges
    }

    /// Ids of edges touching the entity (delete-guard support).
    pub fn referencing_entity(&self, entity_id: EntityId) -> Vec<OwnershipId> {
        self.by_entity(entity_id).into_iter().map(|o| o.id).collect()
    }

    /// Ids of edges issued in the share class (delete-guard support).
    pub fn referencing_share_class(&self, share_class_id: ShareClassId) -> Vec<OwnershipId> {
        let mut ids: Vec<OwnershipId> = match self.records.read() {
            Ok(records) => records
                .values()
                .filter(|o| o.share_class_id == share_class_id)
                .map(|o| o.id)
                .collect(),
            Err(_) => vec![],
        };
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Full copy of the record map for validation contexts and snapshots.
    pub fn snapshot(&self) -> HashMap<OwnershipId, Ownership> {
        self.records.read().map(|r| r.clone()).unwrap_or_default()
    }

    /// Replace the record map with a persisted snapshot (startup only).
    pub fn restore(&self, records: HashMap<OwnershipId, Ownership>) {
        if let Ok(mut current) = self.records.write() {
            *current = records;
        }
    }
}
