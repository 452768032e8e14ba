//! In-memory entity store with optimistic-concurrency writes.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use tracing::debug;

use capledger_core::{
    EntityId, ExpectedVersion, LedgerError, LedgerResult, RecordKind, RuleViolation,
    ValidationReport,
};

use crate::entity::{Entity, EntityPatch, EntityQuery, NewEntity};

fn blank_name_report() -> ValidationReport {
    let mut report = ValidationReport::new();
    report.push(RuleViolation::error(
        "entity_name_required",
        "entity name cannot be empty",
    ));
    report
}

/// CRUD store for entities.
///
/// Holds only the records; the cross-store referential guard for deletes
/// lives in the ledger facade, which consults the ownership store before
/// calling [`EntityStore::remove`].
#[derive(Debug, Default)]
pub struct EntityStore {
    records: RwLock<HashMap<EntityId, Entity>>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an entity: assigns a fresh id, version 1.
    pub fn insert(&self, new: NewEntity, occurred_at: DateTime<Utc>) -> LedgerResult<Entity> {
        if new.name.trim().is_empty() {
            return Err(LedgerError::validation(blank_name_report()));
        }

        let entity = Entity {
            id: EntityId::new(),
            name: new.name,
            kind: new.kind,
            jurisdiction: new.jurisdiction,
            registration: new.registration,
            metadata: new.metadata,
            version: 1,
            created_at: occurred_at,
            updated_at: occurred_at,
        };

        let mut records = self
            .records
            .write()
            .map_err(|_| LedgerError::persistence("entity store lock poisoned"))?;
        records.insert(entity.id, entity.clone());
        debug!(entity = %entity.id, "entity created");
        Ok(entity)
    }

    /// Merge a patch into an existing entity, bumping its version.
    pub fn update(
        &self,
        id: EntityId,
        patch: EntityPatch,
        expected: ExpectedVersion,
        occurred_at: DateTime<Utc>,
    ) -> LedgerResult<Entity> {
        if let Some(name) = &patch.name {
            if name.trim().is_empty() {
                return Err(LedgerError::validation(blank_name_report()));
            }
        }

        let mut records = self
            .records
            .write()
            .map_err(|_| LedgerError::persistence("entity store lock poisoned"))?;
        let entity = records
            .get_mut(&id)
            .ok_or_else(|| LedgerError::not_found(RecordKind::Entity, id))?;

        expected.check(entity.version)?;

        if let Some(name) = patch.name {
            entity.name = name;
        }
        if let Some(kind) = patch.kind {
            entity.kind = kind;
        }
        if let Some(jurisdiction) = patch.jurisdiction {
            entity.jurisdiction = Some(jurisdiction);
        }
        if let Some(registration) = patch.registration {
            entity.registration = Some(registration);
        }
        if let Some(metadata) = patch.metadata {
            entity.metadata = metadata;
        }
        entity.version += 1;
        entity.updated_at = occurred_at;

        debug!(entity = %id, version = entity.version, "entity updated");
        Ok(entity.clone())
    }

    /// Remove an entity, returning the removed record.
    pub fn remove(&self, id: EntityId, expected: ExpectedVersion) -> LedgerResult<Entity> {
        let mut records = self
            .records
            .write()
            .map_err(|_| LedgerError::persistence("entity store lock poisoned"))?;
        let entity = records
            .get(&id)
            .ok_or_else(|| LedgerError::not_found(RecordKind::Entity, id))?;

        expected.check(entity.version)?;

        let removed = records.remove(&id);
        debug!(entity = %id, "entity deleted");
        removed.ok_or_else(|| LedgerError::not_found(RecordKind::Entity, id))
    }

    pub fn get(&self, id: EntityId) -> Option<Entity> {
        let records = self.records.read().ok()?;
        records.get(&id).cloned()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.records
            .read()
            .map(|r| r.contains_key(&id))
            .unwrap_or(false)
    }

    /// All entities, ordered by id (time-ordered for UUIDv7).
    pub fn all(&self) -> Vec<Entity> {
        let records = match self.records.read() {
            Ok(r) => r,
            Err(_) => return vec![],
        };
        let mut entities: Vec<Entity> = records.values().cloned().collect();
        entities.sort_by_key(|e| e.id);
        entities
    }

    /// Entities matching the filter, ordered by id.
    pub fn search(&self, query: &EntityQuery) -> Vec<Entity> {
        let mut hits: Vec<Entity> = match self.records.read() {
            Ok(records) => records
                .values()
                .filter(|e| e.matches(query))
                .cloned()
                .collect(),
            Err(_) => vec![],
        };
        hits.sort_by_key(|e| e.id);
        hits
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Full copy of the record map for validation contexts and snapshots.
    pub fn snapshot(&self) -> HashMap<EntityId, Entity> {
        self.records.read().map(|r| r.clone()).unwrap_or_default()
    }

    /// Replace the record map with a persisted snapshot (startup only).
    pub fn restore(&self, records: HashMap<EntityId, Entity>) {
        if let Ok(mut current) = self.records.write() {
            *current = records;
        }
    }
}
