//! In-memory share-class store with optimistic-concurrency writes.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use tracing::debug;

use capledger_core::{
    EntityId, ExpectedVersion, LedgerError, LedgerResult, RecordKind, RuleViolation,
    ShareClassId, ValidationReport,
};

use crate::share_class::{NewShareClass, ShareClass, ShareClassPatch};

fn local_report(rule: &str, message: &str) -> ValidationReport {
    let mut report = ValidationReport::new();
    report.push(RuleViolation::error(rule, message));
    report
}

/// CRUD store for share classes, scoped by owning entity.
///
/// The delete guard against ownerships referencing a class runs in the
/// ledger facade before [`ShareClassStore::remove`] is reached.
#[derive(Debug, Default)]
pub struct ShareClassStore {
    records: RwLock<HashMap<ShareClassId, ShareClass>>,
}

impl ShareClassStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a share class: assigns a fresh id, version 1.
    pub fn insert(
        &self,
        new: NewShareClass,
        occurred_at: DateTime<Utc>,
    ) -> LedgerResult<ShareClass> {
        if new.name.trim().is_empty() {
            return Err(LedgerError::validation(local_report(
                "share_class_name_required",
                "share class name cannot be empty",
            )));
        }
        if new.total_authorized_shares == 0 {
            return Err(LedgerError::validation(local_report(
                "authorized_shares_positive",
                "total authorized shares must be greater than zero",
            )));
        }

        let share_class = ShareClass {
            id: ShareClassId::new(),
            entity_id: new.entity_id,
            name: new.name,
            kind: new.kind,
            series: new.series,
            total_authorized_shares: new.total_authorized_shares,
            voting_rights: new.voting_rights,
            liquidation_preference: new.liquidation_preference,
            dividend_rate: new.dividend_rate,
            version: 1,
            created_at: occurred_at,
            updated_at: occurred_at,
        };

        let mut records = self
            .records
            .write()
            .map_err(|_| LedgerError::persistence("share class store lock poisoned"))?;
        records.insert(share_class.id, share_class.clone());
        debug!(share_class = %share_class.id, entity = %share_class.entity_id, "share class created");
        Ok(share_class)
    }

    /// Merge a patch into an existing class, bumping its version.
    pub fn update(
        &self,
        id: ShareClassId,
        patch: ShareClassPatch,
        expected: ExpectedVersion,
        occurred_at: DateTime<Utc>,
    ) -> LedgerResult<ShareClass> {
        if let Some(name) = &patch.name {
            if name.trim().is_empty() {
                return Err(LedgerError::validation(local_report(
                    "share_class_name_required",
                    "share class name cannot be empty",
                )));
            }
        }
        if patch.total_authorized_shares == Some(0) {
            return Err(LedgerError::validation(local_report(
                "authorized_shares_positive",
                "total authorized shares must be greater than zero",
            )));
        }

        let mut records = self
            .records
            .write()
            .map_err(|_| LedgerError::persistence("share class store lock poisoned"))?;
        let share_class = records
            .get_mut(&id)
            .ok_or_else(|| LedgerError::not_found(RecordKind::ShareClass, id))?;

        expected.check(share_class.version)?;

        if let Some(name) = patch.name {
            share_class.name = name;
        }
        if let Some(kind) = patch.kind {
            share_class.kind = kind;
        }
        if let Some(series) = patch.series {
            share_class.series = Some(series);
        }
        if let Some(authorized) = patch.total_authorized_shares {
            share_class.total_authorized_shares = authorized;
        }
        if let Some(voting) = patch.voting_rights {
            share_class.voting_rights = voting;
        }
        if let Some(preference) = patch.liquidation_preference {
            share_class.liquidation_preference = Some(preference);
        }
        if let Some(rate) = patch.dividend_rate {
            share_class.dividend_rate = Some(rate);
        }
        share_class.version += 1;
        share_class.updated_at = occurred_at;

        debug!(share_class = %id, version = share_class.version, "share class updated");
        Ok(share_class.clone())
    }

    /// Remove a class, returning the removed record.
    pub fn remove(&self, id: ShareClassId, expected: ExpectedVersion) -> LedgerResult<ShareClass> {
        let mut records = self
            .records
            .write()
            .map_err(|_| LedgerError::persistence("share class store lock poisoned"))?;
        let share_class = records
            .get(&id)
            .ok_or_else(|| LedgerError::not_found(RecordKind::ShareClass, id))?;

        expected.check(share_class.version)?;

        let removed = records.remove(&id);
        debug!(share_class = %id, "share class deleted");
        removed.ok_or_else(|| LedgerError::not_found(RecordKind::ShareClass, id))
    }

    pub fn get(&self, id: ShareClassId) -> Option<ShareClass> {
        let records = self.records.read().ok()?;
        records.get(&id).cloned()
    }

    pub fn contains(&self, id: ShareClassId) -> bool {
        self.records
            .read()
            .map(|r| r.contains_key(&id))
            .unwrap_or(false)
    }

    /// All classes issued by one entity, ordered by id.
    pub fn by_entity(&self, entity_id: EntityId) -> Vec<ShareClass> {
        let mut classes: Vec<ShareClass> = match self.records.read() {
            Ok(records) => records
                .values()
                .filter(|c| c.entity_id == entity_id)
                .cloned()
                .collect(),
            Err(_) => vec![],
        };
        classes.sort_by_key(|c| c.id);
        classes
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Full copy of the record map for validation contexts and snapshots.
    pub fn snapshot(&self) -> HashMap<ShareClassId, ShareClass> {
        self.records.read().map(|r| r.clone()).unwrap_or_default()
    }

    /// Replace the record map with a persisted snapshot (startup only).
    pub fn restore(&self, records: HashMap<ShareClassId, ShareClass>) {
        if let Ok(mut current) = self.records.write() {
            *current = records;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::share_class::ShareClassKind;

    #[test]
    fn insert_assigns_id_and_version_one() {
        let store = ShareClassStore::new();
        let entity = EntityId::new();
        let class = store
            .insert(
                NewShareClass::new(entity, "Common", ShareClassKind::Common, 10_000),
                Utc::now(),
            )
            .unwrap();

        assert_eq!(class.version, 1);
        assert_eq!(class.entity_id, entity);
        assert!(class.voting_rights);
    }

    #[test]
    fn insert_rejects_zero_authorized_shares() {
        let store = ShareClassStore::new();
        let err = store
            .insert(
                NewShareClass::new(EntityId::new(), "Options", ShareClassKind::Options, 0),
                Utc::now(),
            )
            .unwrap_err();
        match err {
            LedgerError::Validation(report) => {
                assert_eq!(report.failed_rules(), vec!["authorized_shares_positive"]);
            }
            other => panic!("expected Validation error, got {other:?}"),
        }
    }

    #[test]
    fn update_cannot_zero_out_authorized_shares() {
        let store = ShareClassStore::new();
        let class = store
            .insert(
                NewShareClass::new(EntityId::new(), "Common", ShareClassKind::Common, 100),
                Utc::now(),
            )
            .unwrap();

        let err = store
            .update(
                class.id,
                ShareClassPatch {
                    total_authorized_shares: Some(0),
                    ..ShareClassPatch::default()
                },
                ExpectedVersion::Exact(1),
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
        assert_eq!(store.get(class.id).unwrap().total_authorized_shares, 100);
    }

    #[test]
    fn by_entity_scopes_listing() {
        let store = ShareClassStore::new();
        let a = EntityId::new();
        let b = EntityId::new();
        store
            .insert(NewShareClass::new(a, "Common", ShareClassKind::Common, 100), Utc::now())
            .unwrap();
        store
            .insert(
                NewShareClass::new(a, "Series A", ShareClassKind::Preferred, 50),
                Utc::now(),
            )
            .unwrap();
        store
            .insert(NewShareClass::new(b, "Common", ShareClassKind::Common, 10), Utc::now())
            .unwrap();

        assert_eq!(store.by_entity(a).len(), 2);
        assert_eq!(store.by_entity(b).len(), 1);
    }

    #[test]
    fn stale_version_conflicts() {
        let store = ShareClassStore::new();
        let class = store
            .insert(
                NewShareClass::new(EntityId::new(), "Common", ShareClassKind::Common, 100),
                Utc::now(),
            )
            .unwrap();

        store
            .update(
                class.id,
                ShareClassPatch {
                    total_authorized_shares: Some(200),
                    ..ShareClassPatch::default()
                },
                ExpectedVersion::Exact(1),
                Utc::now(),
            )
            .unwrap();

        let err = store
            .remove(class.id, ExpectedVersion::Exact(1))
            .unwrap_err();
        assert_eq!(err, LedgerError::Conflict { expected: 1, found: 2 });
    }
}
