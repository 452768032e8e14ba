//! The ledger facade: single source of truth for entities, share classes
//! and ownership edges.
//!
//! Every mutation runs the same pipeline:
//!
//! ```text
//! validate (rule engine / guards)
//!   ↓
//! commit to exactly one store (optimistic version check)
//!   ↓
//! append AuditEntry
//!   ↓
//! save snapshot (when a SnapshotStore is attached)
//!   ↓
//! emit LedgerEvent
//! ```
//!
//! No event is observable before its audit entry has been appended, and no
//! partial state commits: validation completes before any store mutation.
//! Mutations serialize on one writer lock so the acyclicity check always
//! judges the graph it commits into; reads never take it.
//!
//! The facade is constructed explicitly by the hosting application and
//! passed by reference to all callers; there is no ambient global instance.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};
use uuid::Uuid;

use capledger_audit::{AuditAction, AuditEntry, AuditLog, AuditQuery};
use capledger_core::{
    ActorId, AuditEntryId, EntityId, ExpectedVersion, LedgerError, LedgerResult, OwnershipId,
    RecordKind, ShareClassId, ValidationReport,
};
use capledger_entities::{Entity, EntityPatch, EntityQuery, EntityStore, NewEntity};
use capledger_equity::{NewShareClass, ShareClass, ShareClassPatch, ShareClassStore};
use capledger_events::{LedgerEvent, ObserverBus, SubscriberId};
use capledger_ownership::{
    NewOwnership, Ownership, OwnershipPatch, OwnershipQuery, OwnershipStore, RuleContext,
    entity_delete_blockers, share_class_delete_blockers, validate_all,
};
use capledger_views::{CapTableView, OwnershipHierarchy, captable, hierarchy};

use crate::snapshot::{LedgerSnapshot, SnapshotStore};

/// Handle for one ledger subscription; call [`Subscription::unsubscribe`]
/// to stop receiving events.
#[derive(Debug)]
pub struct Subscription {
    bus: Arc<ObserverBus<LedgerEvent>>,
    id: SubscriberId,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn unsubscribe(self) {
        self.bus.unsubscribe(self.id);
    }
}

/// The unified ownership ledger.
pub struct Ledger {
    entities: EntityStore,
    share_classes: ShareClassStore,
    ownerships: OwnershipStore,
    audit: AuditLog,
    bus: Arc<ObserverBus<LedgerEvent>>,
    snapshots: Option<Arc<dyn SnapshotStore>>,
    /// Serializes mutations so validation always sees the state it commits
    /// against; reads never take this lock.
    write_serial: Mutex<()>,
}

impl core::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Ledger")
            .field("entities", &self.entities.len())
            .field("share_classes", &self.share_classes.len())
            .field("ownerships", &self.ownerships.len())
            .field("audit_entries", &self.audit.len())
            .finish()
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    /// An empty ledger with no persistence attached.
    pub fn new() -> Self {
        Self {
            entities: EntityStore::new(),
            share_classes: ShareClassStore::new(),
            ownerships: OwnershipStore::new(),
            audit: AuditLog::new(),
            bus: Arc::new(ObserverBus::new()),
            snapshots: None,
            write_serial: Mutex::new(()),
        }
    }

    /// A ledger backed by a snapshot store: loads existing state at startup
    /// and saves after every committed mutation.
    pub fn with_snapshot_store(store: Arc<dyn SnapshotStore>) -> LedgerResult<Self> {
        let ledger = Self::new();
        if let Some(snapshot) = store
            .load()
            .map_err(|e| LedgerError::persistence(e.to_string()))?
        {
            ledger.entities.restore(snapshot.entities);
            ledger.share_classes.restore(snapshot.share_classes);
            ledger.ownerships.restore(snapshot.ownerships);
            ledger.audit.restore(snapshot.audit);
            debug!(
                entities = ledger.entities.len(),
                ownerships = ledger.ownerships.len(),
                "ledger restored from snapshot"
            );
        }
        Ok(Self {
            snapshots: Some(store),
            ..ledger
        })
    }

    // ---------------------------------------------------------------
    // Entities
    // ---------------------------------------------------------------

    pub fn create_entity(
        &self,
        new: NewEntity,
        actor: ActorId,
        reason: Option<String>,
    ) -> LedgerResult<Entity> {
        let _guard = self.write_guard()?;
        let now = Utc::now();
        let entity = self.entities.insert(new, now)?;
        let new_state = to_state(&entity)?;

        self.commit(
            self.entry(
                now,
                actor,
                AuditAction::Create,
                RecordKind::Entity,
                *entity.id.as_uuid(),
                vec![entity.id],
                None,
                Some(new_state),
                reason,
                vec!["entity_name_required".to_string()],
            ),
            LedgerEvent::EntityCreated {
                entity_id: entity.id,
                occurred_at: now,
            },
        )?;
        Ok(entity)
    }

    pub fn update_entity(
        &self,
        id: EntityId,
        patch: EntityPatch,
        expected: ExpectedVersion,
        actor: ActorId,
        reason: Option<String>,
    ) -> LedgerResult<Entity> {
        let _guard = self.write_guard()?;
        let previous = self
            .entities
            .get(id)
            .ok_or_else(|| LedgerError::not_found(RecordKind::Entity, id))?;
        let previous_state = to_state(&previous)?;

        let now = Utc::now();
        let entity = self.entities.update(id, patch, expected, now)?;
        let new_state = to_state(&entity)?;

        self.commit(
            self.entry(
                now,
                actor,
                AuditAction::Update,
                RecordKind::Entity,
                *id.as_uuid(),
                vec![id],
                Some(previous_state),
                Some(new_state),
                reason,
                vec!["entity_name_required".to_string()],
            ),
            LedgerEvent::EntityUpdated {
                entity_id: id,
                occurred_at: now,
            },
        )?;
        Ok(entity)
    }

    pub fn delete_entity(
        &self,
        id: EntityId,
        expected: ExpectedVersion,
        actor: ActorId,
        reason: Option<String>,
    ) -> LedgerResult<Entity> {
        let _guard = self.write_guard()?;
        self.check_entity_deletion(id)?;

        let now = Utc::now();
        let entity = self.entities.remove(id, expected)?;
        let previous_state = to_state(&entity)?;

        self.commit(
            self.entry(
                now,
                actor,
                AuditAction::Delete,
                RecordKind::Entity,
                *id.as_uuid(),
                vec![id],
                Some(previous_state),
                None,
                reason,
                vec!["entity_not_referenced".to_string()],
            ),
            LedgerEvent::EntityDeleted {
                entity_id: id,
                occurred_at: now,
            },
        )?;
        Ok(entity)
    }

    pub fn entity(&self, id: EntityId) -> Option<Entity> {
        self.entities.get(id)
    }

    pub fn entities(&self) -> Vec<Entity> {
        self.entities.all()
    }

    pub fn search_entities(&self, query: &EntityQuery) -> Vec<Entity> {
        self.entities.search(query)
    }

    // ---------------------------------------------------------------
    // Share classes
    // ---------------------------------------------------------------

    pub fn create_share_class(
        &self,
        new: NewShareClass,
        actor: ActorId,
        reason: Option<String>,
    ) -> LedgerResult<ShareClass> {
        let _guard = self.write_guard()?;
        if !self.entities.contains(new.entity_id) {
            return Err(LedgerError::not_found(RecordKind::Entity, new.entity_id));
        }

        let now = Utc::now();
        let share_class = self.share_classes.insert(new, now)?;
        let new_state = to_state(&share_class)?;

        self.commit(
            self.entry(
                now,
                actor,
                AuditAction::Create,
                RecordKind::ShareClass,
                *share_class.id.as_uuid(),
                vec![share_class.entity_id],
                None,
                Some(new_state),
                reason,
                vec![
                    "entity_exists".to_string(),
                    "share_class_name_required".to_string(),
                    "authorized_shares_positive".to_string(),
                ],
            ),
            LedgerEvent::ShareClassCreated {
                share_class_id: share_class.id,
                entity_id: share_class.entity_id,
                occurred_at: now,
            },
        )?;
        Ok(share_class)
    }

    pub fn update_share_class(
        &self,
        id: ShareClassId,
        patch: ShareClassPatch,
        expected: ExpectedVersion,
        actor: ActorId,
        reason: Option<String>,
    ) -> LedgerResult<ShareClass> {
        let _guard = self.write_guard()?;
        let previous = self
            .share_classes
            .get(id)
            .ok_or_else(|| LedgerError::not_found(RecordKind::ShareClass, id))?;
        let previous_state = to_state(&previous)?;

        let now = Utc::now();
        let share_class = self.share_classes.update(id, patch, expected, now)?;
        let new_state = to_state(&share_class)?;

        self.commit(
            self.entry(
                now,
                actor,
                AuditAction::Update,
                RecordKind::ShareClass,
                *id.as_uuid(),
                vec![share_class.entity_id],
                Some(previous_state),
                Some(new_state),
                reason,
                vec![
                    "share_class_name_required".to_string(),
                    "authorized_shares_positive".to_string(),
                ],
            ),
            LedgerEvent::ShareClassUpdated {
                share_class_id: id,
                entity_id: share_class.entity_id,
                occurred_at: now,
            },
        )?;
        Ok(share_class)
    }

    pub fn delete_share_class(
        &self,
        id: ShareClassId,
        expected: ExpectedVersion,
        actor: ActorId,
        reason: Option<String>,
    ) -> LedgerResult<ShareClass> {
        let _guard = self.write_guard()?;
        self.check_share_class_deletion(id)?;

        let now = Utc::now();
        let share_class = self.share_classes.remove(id, expected)?;
        let previous_state = to_state(&share_class)?;

        self.commit(
            self.entry(
                now,
                actor,
                AuditAction::Delete,
                RecordKind::ShareClass,
                *id.as_uuid(),
                vec![share_class.entity_id],
                Some(previous_state),
                None,
                reason,
                vec!["share_class_not_referenced".to_string()],
            ),
            LedgerEvent::ShareClassDeleted {
                share_class_id: id,
                entity_id: share_class.entity_id,
                occurred_at: now,
            },
        )?;
        Ok(share_class)
    }

    pub fn share_class(&self, id: ShareClassId) -> Option<ShareClass> {
        self.share_classes.get(id)
    }

    pub fn share_classes_by_entity(&self, entity_id: EntityId) -> Vec<ShareClass> {
        self.share_classes.by_entity(entity_id)
    }

    // ---------------------------------------------------------------
    // Ownerships
    // ---------------------------------------------------------------

    pub fn create_ownership(&self, new: NewOwnership, actor: ActorId) -> LedgerResult<Ownership> {
        let _guard = self.write_guard()?;
        let now = Utc::now();
        let candidate = Ownership::from_new(new, actor, now);

        let report = self.run_rules(&candidate);
        if !report.is_valid() {
            warn!(
                owner = %candidate.owner_entity_id,
                owned = %candidate.owned_entity_id,
                failed = ?report.failed_rules(),
                "ownership create rejected"
            );
            return Err(rejection(&candidate, report));
        }

        let reason = candidate.change_reason.clone();
        let ownership = self.ownerships.insert(candidate)?;
        let new_state = to_state(&ownership)?;

        self.commit(
            self.entry(
                now,
                actor,
                AuditAction::Create,
                RecordKind::Ownership,
                *ownership.id.as_uuid(),
                vec![ownership.owner_entity_id, ownership.owned_entity_id],
                None,
                Some(new_state),
                reason,
                report.passed,
            ),
            LedgerEvent::OwnershipCreated {
                ownership_id: ownership.id,
                owner_entity_id: ownership.owner_entity_id,
                owned_entity_id: ownership.owned_entity_id,
                occurred_at: now,
            },
        )?;
        Ok(ownership)
    }

    pub fn update_ownership(
        &self,
        id: OwnershipId,
        patch: OwnershipPatch,
        expected: ExpectedVersion,
        actor: ActorId,
        reason: Option<String>,
    ) -> LedgerResult<Ownership> {
        let _guard = self.write_guard()?;
        let previous = self
            .ownerships
            .get(id)
            .ok_or_else(|| LedgerError::not_found(RecordKind::Ownership, id))?;
        let previous_state = to_state(&previous)?;

        let now = Utc::now();
        let mut candidate = previous.with_patch(patch, actor, now);
        if let Some(reason) = &reason {
            candidate.change_reason = Some(reason.clone());
        }

        let report = self.run_rules(&candidate);
        if !report.is_valid() {
            warn!(
                ownership = %id,
                failed = ?report.failed_rules(),
                "ownership update rejected"
            );
            return Err(rejection(&candidate, report));
        }

        let ownership = self.ownerships.replace(candidate, expected)?;
        let new_state = to_state(&ownership)?;

        let mut related = vec![
            ownership.owner_entity_id,
            ownership.owned_entity_id,
            previous.owner_entity_id,
            previous.owned_entity_id,
        ];
        related.sort();
        related.dedup();

        self.commit(
            self.entry(
                now,
                actor,
                AuditAction::Update,
                RecordKind::Ownership,
                *id.as_uuid(),
                related,
                Some(previous_state),
                Some(new_state),
                reason,
                report.passed,
            ),
            LedgerEvent::OwnershipUpdated {
                ownership_id: id,
                owner_entity_id: ownership.owner_entity_id,
                owned_entity_id: ownership.owned_entity_id,
                occurred_at: now,
            },
        )?;
        Ok(ownership)
    }

    pub fn delete_ownership(
        &self,
        id: OwnershipId,
        expected: ExpectedVersion,
        actor: ActorId,
        reason: Option<String>,
    ) -> LedgerResult<Ownership> {
        let _guard = self.write_guard()?;
        let now = Utc::now();
        let ownership = self.ownerships.remove(id, expected)?;
        let previous_state = to_state(&ownership)?;

        self.commit(
            self.entry(
                now,
                actor,
                AuditAction::Delete,
                RecordKind::Ownership,
                *id.as_uuid(),
                vec![ownership.owner_entity_id, ownership.owned_entity_id],
                Some(previous_state),
                None,
                reason,
                vec![],
            ),
            LedgerEvent::OwnershipDeleted {
                ownership_id: id,
                owner_entity_id: ownership.owner_entity_id,
                owned_entity_id: ownership.owned_entity_id,
                occurred_at: now,
            },
        )?;
        Ok(ownership)
    }

    pub fn ownership(&self, id: OwnershipId) -> Option<Ownership> {
        self.ownerships.get(id)
    }

    pub fn ownerships_by_entity(&self, entity_id: EntityId) -> Vec<Ownership> {
        self.ownerships.by_entity(entity_id)
    }

    pub fn query_ownerships(&self, query: &OwnershipQuery) -> Vec<Ownership> {
        self.ownerships.query(query)
    }

    // ---------------------------------------------------------------
    // Derived views (always computed fresh)
    // ---------------------------------------------------------------

    pub fn cap_table_view(&self, entity_id: EntityId) -> Option<CapTableView> {
        captable::compute(
            entity_id,
            &self.entities.snapshot(),
            &self.ownerships.snapshot(),
            &self.share_classes.snapshot(),
        )
    }

    pub fn ownership_hierarchy(&self) -> OwnershipHierarchy {
        hierarchy::build(&self.entities.snapshot(), &self.ownerships.snapshot())
    }

    // ---------------------------------------------------------------
    // Validation (dry runs; no state changes)
    // ---------------------------------------------------------------

    /// Would deleting the entity violate referential integrity?
    pub fn validate_entity_deletion(&self, id: EntityId) -> LedgerResult<()> {
        self.check_entity_deletion(id)
    }

    /// Would deleting the share class orphan ownership records?
    pub fn validate_share_class_deletion(&self, id: ShareClassId) -> LedgerResult<()> {
        self.check_share_class_deletion(id)
    }

    /// Run the full write-rule list against a candidate edge.
    pub fn validate_ownership_change(&self, candidate: &Ownership) -> ValidationReport {
        self.run_rules(candidate)
    }

    // ---------------------------------------------------------------
    // Audit & reactivity
    // ---------------------------------------------------------------

    pub fn audit_trail(&self, query: &AuditQuery) -> Vec<AuditEntry> {
        self.audit.query(query)
    }

    /// Subscribe to mutation events; delivery is synchronous and ordered.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&LedgerEvent) + Send + Sync + 'static,
    {
        Subscription {
            bus: Arc::clone(&self.bus),
            id: self.bus.subscribe(callback),
        }
    }

    // ---------------------------------------------------------------
    // Pipeline internals
    // ---------------------------------------------------------------

    fn write_guard(&self) -> LedgerResult<std::sync::MutexGuard<'_, ()>> {
        self.write_serial
            .lock()
            .map_err(|_| LedgerError::persistence("ledger write lock poisoned"))
    }

    fn run_rules(&self, candidate: &Ownership) -> ValidationReport {
        let entities = self.entities.snapshot();
        let ownerships = self.ownerships.snapshot();
        let share_classes = self.share_classes.snapshot();
        validate_all(&RuleContext {
            candidate,
            entities: &entities,
            ownerships: &ownerships,
            share_classes: &share_classes,
            today: Utc::now().date_naive(),
        })
    }

    fn check_entity_deletion(&self, id: EntityId) -> LedgerResult<()> {
        if !self.entities.contains(id) {
            return Err(LedgerError::not_found(RecordKind::Entity, id));
        }
        let blocking = entity_delete_blockers(id, &self.ownerships.snapshot());
        if blocking.is_empty() {
            Ok(())
        } else {
            Err(LedgerError::referential(RecordKind::Entity, id, blocking))
        }
    }

    fn check_share_class_deletion(&self, id: ShareClassId) -> LedgerResult<()> {
        if !self.share_classes.contains(id) {
            return Err(LedgerError::not_found(RecordKind::ShareClass, id));
        }
        let blocking = share_class_delete_blockers(id, &self.ownerships.snapshot());
        if blocking.is_empty() {
            Ok(())
        } else {
            Err(LedgerError::referential(RecordKind::ShareClass, id, blocking))
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn entry(
        &self,
        recorded_at: DateTime<Utc>,
        actor: ActorId,
        action: AuditAction,
        target_kind: RecordKind,
        target_id: Uuid,
        related_entity_ids: Vec<EntityId>,
        previous_state: Option<JsonValue>,
        new_state: Option<JsonValue>,
        change_reason: Option<String>,
        rules_passed: Vec<String>,
    ) -> AuditEntry {
        AuditEntry {
            id: AuditEntryId::new(),
            recorded_at,
            actor,
            action,
            target_kind,
            target_id,
            related_entity_ids,
            previous_state,
            new_state,
            change_reason,
            rules_passed,
        }
    }

    /// Audit append → snapshot save → event emission, in that order.
    fn commit(&self, entry: AuditEntry, event: LedgerEvent) -> LedgerResult<()> {
        self.audit.append(entry);
        self.persist()?;
        self.bus.emit(&event);
        Ok(())
    }

    fn persist(&self) -> LedgerResult<()> {
        let Some(store) = &self.snapshots else {
            return Ok(());
        };
        let snapshot = LedgerSnapshot {
            entities: self.entities.snapshot(),
            share_classes: self.share_classes.snapshot(),
            ownerships: self.ownerships.snapshot(),
            audit: self.audit.snapshot(),
        };
        store
            .save(&snapshot)
            .map_err(|e| LedgerError::persistence(e.to_string()))
    }
}

fn to_state<T: Serialize>(record: &T) -> LedgerResult<JsonValue> {
    serde_json::to_value(record)
        .map_err(|e| LedgerError::persistence(format!("audit state serialization failed: {e}")))
}

/// Map a failed report to the error surface: a lone circular-ownership
/// failure gets its specialized variant for diagnostics.
fn rejection(candidate: &Ownership, report: ValidationReport) -> LedgerError {
    if report.errors.len() == 1 && report.errors[0].rule == "no_circular_ownership" {
        LedgerError::circular(candidate.owner_entity_id, candidate.owned_entity_id)
    } else {
        LedgerError::validation(report)
    }
}
