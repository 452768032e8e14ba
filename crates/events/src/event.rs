use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use capledger_core::{EntityId, OwnershipId, ShareClassId};

/// A ledger-agnostic event.
///
/// Events are:
/// - **immutable** (treat them as facts)
/// - **versioned** (schema evolution)
/// - emitted only after the corresponding audit entry is appended
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name/type identifier (e.g. "entity.created").
    fn event_type(&self) -> &'static str;

    /// Schema version for this event type.
    fn version(&self) -> u32;

    /// When the mutation occurred (business time).
    fn occurred_at(&self) -> DateTime<Utc>;
}

/// Notification emitted after every committed ledger mutation.
///
/// Carries record ids only; subscribers that need full state read it back
/// through the ledger, which is the single source of truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    EntityCreated {
        entity_id: EntityId,
        occurred_at: DateTime<Utc>,
    },
    EntityUpdated {
        entity_id: EntityId,
        occurred_at: DateTime<Utc>,
    },
    EntityDeleted {
        entity_id: EntityId,
        occurred_at: DateTime<Utc>,
    },
    ShareClassCreated {
        share_class_id: ShareClassId,
        entity_id: EntityId,
        occurred_at: DateTime<Utc>,
    },
    ShareClassUpdated {
        share_class_id: ShareClassId,
        entity_id: EntityId,
        occurred_at: DateTime<Utc>,
    },
    ShareClassDeleted {
        share_class_id: ShareClassId,
        entity_id: EntityId,
        occurred_at: DateTime<Utc>,
    },
    OwnershipCreated {
        ownership_id: OwnershipId,
        owner_entity_id: EntityId,
        owned_entity_id: EntityId,
        occurred_at: DateTime<Utc>,
    },
    OwnershipUpdated {
        ownership_id: OwnershipId,
        owner_entity_id: EntityId,
        owned_entity_id: EntityId,
        occurred_at: DateTime<Utc>,
    },
    OwnershipDeleted {
        ownership_id: OwnershipId,
        owner_entity_id: EntityId,
        owned_entity_id: EntityId,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for LedgerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LedgerEvent::EntityCreated { .. } => "entity.created",
            LedgerEvent::EntityUpdated { .. } => "entity.updated",
            LedgerEvent::EntityDeleted { .. } => "entity.deleted",
            LedgerEvent::ShareClassCreated { .. } => "share_class.created",
            LedgerEvent::ShareClassUpdated { .. } => "share_class.updated",
            LedgerEvent::ShareClassDeleted { .. } => "share_class.deleted",
            LedgerEvent::OwnershipCreated { .. } => "ownership.created",
            LedgerEvent::OwnershipUpdated { .. } => "ownership.updated",
            LedgerEvent::OwnershipDeleted { .. } => "ownership.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LedgerEvent::EntityCreated { occurred_at, .. }
            | LedgerEvent::EntityUpdated { occurred_at, .. }
            | LedgerEvent::EntityDeleted { occurred_at, .. }
            | LedgerEvent::ShareClassCreated { occurred_at, .. }
            | LedgerEvent::ShareClassUpdated { occurred_at, .. }
            | LedgerEvent::ShareClassDeleted { occurred_at, .. }
            | LedgerEvent::OwnershipCreated { occurred_at, .. }
            | LedgerEvent::OwnershipUpdated { occurred_at, .. }
            | LedgerEvent::OwnershipDeleted { occurred_at, .. } => *occurred_at,
        }
    }
}
