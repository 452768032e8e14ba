use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use capledger_core::{ActorId, EntityId, OwnershipId, Record, ShareClassId};

/// A directed, share-quantified equity relationship: owner → owned.
///
/// This is the single edge type of the ownership graph. The share class must
/// belong to the owned entity; the graph formed by all edges is kept acyclic
/// at write time by the rule engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ownership {
    pub id: OwnershipId,
    pub owner_entity_id: EntityId,
    pub owned_entity_id: EntityId,
    pub share_class_id: ShareClassId,
    pub shares: u64,
    pub effective_date: NaiveDate,
    pub expiry_date: Option<NaiveDate>,
    pub created_by: ActorId,
    pub created_at: DateTime<Utc>,
    pub updated_by: ActorId,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
    pub change_reason: Option<String>,
}

impl Record for Ownership {
    type Id = OwnershipId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl Ownership {
    /// Build a candidate record from creation input (version 1, fresh id).
    pub fn from_new(new: NewOwnership, actor: ActorId, occurred_at: DateTime<Utc>) -> Self {
        Self {
            id: OwnershipId::new(),
            owner_entity_id: new.owner_entity_id,
            owned_entity_id: new.owned_entity_id,
            share_class_id: new.share_class_id,
            shares: new.shares,
            effective_date: new.effective_date,
            expiry_date: new.expiry_date,
            created_by: actor,
            created_at: occurred_at,
            updated_by: actor,
            updated_at: occurred_at,
            version: 1,
            change_reason: new.change_reason,
        }
    }

    /// Build the post-patch candidate for validation. The version is left
    /// untouched; the store bumps it when the candidate commits.
    pub fn with_patch(
        &self,
        patch: OwnershipPatch,
        actor: ActorId,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        let mut candidate = self.clone();
        if let Some(owner) = patch.owner_entity_id {
            candidate.owner_entity_id = owner;
        }
        if let Some(owned) = patch.owned_entity_id {
            candidate.owned_entity_id = owned;
        }
        if let Some(share_class) = patch.share_class_id {
            candidate.share_class_id = share_class;
        }
        if let Some(shares) = patch.shares {
            candidate.shares = shares;
        }
        if let Some(effective) = patch.effective_date {
            candidate.effective_date = effective;
        }
        if let Some(expiry) = patch.expiry_date {
            candidate.expiry_date = Some(expiry);
        }
        if let Some(reason) = patch.change_reason {
            candidate.change_reason = Some(reason);
        }
        candidate.updated_by = actor;
        candidate.updated_at = occurred_at;
        candidate
    }

    /// Whether this edge touches the entity as owner or owned side.
    pub fn involves(&self, entity_id: EntityId) -> bool {
        self.owner_entity_id == entity_id || self.owned_entity_id == entity_id
    }

    pub fn is_expired_on(&self, date: NaiveDate) -> bool {
        self.expiry_date.map(|expiry| expiry < date).unwrap_or(false)
    }

    /// Whether this edge matches the query filter.
    pub fn matches(&self, query: &OwnershipQuery) -> bool {
        if let Some(owner) = query.owner_entity_id {
            if self.owner_entity_id != owner {
                return false;
            }
        }
        if let Some(owned) = query.owned_entity_id {
            if self.owned_entity_id != owned {
                return false;
            }
        }
        if let Some(share_class) = query.share_class_id {
            if self.share_class_id != share_class {
                return false;
            }
        }
        if let Some(date) = query.active_on {
            if self.effective_date > date || self.is_expired_on(date) {
                return false;
            }
        }
        true
    }
}

/// Input for creating an ownership edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOwnership {
    pub owner_entity_id: EntityId,
    pub owned_entity_id: EntityId,
    pub share_class_id: ShareClassId,
    pub shares: u64,
    pub effective_date: NaiveDate,
    pub expiry_date: Option<NaiveDate>,
    pub change_reason: Option<String>,
}

impl NewOwnership {
    pub fn new(
        owner_entity_id: EntityId,
        owned_entity_id: EntityId,
        share_class_id: ShareClassId,
        shares: u64,
        effective_date: NaiveDate,
    ) -> Self {
        Self {
            owner_entity_id,
            owned_entity_id,
            share_class_id,
            shares,
            effective_date,
            expiry_date: None,
            change_reason: None,
        }
    }
}

/// Partial update; fields left as `None` keep their existing values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipPatch {
    pub owner_entity_id: Option<EntityId>,
    pub owned_entity_id: Option<EntityId>,
    pub share_class_id: Option<ShareClassId>,
    pub shares: Option<u64>,
    pub effective_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub change_reason: Option<String>,
}

/// Filter over ownership edges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnershipQuery {
    pub owner_entity_id: Option<EntityId>,
    pub owned_entity_id: Option<EntityId>,
    pub share_class_id: Option<ShareClassId>,
    /// Only edges effective on (and not expired before) this date.
    pub active_on: Option<NaiveDate>,
}
