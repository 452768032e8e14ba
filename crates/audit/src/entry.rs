use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use capledger_core::{ActorId, AuditEntryId, EntityId, RecordKind};

/// Kind of mutation an audit entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "create",
            AuditAction::Update => "update",
            AuditAction::Delete => "delete",
        }
    }
}

/// One immutable record in the audit trail.
///
/// `previous_state`/`new_state` hold the full serialized record before and
/// after the mutation (`None` on the missing side of creates/deletes).
/// `rules_passed` names the validation rules that evaluated clean for this
/// write, so the trail shows what was checked, not just what changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: AuditEntryId,
    pub recorded_at: DateTime<Utc>,
    pub actor: ActorId,
    pub action: AuditAction,
    pub target_kind: RecordKind,
    pub target_id: Uuid,
    /// Entities touched by the mutation (owner + owned for ownership edges).
    pub related_entity_ids: Vec<EntityId>,
    pub previous_state: Option<JsonValue>,
    pub new_state: Option<JsonValue>,
    pub change_reason: Option<String>,
    pub rules_passed: Vec<String>,
}

impl AuditEntry {
    /// Whether this entry concerns the given entity, either as the direct
    /// target or through `related_entity_ids`.
    pub fn concerns_entity(&self, entity_id: EntityId) -> bool {
        (self.target_kind == RecordKind::Entity && self.target_id == *entity_id.as_uuid())
            || self.related_entity_ids.contains(&entity_id)
    }
}
