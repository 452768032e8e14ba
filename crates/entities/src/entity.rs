use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use capledger_core::{EntityId, Record};

/// Legal form of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Corporation,
    Llc,
    Partnership,
    Trust,
    Individual,
}

impl EntityKind {
    /// Individuals have no registry entry and no required jurisdiction.
    pub fn is_individual(&self) -> bool {
        matches!(self, EntityKind::Individual)
    }
}

/// Registry metadata for formed entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationInfo {
    pub registration_number: String,
    pub registered_on: Option<NaiveDate>,
    pub registry: Option<String>,
}

/// A legal person or organization (or an individual) participating in
/// ownership relationships.
///
/// `metadata` is an opaque string map for UI tags (role, industry, notes);
/// the ledger stores it verbatim and never interprets the values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub kind: EntityKind,
    pub jurisdiction: Option<String>,
    pub registration: Option<RegistrationInfo>,
    pub metadata: BTreeMap<String, String>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for Entity {
    type Id = EntityId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Input for creating an entity; the store assigns id and version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEntity {
    pub name: String,
    pub kind: EntityKind,
    pub jurisdiction: Option<String>,
    pub registration: Option<RegistrationInfo>,
    pub metadata: BTreeMap<String, String>,
}

impl NewEntity {
    pub fn new(name: impl Into<String>, kind: EntityKind) -> Self {
        Self {
            name: name.into(),
            kind,
            jurisdiction: None,
            registration: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_jurisdiction(mut self, jurisdiction: impl Into<String>) -> Self {
        self.jurisdiction = Some(jurisdiction.into());
        self
    }
}

/// Partial update; fields left as `None` keep their existing values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityPatch {
    pub name: Option<String>,
    pub kind: Option<EntityKind>,
    pub jurisdiction: Option<String>,
    pub registration: Option<RegistrationInfo>,
    /// Replaces the whole metadata map when present.
    pub metadata: Option<BTreeMap<String, String>>,
}

/// Search filter over entities.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityQuery {
    /// Case-insensitive substring match on the name or any metadata value.
    pub text: Option<String>,
    pub kind: Option<EntityKind>,
    pub jurisdiction: Option<String>,
}

impl Entity {
    /// Whether this entity matches the search filter.
    pub fn matches(&self, query: &EntityQuery) -> bool {
        if let Some(kind) = query.kind {
            if self.kind != kind {
                return false;
            }
        }
        if let Some(jurisdiction) = &query.jurisdiction {
            if self.jurisdiction.as_deref() != Some(jurisdiction.as_str()) {
                return false;
            }
        }
        if let Some(text) = &query.text {
            let needle = text.to_lowercase();
            let in_name = self.name.to_lowercase().contains(&needle);
            let in_metadata = self
                .metadata
                .values()
                .any(|v| v.to_lowercase().contains(&needle));
            if !in_name && !in_metadata {
                return false;
            }
        }
        true
    }
}
