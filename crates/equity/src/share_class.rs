use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use capledger_core::{EntityId, Record, ShareClassId};

/// Category of equity a share class represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareClassKind {
    Common,
    Preferred,
    Options,
    Convertible,
}

/// A category of equity issued by exactly one entity (the owned side).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareClass {
    pub id: ShareClassId,
    /// The entity whose equity this class represents.
    pub entity_id: EntityId,
    pub name: String,
    pub kind: ShareClassKind,
    /// Preferred tier label (e.g. "Series A"); unused for common stock.
    pub series: Option<String>,
    pub total_authorized_shares: u64,
    pub voting_rights: bool,
    pub liquidation_preference: Option<f64>,
    pub dividend_rate: Option<f64>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for ShareClass {
    type Id = ShareClassId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Input for creating a share class; the store assigns id and version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewShareClass {
    pub entity_id: EntityId,
    pub name: String,
    pub kind: ShareClassKind,
    pub series: Option<String>,
    pub total_authorized_shares: u64,
    pub voting_rights: bool,
    pub liquidation_preference: Option<f64>,
    pub dividend_rate: Option<f64>,
}

impl NewShareClass {
    pub fn new(
        entity_id: EntityId,
        name: impl Into<String>,
        kind: ShareClassKind,
        total_authorized_shares: u64,
    ) -> Self {
        Self {
            entity_id,
            name: name.into(),
            kind,
            series: None,
            total_authorized_shares,
            voting_rights: matches!(kind, ShareClassKind::Common | ShareClassKind::Preferred),
            liquidation_preference: None,
            dividend_rate: None,
        }
    }
}

/// Partial update; fields left as `None` keep their existing values.
/// `entity_id` is immutable; a class never moves between entities.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShareClassPatch {
    pub name: Option<String>,
    pub kind: Option<ShareClassKind>,
    pub series: Option<String>,
    pub total_authorized_shares: Option<u64>,
    pub voting_rights: Option<bool>,
    pub liquidation_preference: Option<f64>,
    pub dividend_rate: Option<f64>,
}
