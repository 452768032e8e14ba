//! Cap-table computation: (entity, ownerships, share classes) → view.
//!
//! Pure functions over read snapshots; nothing here is cached or persisted.
//!
//! Conventions (fixed, applied everywhere):
//! - `authorized_shares` is the **sum** of `total_authorized_shares` across
//!   the entity's share classes.
//! - Expired ownerships still count; every non-deleted edge is active.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use capledger_core::{EntityId, OwnershipId, ShareClassId};
use capledger_entities::Entity;
use capledger_equity::{ShareClass, ShareClassKind};
use capledger_ownership::Ownership;

/// Issued-vs-authorized totals for one share class of the entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareClassSummary {
    pub share_class_id: ShareClassId,
    pub name: String,
    pub kind: ShareClassKind,
    pub series: Option<String>,
    pub authorized_shares: u64,
    pub issued_shares: u64,
    pub voting_rights: bool,
}

/// One row of the cap table: a single ownership edge into the entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnershipSummary {
    pub ownership_id: OwnershipId,
    pub owner_entity_id: EntityId,
    pub owner_name: String,
    pub share_class_id: ShareClassId,
    pub shares: u64,
    /// Share of issued stock, in percent (0 when nothing is issued).
    pub percentage: f64,
    /// Share of authorized stock, in percent (0 when nothing is authorized).
    pub fully_diluted_percentage: f64,
}

/// Computed snapshot of who owns what percentage of one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapTableView {
    pub entity_id: EntityId,
    pub entity_name: String,
    pub total_issued_shares: u64,
    pub authorized_shares: u64,
    pub available_shares: u64,
    pub share_classes: Vec<ShareClassSummary>,
    /// Rows ordered by descending shares, ties broken by ownership id.
    pub ownership_summary: Vec<OwnershipSummary>,
}

/// Compute the cap table for `entity_id`, or `None` if the entity is unknown.
pub fn compute(
    entity_id: EntityId,
    entities: &HashMap<EntityId, Entity>,
    ownerships: &HashMap<OwnershipId, Ownership>,
    share_classes: &HashMap<ShareClassId, ShareClass>,
) -> Option<CapTableView> {
    let entity = entities.get(&entity_id)?;

    let mut holdings: Vec<&Ownership> = ownerships
        .values()
        .filter(|o| o.owned_entity_id == entity_id)
        .collect();
    holdings.sort_by(|a, b| b.shares.cmp(&a.shares).then(a.id.cmp(&b.id)));

    let total_issued_shares: u64 = holdings.iter().map(|o| o.shares).sum();

    let mut classes: Vec<&ShareClass> = share_classes
        .values()
        .filter(|c| c.entity_id == entity_id)
        .collect();
    classes.sort_by_key(|c| c.id);

    let authorized_shares: u64 = classes.iter().map(|c| c.total_authorized_shares).sum();
    let available_shares = authorized_shares.saturating_sub(total_issued_shares);

    let share_class_rows = classes
        .iter()
        .map(|class| ShareClassSummary {
            share_class_id: class.id,
            name: class.name.clone(),
            kind: class.kind,
            series: class.series.clone(),
            authorized_shares: class.total_authorized_shares,
            issued_shares: holdings
                .iter()
                .filter(|o| o.share_class_id == class.id)
                .map(|o| o.shares)
                .sum(),
            voting_rights: class.voting_rights,
        })
        .collect();

    let ownership_summary = holdings
        .iter()
        .map(|o| OwnershipSummary {
            ownership_id: o.id,
            owner_entity_id: o.owner_entity_id,
            owner_name: entities
                .get(&o.owner_entity_id)
                .map(|e| e.name.clone())
                .unwrap_or_else(|| o.owner_entity_id.to_string()),
            share_class_id: o.share_class_id,
            shares: o.shares,
            percentage: share_of(o.shares, total_issued_shares),
            fully_diluted_percentage: share_of(o.shares, authorized_shares),
        })
        .collect();

    Some(CapTableView {
        entity_id,
        entity_name: entity.name.clone(),
        total_issued_shares,
        authorized_shares,
        available_shares,
        share_classes: share_class_rows,
        ownership_summary,
    })
}

fn share_of(shares: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        shares as f64 / total as f64 * 100.0
    }
}
