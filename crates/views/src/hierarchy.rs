//! Leveled ownership hierarchy for layout.
//!
//! Levels come from a Kahn-style topological relaxation outward from the
//! roots (entities nobody owns): `level(root) = 0`,
//! `level(e) = 1 + max(level of every direct owner)`, so a diamond target
//! sits below its *furthest* owner path. The traversal trusts the ledger's
//! acyclicity guarantee but handles partially-invalid snapshots (orphaned
//! ids, cycle remnants) without crashing: bad edges are skipped and
//! unreachable entities default to level 0.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use capledger_core::{EntityId, OwnershipId};
use capledger_entities::Entity;
use capledger_ownership::Ownership;

/// One entity's computed place in the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityNode {
    pub entity_id: EntityId,
    pub level: u32,
    /// Direct owners, ordered by id.
    pub owners: Vec<EntityId>,
    /// Directly owned entities, ordered by id.
    pub children: Vec<EntityId>,
}

/// The leveled ownership graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipHierarchy {
    pub levels: HashMap<EntityId, u32>,
    /// Level → entity ids at that level, ids sorted for stable layout.
    pub groups: BTreeMap<u32, Vec<EntityId>>,
    pub nodes: HashMap<EntityId, EntityNode>,
}

impl OwnershipHierarchy {
    pub fn level_of(&self, entity_id: EntityId) -> Option<u32> {
        self.levels.get(&entity_id).copied()
    }

    /// Entities with no owners.
    pub fn roots(&self) -> Vec<EntityId> {
        self.groups.get(&0).cloned().unwrap_or_default()
    }

    pub fn depth(&self) -> u32 {
        self.groups.keys().next_back().copied().map(|d| d + 1).unwrap_or(0)
    }
}

/// Build the hierarchy from snapshots of the two record maps.
pub fn build(
    entities: &HashMap<EntityId, Entity>,
    ownerships: &HashMap<OwnershipId, Ownership>,
) -> OwnershipHierarchy {
    // Unique owner/child adjacency, dropping edges with unknown endpoints.
    let mut owners_of: HashMap<EntityId, HashSet<EntityId>> = HashMap::new();
    let mut children_of: HashMap<EntityId, HashSet<EntityId>> = HashMap::new();
    for edge in ownerships.values() {
        let owner = edge.owner_entity_id;
        let owned = edge.owned_entity_id;
        if owner == owned || !entities.contains_key(&owner) || !entities.contains_key(&owned) {
            continue;
        }
        owners_of.entry(owned).or_default().insert(owner);
        children_of.entry(owner).or_default().insert(owned);
    }

    let mut levels: HashMap<EntityId, u32> = entities.keys().map(|&id| (id, 0)).collect();
    let mut remaining_owners: HashMap<EntityId, usize> = entities
        .keys()
        .map(|&id| (id, owners_of.get(&id).map(|o| o.len()).unwrap_or(0)))
        .collect();

    let mut queue: VecDeque<EntityId> = {
        let mut roots: Vec<EntityId> = remaining_owners
            .iter()
            .filter(|&(_, &count)| count == 0)
            .map(|(&id, _)| id)
            .collect();
        roots.sort();
        roots.into()
    };

    while let Some(current) = queue.pop_front() {
        let current_level = levels[&current];
        if let Some(children) = children_of.get(&current) {
            let mut children: Vec<EntityId> = children.iter().copied().collect();
            children.sort();
            for child in children {
                let level = levels.entry(child).or_insert(0);
                *level = (*level).max(current_level + 1);
                if let Some(count) = remaining_owners.get_mut(&child) {
                    // Cycle remnants in an invalid snapshot never drain to
                    // zero here; they keep their default level instead of
                    // hanging the traversal.
                    *count -= 1;
                    if *count == 0 {
                        queue.push_back(child);
                    }
                }
            }
        }
    }

    let mut groups: BTreeMap<u32, Vec<EntityId>> = BTreeMap::new();
    for (&id, &level) in &levels {
        groups.entry(level).or_default().push(id);
    }
    for ids in groups.values_mut() {
        ids.sort();
    }

    let nodes = entities
        .keys()
        .map(|&id| {
            let mut owners: Vec<EntityId> = owners_of
                .get(&id)
                .map(|o| o.iter().copied().collect())
                .unwrap_or_default();
            owners.sort();
            let mut children: Vec<EntityId> = children_of
                .get(&id)
                .map(|c| c.iter().copied().collect())
                .unwrap_or_default();
            children.sort();
            (
                id,
                EntityNode {
                    entity_id: id,
                    level: levels[&id],
                    owners,
                    children,
                },
            )
        })
        .collect();

    OwnershipHierarchy { levels, groups, nodes }
}
