//! Forward-edge index over the ownership graph and the cycle probe.
//!
//! # Invariants
//!
//! - Edges point owner → owned; the committed edge set is acyclic.
//! - The probe is a plain reachability query; it never mutates anything.

use std::collections::{HashMap, HashSet};

use capledger_core::{EntityId, OwnershipId};

use crate::ownership::Ownership;

/// Adjacency index built from a snapshot of the edge set.
///
/// `reaches` runs an iterative depth-first search with an explicit stack and
/// a per-call visited set, so deep chains cannot exhaust the call stack.
/// O(V+E) per query.
#[derive(Debug, Default)]
pub struct OwnershipGraph {
    forward: HashMap<EntityId, Vec<EntityId>>,
}

impl OwnershipGraph {
    /// Build from raw (owner, owned) pairs.
    pub fn from_edges(edges: impl IntoIterator<Item = (EntityId, EntityId)>) -> Self {
        let mut forward: HashMap<EntityId, Vec<EntityId>> = HashMap::new();
        for (owner, owned) in edges {
            forward.entry(owner).or_default().push(owned);
        }
        Self { forward }
    }

    /// Build from the ownership map, optionally leaving one edge out.
    ///
    /// Updates exclude the prior version of the edge being rewritten, so the
    /// probe judges the graph as it would look after the write.
    pub fn from_ownerships(
        ownerships: &HashMap<OwnershipId, Ownership>,
        exclude: Option<OwnershipId>,
    ) -> Self {
        Self::from_edges(
            ownerships
                .values()
                .filter(|o| Some(o.id) != exclude)
                .map(|o| (o.owner_entity_id, o.owned_entity_id)),
        )
    }

    /// Whether `to` is reachable from `from` following zero or more edges.
    pub fn reaches(&self, from: EntityId, to: EntityId) -> bool {
        if from == to {
            return true;
        }

        let mut visited = HashSet::new();
        visited.insert(from);
        let mut stack = vec![from];

        while let Some(current) = stack.pop() {
            if let Some(next) = self.forward.get(&current) {
                for &owned in next {
                    if owned == to {
                        return true;
                    }
                    if visited.insert(owned) {
                        stack.push(owned);
                    }
                }
            }
        }

        false
    }

    /// Whether inserting edge (owner → owned) would close a directed cycle.
    pub fn would_create_cycle(&self, owner: EntityId, owned: EntityId) -> bool {
        self.reaches(owned, owner)
    }
}
