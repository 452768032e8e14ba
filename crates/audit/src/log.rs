//! Append-only audit trail.

use std::sync::RwLock;

use chrono::{DateTime, Utc};

use capledger_core::EntityId;

use crate::entry::AuditEntry;

/// Filter for querying the audit trail. All bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditQuery {
    /// Entries targeting or relating to this entity.
    pub entity_id: Option<EntityId>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// In-memory append-only audit log.
///
/// Entries are never mutated or removed by normal operation; `restore` exists
/// only for loading a persisted snapshot at startup.
#[derive(Debug, Default)]
pub struct AuditLog {
    entries: RwLock<Vec<AuditEntry>>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one entry in mutation order.
    pub fn append(&self, entry: AuditEntry) {
        if let Ok(mut entries) = self.entries.write() {
            entries.push(entry);
        }
    }

    /// Entries matching the query, in append order.
    pub fn query(&self, query: &AuditQuery) -> Vec<AuditEntry> {
        let entries = match self.entries.read() {
            Ok(e) => e,
            Err(_) => return vec![],
        };

        entries
            .iter()
            .filter(|entry| {
                if let Some(entity_id) = query.entity_id {
                    if !entry.concerns_entity(entity_id) {
                        return false;
                    }
                }
                if let Some(from) = query.from {
                    if entry.recorded_at < from {
                        return false;
                    }
                }
                if let Some(to) = query.to {
                    if entry.recorded_at > to {
                        return false;
                    }
                }
                true
            })
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Full copy of the trail for the persistence collaborator.
    pub fn snapshot(&self) -> Vec<AuditEntry> {
        self.entries.read().map(|e| e.clone()).unwrap_or_default()
    }

    /// Replace the trail with a persisted snapshot (startup only).
    pub fn restore(&self, entries: Vec<AuditEntry>) {
        if let Ok(mut current) = self.entries.write() {
            *current = entries;
        }
    }
}
