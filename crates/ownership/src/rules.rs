//! Business-rule engine for ownership writes.
//!
//! Rules are pure functions of the supplied [`RuleContext`] (no hidden
//! state, no IO), so each is independently unit-testable. `validate_all`
//! runs the fixed, ordered rule list and collects **every** violation, not
//! just the first, partitioned into blocking errors and advisory warnings.

use std::collections::HashMap;

use chrono::NaiveDate;

use capledger_core::{EntityId, OwnershipId, RuleViolation, Severity, ShareClassId, ValidationReport};
use capledger_entities::Entity;
use capledger_equity::ShareClass;

use crate::graph::OwnershipGraph;
use crate::ownership::Ownership;

/// Everything a rule may look at: the candidate edge and a consistent
/// snapshot of the three record maps.
///
/// For updates, `ownerships` still contains the prior version of the
/// candidate; rules that walk the edge set exclude it by id.
#[derive(Debug)]
pub struct RuleContext<'a> {
    pub candidate: &'a Ownership,
    pub entities: &'a HashMap<EntityId, Entity>,
    pub ownerships: &'a HashMap<OwnershipId, Ownership>,
    pub share_classes: &'a HashMap<ShareClassId, ShareClass>,
    /// Evaluation date for expiry checks, supplied by the caller.
    pub today: NaiveDate,
}

/// The fixed rule set for ownership writes, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    OwnerExists,
    OwnedExists,
    ShareClassMatchesOwned,
    PositiveShares,
    NoSelfOwnership,
    NoCircularOwnership,
    ShareClassOversubscribed,
    OwnershipExpired,
}

impl Rule {
    /// Evaluation order for create/update writes.
    pub const WRITE_RULES: [Rule; 8] = [
        Rule::OwnerExists,
        Rule::OwnedExists,
        Rule::ShareClassMatchesOwned,
        Rule::PositiveShares,
        Rule::NoSelfOwnership,
        Rule::NoCircularOwnership,
        Rule::ShareClassOversubscribed,
        Rule::OwnershipExpired,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Rule::OwnerExists => "owner_exists",
            Rule::OwnedExists => "owned_exists",
            Rule::ShareClassMatchesOwned => "share_class_matches_owned",
            Rule::PositiveShares => "positive_shares",
            Rule::NoSelfOwnership => "no_self_ownership",
            Rule::NoCircularOwnership => "no_circular_ownership",
            Rule::ShareClassOversubscribed => "share_class_oversubscribed",
            Rule::OwnershipExpired => "ownership_expired",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Rule::ShareClassOversubscribed | Rule::OwnershipExpired => Severity::Warning,
            _ => Severity::Error,
        }
    }

    /// Evaluate one rule against the context.
    pub fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<RuleViolation> {
        let candidate = ctx.candidate;
        match self {
            Rule::OwnerExists => {
                if ctx.entities.contains_key(&candidate.owner_entity_id) {
                    None
                } else {
                    Some(self.violation(format!(
                        "owner entity {} does not exist",
                        candidate.owner_entity_id
                    )))
                }
            }
            Rule::OwnedExists => {
                if ctx.entities.contains_key(&candidate.owned_entity_id) {
                    None
                } else {
                    Some(self.violation(format!(
                        "owned entity {} does not exist",
                        candidate.owned_entity_id
                    )))
                }
            }
            Rule::ShareClassMatchesOwned => match ctx.share_classes.get(&candidate.share_class_id) {
                None => Some(self.violation(format!(
                    "share class {} does not exist",
                    candidate.share_class_id
                ))),
                Some(class) if class.entity_id != candidate.owned_entity_id => {
                    Some(self.violation(format!(
                        "share class {} belongs to entity {}, not the owned entity {}",
                        class.id, class.entity_id, candidate.owned_entity_id
                    )))
                }
                Some(_) => None,
            },
            Rule::PositiveShares => {
                if candidate.shares > 0 {
                    None
                } else {
                    Some(self.violation("shares must be greater than zero"))
                }
            }
            Rule::NoSelfOwnership => {
                if candidate.owner_entity_id == candidate.owned_entity_id {
                    Some(self.violation(format!(
                        "entity {} cannot own itself",
                        candidate.owner_entity_id
                    )))
                } else {
                    None
                }
            }
            Rule::NoCircularOwnership => {
                let graph = OwnershipGraph::from_ownerships(ctx.ownerships, Some(candidate.id));
                if graph.would_create_cycle(candidate.owner_entity_id, candidate.owned_entity_id) {
                    Some(self.violation(format!(
                        "edge {} → {} would create a circular ownership path",
                        candidate.owner_entity_id, candidate.owned_entity_id
                    )))
                } else {
                    None
                }
            }
            Rule::ShareClassOversubscribed => {
                let class = ctx.share_classes.get(&candidate.share_class_id)?;
                if class.entity_id != candidate.owned_entity_id {
                    return None; // reported by share_class_matches_owned
                }
                let issued_by_others: u64 = ctx
                    .ownerships
                    .values()
                    .filter(|o| o.id != candidate.id && o.share_class_id == class.id)
                    .map(|o| o.shares)
                    .sum();
                let issued = issued_by_others.saturating_add(candidate.shares);
                if issued > class.total_authorized_shares {
                    Some(self.violation(format!(
                        "class {} would have {} shares issued against {} authorized",
                        class.id, issued, class.total_authorized_shares
                    )))
                } else {
                    None
                }
            }
            Rule::OwnershipExpired => {
                if candidate.is_expired_on(ctx.today) {
                    Some(self.violation(format!(
                        "ownership expired on {}",
                        candidate
                            .expiry_date
                            .map(|d| d.to_string())
                            .unwrap_or_default()
                    )))
                } else {
                    None
                }
            }
        }
    }

    fn violation(&self, message: impl Into<String>) -> RuleViolation {
        RuleViolation {
            rule: self.name().to_string(),
            severity: self.severity(),
            message: message.into(),
        }
    }
}

/// Run the full write-rule list, collecting every violation.
pub fn validate_all(ctx: &RuleContext<'_>) -> ValidationReport {
    let mut report = ValidationReport::new();
    for rule in Rule::WRITE_RULES {
        match rule.evaluate(ctx) {
            Some(violation) => report.push(violation),
            None => report.push_passed(rule.name()),
        }
    }
    report
}

/// Run a single rule (callers validating a subset, e.g. a dry-run check).
pub fn validate_rule(rule: Rule, ctx: &RuleContext<'_>) -> Option<RuleViolation> {
    rule.evaluate(ctx)
}

/// Ownership edges blocking deletion of an entity (owner or owned side).
pub fn entity_delete_blockers(
    entity_id: EntityId,
    ownerships: &HashMap<OwnershipId, Ownership>,
) -> Vec<OwnershipId> {
    let mut blocking: Vec<OwnershipId> = ownerships
        .values()
        .filter(|o| o.involves(entity_id))
        .map(|o| o.id)
        .collect();
    blocking.sort();
    blocking
}

/// Ownership edges blocking deletion of a share class.
pub fn share_class_delete_blockers(
    share_class_id: ShareClassId,
    ownerships: &HashMap<OwnershipId, Ownership>,
) -> Vec<OwnershipId> {
    let mut blocking: Vec<OwnershipId> = ownerships
        .values()
        .filter(|o| o.share_class_id == share_class_id)
        .map(|o| o.id)
        .collect();
    blocking.sort();
    blocking
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ownership::NewOwnership;
    use capledger_core::ActorId;
    use capledger_entities::{EntityKind, NewEntity};
    use capledger_equity::{NewShareClass, ShareClassKind};
    use chrono::Utc;

    struct Fixture {
        entities: HashMap<EntityId, Entity>,
        share_classes: HashMap<ShareClassId, ShareClass>,
        ownerships: HashMap<OwnershipId, Ownership>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                entities: HashMap::new(),
                share_classes: HashMap::new(),
                ownerships: HashMap::new(),
            }
        }

        fn add_entity(&mut self, name: &str) -> EntityId {
            let now = Utc::now();
            let id = EntityId::new();
            let new = NewEntity::new(name, EntityKind::Corporation);
            self.entities.insert(
                id,
                Entity {
                    id,
                    name: new.name,
                    kind: new.kind,
                    jurisdiction: None,
                    registration: None,
                    metadata: Default::default(),
                    version: 1,
                    created_at: now,
                    updated_at: now,
                },
            );
            id
        }

        fn add_class(&mut self, entity_id: EntityId, authorized: u64) -> ShareClassId {
            let now = Utc::now();
            let id = ShareClassId::new();
            let new = NewShareClass::new(entity_id, "Common", ShareClassKind::Common, authorized);
            self.share_classes.insert(
                id,
                ShareClass {
                    id,
                    entity_id: new.entity_id,
                    name: new.name,
                    kind: new.kind,
                    series: None,
                    total_authorized_shares: new.total_authorized_shares,
                    voting_rights: new.voting_rights,
                    liquidation_preference: None,
                    dividend_rate: None,
                    version: 1,
                    created_at: now,
                    updated_at: now,
                },
            );
            id
        }

        fn add_edge(&mut self, owner: EntityId, owned: EntityId, class: ShareClassId, shares: u64) -> OwnershipId {
            let edge = self.candidate(owner, owned, class, shares);
            let id = edge.id;
            self.ownerships.insert(id, edge);
            id
        }

        fn candidate(
            &self,
            owner: EntityId,
            owned: EntityId,
            class: ShareClassId,
            shares: u64,
        ) -> Ownership {
            Ownership::from_new(
                NewOwnership::new(owner, owned, class, shares, today()),
                ActorId::new(),
                Utc::now(),
            )
        }

        fn ctx<'a>(&'a self, candidate: &'a Ownership) -> RuleContext<'a> {
            RuleContext {
                candidate,
                entities: &self.entities,
                ownerships: &self.ownerships,
                share_classes: &self.share_classes,
                today: today(),
            }
        }
    }

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    #[test]
    fn clean_candidate_passes_every_rule() {
        let mut fx = Fixture::new();
        let owner = fx.add_entity("Holding");
        let owned = fx.add_entity("Operating");
        let class = fx.add_class(owned, 1_000);
        let candidate = fx.candidate(owner, owned, class, 100);

        let report = validate_all(&fx.ctx(&candidate));
        assert!(report.is_valid());
        assert!(report.warnings.is_empty());
        assert_eq!(report.passed.len(), Rule::WRITE_RULES.len());
    }

    #[test]
    fn missing_records_are_all_reported_together() {
        let fx = Fixture::new();
        let candidate = fx.candidate(EntityId::new(), EntityId::new(), ShareClassId::new(), 0);

        let report = validate_all(&fx.ctx(&candidate));
        assert_eq!(
            report.failed_rules(),
            vec![
                "owner_exists",
                "owned_exists",
                "share_class_matches_owned",
                "positive_shares",
            ]
        );
    }

    #[test]
    fn share_class_of_wrong_entity_is_rejected() {
        let mut fx = Fixture::new();
        let owner = fx.add_entity("Holding");
        let owned = fx.add_entity("Operating");
        let other = fx.add_entity("Other");
        let class = fx.add_class(other, 1_000);
        let candidate = fx.candidate(owner, owned, class, 10);

        let report = validate_all(&fx.ctx(&candidate));
        assert_eq!(report.failed_rules(), vec!["share_class_matches_owned"]);
    }

    #[test]
    fn zero_shares_are_rejected() {
        let mut fx = Fixture::new();
        let owner = fx.add_entity("Holding");
        let owned = fx.add_entity("Operating");
        let class = fx.add_class(owned, 1_000);
        let candidate = fx.candidate(owner, owned, class, 0);

        let report = validate_all(&fx.ctx(&candidate));
        assert_eq!(report.failed_rules(), vec!["positive_shares"]);
    }

    #[test]
    fn self_ownership_fails_both_identity_and_cycle_rules() {
        let mut fx = Fixture::new();
        let entity = fx.add_entity("Ouroboros");
        let class = fx.add_class(entity, 1_000);
        let candidate = fx.candidate(entity, entity, class, 10);

        let report = validate_all(&fx.ctx(&candidate));
        assert_eq!(
            report.failed_rules(),
            vec!["no_self_ownership", "no_circular_ownership"]
        );
    }

    #[test]
    fn back_edge_is_circular() {
        let mut fx = Fixture::new();
        let a = fx.add_entity("A");
        let b = fx.add_entity("B");
        let class_b = fx.add_class(b, 1_000);
        let class_a = fx.add_class(a, 1_000);
        fx.add_edge(a, b, class_b, 10);

        let candidate = fx.candidate(b, a, class_a, 10);
        let report = validate_all(&fx.ctx(&candidate));
        assert_eq!(report.failed_rules(), vec!["no_circular_ownership"]);
    }

    #[test]
    fn diamond_second_edge_is_permitted() {
        let mut fx = Fixture::new();
        let r = fx.add_entity("Root");
        let a = fx.add_entity("A");
        let b = fx.add_entity("B");
        let c = fx.add_entity("C");
        let class_a = fx.add_class(a, 100);
        let class_b = fx.add_class(b, 100);
        let class_c = fx.add_class(c, 100);
        fx.add_edge(r, a, class_a, 10);
        fx.add_edge(r, b, class_b, 10);
        fx.add_edge(a, c, class_c, 10);

        let candidate = fx.candidate(b, c, class_c, 10);
        let report = validate_all(&fx.ctx(&candidate));
        assert!(report.is_valid());
    }

    #[test]
    fn update_reversing_an_edge_ignores_its_own_prior_version() {
        let mut fx = Fixture::new();
        let a = fx.add_entity("A");
        let b = fx.add_entity("B");
        let class_a = fx.add_class(a, 1_000);
        let class_b = fx.add_class(b, 1_000);
        let edge_id = fx.add_edge(a, b, class_b, 10);

        // Flip the one existing edge; only its prior version points a → b,
        // so the flipped candidate must not collide with itself.
        let mut candidate = fx.ownerships[&edge_id].clone();
        candidate.owner_entity_id = b;
        candidate.owned_entity_id = a;
        candidate.share_class_id = class_a;

        let report = validate_all(&fx.ctx(&candidate));
        assert!(report.is_valid(), "unexpected failures: {report}");
    }

    #[test]
    fn oversubscription_is_a_warning_not_an_error() {
        let mut fx = Fixture::new();
        let owner = fx.add_entity("Holding");
        let other = fx.add_entity("Angel");
        let owned = fx.add_entity("Operating");
        let class = fx.add_class(owned, 100);
        fx.add_edge(other, owned, class, 80);

        let candidate = fx.candidate(owner, owned, class, 30);
        let report = validate_all(&fx.ctx(&candidate));
        assert!(report.is_valid());
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].rule, "share_class_oversubscribed");
    }

    #[test]
    fn expired_candidate_gets_a_warning() {
        let mut fx = Fixture::new();
        let owner = fx.add_entity("Holding");
        let owned = fx.add_entity("Operating");
        let class = fx.add_class(owned, 1_000);
        let mut candidate = fx.candidate(owner, owned, class, 10);
        candidate.expiry_date = Some(today() - chrono::Duration::days(1));

        let report = validate_all(&fx.ctx(&candidate));
        assert!(report.is_valid());
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].rule, "ownership_expired");
    }

    #[test]
    fn delete_blockers_cover_both_sides_of_an_edge() {
        let mut fx = Fixture::new();
        let owner = fx.add_entity("Holding");
        let owned = fx.add_entity("Operating");
        let class = fx.add_class(owned, 1_000);
        let edge_id = fx.add_edge(owner, owned, class, 10);

        assert_eq!(entity_delete_blockers(owner, &fx.ownerships), vec![edge_id]);
        assert_eq!(entity_delete_blockers(owned, &fx.ownerships), vec![edge_id]);
        assert_eq!(
            share_class_delete_blockers(class, &fx.ownerships),
            vec![edge_id]
        );
        assert!(entity_delete_blockers(fx.add_entity("Bystander"), &fx.ownerships).is_empty());
    }

    #[test]
    fn single_rules_are_independently_callable() {
        let mut fx = Fixture::new();
        let owner = fx.add_entity("Holding");
        let owned = fx.add_entity("Operating");
        let class = fx.add_class(owned, 1_000);
        let candidate = fx.candidate(owner, owned, class, 10);
        let ctx = fx.ctx(&candidate);

        assert!(validate_rule(Rule::NoCircularOwnership, &ctx).is_none());
        assert!(validate_rule(Rule::PositiveShares, &ctx).is_none());
    }
}
