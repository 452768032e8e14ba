//! Black-box tests driving the ledger through its public facade only.

use std::sync::{Arc, Mutex};

use chrono::Utc;

use capledger_audit::AuditQuery;
use capledger_core::{ActorId, EntityId, ExpectedVersion, LedgerError, LedgerResult};
use capledger_entities::{Entity, EntityKind, EntityPatch, EntityQuery, NewEntity};
use capledger_equity::{NewShareClass, ShareClass, ShareClassKind};
use capledger_events::{Event, LedgerEvent};
use capledger_infra::{InMemorySnapshotStore, Ledger};
use capledger_ownership::{NewOwnership, Ownership, OwnershipPatch, OwnershipQuery};

fn ledger() -> Ledger {
    capledger_observability::init();
    Ledger::new()
}

fn actor() -> ActorId {
    ActorId::new()
}

fn add_entity(ledger: &Ledger, name: &str) -> Entity {
    ledger
        .create_entity(NewEntity::new(name, EntityKind::Corporation), actor(), None)
        .unwrap()
}

fn add_class(ledger: &Ledger, entity: &Entity, authorized: u64) -> ShareClass {
    ledger
        .create_share_class(
            NewShareClass::new(entity.id, "Common", ShareClassKind::Common, authorized),
            actor(),
            None,
        )
        .unwrap()
}

fn own(
    ledger: &Ledger,
    owner: &Entity,
    owned: &Entity,
    class: &ShareClass,
    shares: u64,
) -> LedgerResult<Ownership> {
    ledger.create_ownership(
        NewOwnership::new(owner.id, owned.id, class.id, shares, Utc::now().date_naive()),
        actor(),
    )
}

#[test]
fn diamond_pattern_is_permitted_with_expected_levels() {
    let ledger = ledger();
    let r = add_entity(&ledger, "Root Holdings");
    let a = add_entity(&ledger, "Alpha");
    let b = add_entity(&ledger, "Beta");
    let c = add_entity(&ledger, "Carbon");
    let class_a = add_class(&ledger, &a, 1_000);
    let class_b = add_class(&ledger, &b, 1_000);
    let class_c = add_class(&ledger, &c, 1_000);

    own(&ledger, &r, &a, &class_a, 100).unwrap();
    own(&ledger, &r, &b, &class_b, 100).unwrap();
    own(&ledger, &a, &c, &class_c, 50).unwrap();
    // Both edges into C must succeed: diamonds are not cycles.
    own(&ledger, &b, &c, &class_c, 50).unwrap();

    let hierarchy = ledger.ownership_hierarchy();
    assert_eq!(hierarchy.level_of(r.id), Some(0));
    assert_eq!(hierarchy.level_of(a.id), Some(1));
    assert_eq!(hierarchy.level_of(b.id), Some(1));
    assert_eq!(hierarchy.level_of(c.id), Some(2));
    assert_eq!(hierarchy.roots(), vec![r.id]);
}

#[test]
fn direct_cycle_is_rejected_with_no_side_effects() {
    let ledger = ledger();
    let a = add_entity(&ledger, "A");
    let b = add_entity(&ledger, "B");
    let class_a = add_class(&ledger, &a, 1_000);
    let class_b = add_class(&ledger, &b, 1_000);
    own(&ledger, &a, &b, &class_b, 10).unwrap();

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let subscription = ledger.subscribe(move |e: &LedgerEvent| {
        sink.lock().unwrap().push(e.event_type().to_string());
    });
    let audit_before = ledger.audit_trail(&AuditQuery::default()).len();

    let err = own(&ledger, &b, &a, &class_a, 10).unwrap_err();
    assert_eq!(
        err,
        LedgerError::CircularOwnership {
            owner: b.id,
            owned: a.id,
        }
    );

    // Nothing persisted, audited or announced for the rejected edge.
    assert_eq!(ledger.ownerships_by_entity(a.id).len(), 1);
    assert_eq!(ledger.audit_trail(&AuditQuery::default()).len(), audit_before);
    assert!(events.lock().unwrap().is_empty());
    subscription.unsubscribe();
}

#[test]
fn longer_cycles_are_rejected_too() {
    let ledger = ledger();
    let a = add_entity(&ledger, "A");
    let b = add_entity(&ledger, "B");
    let c = add_entity(&ledger, "C");
    let class_a = add_class(&ledger, &a, 100);
    let class_b = add_class(&ledger, &b, 100);
    let class_c = add_class(&ledger, &c, 100);
    own(&ledger, &a, &b, &class_b, 10).unwrap();
    own(&ledger, &b, &c, &class_c, 10).unwrap();

    let err = own(&ledger, &c, &a, &class_a, 10).unwrap_err();
    assert!(matches!(err, LedgerError::CircularOwnership { .. }));
}

#[test]
fn cap_table_percentages_sum_to_one_hundred() {
    let ledger = ledger();
    let founder = add_entity(&ledger, "Founder");
    let angel = add_entity(&ledger, "Angel");
    let fund = add_entity(&ledger, "Fund I");
    let company = add_entity(&ledger, "NewCo");
    let common = add_class(&ledger, &company, 100_000);

    own(&ledger, &founder, &company, &common, 61_337).unwrap();
    own(&ledger, &angel, &company, &common, 11_111).unwrap();
    own(&ledger, &fund, &company, &common, 27_007).unwrap();

    let view = ledger.cap_table_view(company.id).unwrap();
    assert_eq!(view.total_issued_shares, 99_455);

    let sum: f64 = view.ownership_summary.iter().map(|row| row.percentage).sum();
    assert!((sum - 100.0).abs() < 1e-6, "percentages summed to {sum}");
    assert_eq!(view.available_shares, 100_000 - 99_455);
}

#[test]
fn cap_table_for_unknown_entity_is_none() {
    let ledger = ledger();
    assert!(ledger.cap_table_view(EntityId::new()).is_none());
}

#[test]
fn share_class_delete_guard_names_the_blocking_ownership() {
    let ledger = ledger();
    let owner = add_entity(&ledger, "Holding");
    let owned = add_entity(&ledger, "Operating");
    let class = add_class(&ledger, &owned, 1_000);
    let edge = own(&ledger, &owner, &owned, &class, 100).unwrap();

    let err = ledger
        .delete_share_class(class.id, ExpectedVersion::Any, actor(), None)
        .unwrap_err();
    match err {
        LedgerError::ReferentialIntegrity { blocking, .. } => {
            assert_eq!(blocking, vec![edge.id]);
        }
        other => panic!("expected ReferentialIntegrity, got {other:?}"),
    }
    assert!(ledger.share_class(class.id).is_some());

    ledger
        .delete_ownership(edge.id, ExpectedVersion::Exact(1), actor(), None)
        .unwrap();
    ledger
        .delete_share_class(class.id, ExpectedVersion::Any, actor(), None)
        .unwrap();
    assert!(ledger.share_class(class.id).is_none());
}

#[test]
fn entity_delete_guard_covers_owner_and_owned_sides() {
    let ledger = ledger();
    let owner = add_entity(&ledger, "Holding");
    let owned = add_entity(&ledger, "Operating");
    let class = add_class(&ledger, &owned, 1_000);
    let edge = own(&ledger, &owner, &owned, &class, 100).unwrap();

    for entity in [&owner, &owned] {
        let err = ledger.validate_entity_deletion(entity.id).unwrap_err();
        assert!(matches!(err, LedgerError::ReferentialIntegrity { .. }));
    }

    ledger
        .delete_ownership(edge.id, ExpectedVersion::Exact(1), actor(), None)
        .unwrap();
    ledger.validate_entity_deletion(owner.id).unwrap();
    ledger
        .delete_entity(owner.id, ExpectedVersion::Exact(1), actor(), None)
        .unwrap();
    assert!(ledger.entity(owner.id).is_none());
}

#[test]
fn optimistic_conflict_exactly_one_of_two_stale_updates_wins() {
    let ledger = ledger();
    let owner = add_entity(&ledger, "Holding");
    let owned = add_entity(&ledger, "Operating");
    let class = add_class(&ledger, &owned, 10_000);
    let edge = own(&ledger, &owner, &owned, &class, 100).unwrap();
    assert_eq!(edge.version, 1);

    // Both writers read version 1; the second commit must conflict.
    let first = ledger.update_ownership(
        edge.id,
        OwnershipPatch {
            shares: Some(200),
            ..OwnershipPatch::default()
        },
        ExpectedVersion::Exact(1),
        actor(),
        None,
    );
    let second = ledger.update_ownership(
        edge.id,
        OwnershipPatch {
            shares: Some(300),
            ..OwnershipPatch::default()
        },
        ExpectedVersion::Exact(1),
        actor(),
        None,
    );

    assert!(first.is_ok());
    assert_eq!(
        second.unwrap_err(),
        LedgerError::Conflict { expected: 1, found: 2 }
    );

    let current = ledger.ownership(edge.id).unwrap();
    assert_eq!(current.version, 2);
    assert_eq!(current.shares, 200);
}

#[test]
fn zero_share_ownership_commits_nothing() {
    let ledger = ledger();
    let owner = add_entity(&ledger, "Holding");
    let owned = add_entity(&ledger, "Operating");
    let class = add_class(&ledger, &owned, 1_000);

    let err = own(&ledger, &owner, &owned, &class, 0).unwrap_err();
    match err {
        LedgerError::Validation(report) => {
            assert_eq!(report.failed_rules(), vec!["positive_shares"]);
        }
        other => panic!("expected Validation, got {other:?}"),
    }
    assert!(ledger.ownerships_by_entity(owned.id).is_empty());
}

#[test]
fn share_class_of_another_entity_is_rejected() {
    let ledger = ledger();
    let owner = add_entity(&ledger, "Holding");
    let owned = add_entity(&ledger, "Operating");
    let other = add_entity(&ledger, "Bystander");
    let wrong_class = add_class(&ledger, &other, 1_000);

    let err = own(&ledger, &owner, &owned, &wrong_class, 10).unwrap_err();
    match err {
        LedgerError::Validation(report) => {
            assert_eq!(report.failed_rules(), vec!["share_class_matches_owned"]);
        }
        other => panic!("expected Validation, got {other:?}"),
    }
}

#[test]
fn update_cannot_sneak_in_a_cycle() {
    let ledger = ledger();
    let a = add_entity(&ledger, "A");
    let b = add_entity(&ledger, "B");
    let c = add_entity(&ledger, "C");
    let class_b = add_class(&ledger, &b, 100);
    let class_c = add_class(&ledger, &c, 100);
    own(&ledger, &a, &b, &class_b, 10).unwrap();
    let edge = own(&ledger, &b, &c, &class_c, 10).unwrap();

    // Repointing B→C to B→A would close A→B→A.
    let err = ledger
        .update_ownership(
            edge.id,
            OwnershipPatch {
                owned_entity_id: Some(a.id),
                share_class_id: Some(add_class(&ledger, &a, 100).id),
                ..OwnershipPatch::default()
            },
            ExpectedVersion::Exact(1),
            actor(),
            None,
        )
        .unwrap_err();
    assert!(matches!(err, LedgerError::CircularOwnership { .. }));

    // The stored edge is untouched.
    let current = ledger.ownership(edge.id).unwrap();
    assert_eq!(current.owned_entity_id, c.id);
    assert_eq!(current.version, 1);
}

#[test]
fn audit_entry_is_readable_before_the_event_arrives() {
    let ledger = Arc::new(ledger());
    let observed = Arc::new(Mutex::new(Vec::new()));

    let ledger_ref = Arc::clone(&ledger);
    let sink = Arc::clone(&observed);
    let subscription = ledger.subscribe(move |event: &LedgerEvent| {
        if let LedgerEvent::EntityCreated { entity_id, .. } = event {
            let trail = ledger_ref.audit_trail(&AuditQuery {
                entity_id: Some(*entity_id),
                ..AuditQuery::default()
            });
            sink.lock().unwrap().push(trail.len());
        }
    });

    add_entity(&ledger, "Observed");

    let counts = observed.lock().unwrap();
    assert_eq!(*counts, vec![1], "audit entry must precede event delivery");
    drop(counts);
    subscription.unsubscribe();
}

#[test]
fn events_arrive_in_mutation_order_until_unsubscribed() {
    let ledger = ledger();
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let subscription = ledger.subscribe(move |e: &LedgerEvent| {
        sink.lock().unwrap().push(e.event_type().to_string());
    });

    let company = add_entity(&ledger, "NewCo");
    let class = add_class(&ledger, &company, 1_000);
    ledger
        .update_share_class(
            class.id,
            capledger_equity::ShareClassPatch {
                total_authorized_shares: Some(2_000),
                ..Default::default()
            },
            ExpectedVersion::Exact(1),
            actor(),
            Some("authorized increase".to_string()),
        )
        .unwrap();

    subscription.unsubscribe();
    add_entity(&ledger, "Unobserved");

    assert_eq!(
        *events.lock().unwrap(),
        vec![
            "entity.created".to_string(),
            "share_class.created".to_string(),
            "share_class.updated".to_string(),
        ]
    );
}

#[test]
fn snapshot_store_round_trips_full_ledger_state() {
    let store = Arc::new(InMemorySnapshotStore::new());
    let ledger = Ledger::with_snapshot_store(store.clone()).unwrap();

    let owner = add_entity(&ledger, "Holding");
    let owned = add_entity(&ledger, "Operating");
    let class = add_class(&ledger, &owned, 1_000);
    let edge = own(&ledger, &owner, &owned, &class, 250).unwrap();
    ledger
        .update_entity(
            owner.id,
            EntityPatch {
                jurisdiction: Some("DE".to_string()),
                ..EntityPatch::default()
            },
            ExpectedVersion::Exact(1),
            actor(),
            None,
        )
        .unwrap();

    // A second ledger instance over the same medium sees identical state.
    let reloaded = Ledger::with_snapshot_store(store).unwrap();
    assert_eq!(reloaded.entities().len(), 2);
    assert_eq!(reloaded.entity(owner.id).unwrap().version, 2);
    assert_eq!(
        reloaded.entity(owner.id).unwrap().jurisdiction.as_deref(),
        Some("DE")
    );
    assert_eq!(reloaded.ownership(edge.id).unwrap().shares, 250);
    assert_eq!(
        reloaded.audit_trail(&AuditQuery::default()).len(),
        ledger.audit_trail(&AuditQuery::default()).len()
    );

    let view = reloaded.cap_table_view(owned.id).unwrap();
    assert_eq!(view.total_issued_shares, 250);
}

#[test]
fn query_and_search_surfaces_work_through_the_facade() {
    let ledger = ledger();
    let holding = ledger
        .create_entity(
            NewEntity::new("Evergreen Holding", EntityKind::Corporation).with_jurisdiction("DE"),
            actor(),
            None,
        )
        .unwrap();
    let operating = add_entity(&ledger, "Operating GmbH");
    let class = add_class(&ledger, &operating, 5_000);
    own(&ledger, &holding, &operating, &class, 500).unwrap();

    let found = ledger.search_entities(&EntityQuery {
        text: Some("evergreen".to_string()),
        ..EntityQuery::default()
    });
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, holding.id);

    let edges = ledger.query_ownerships(&OwnershipQuery {
        owner_entity_id: Some(holding.id),
        ..OwnershipQuery::default()
    });
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].owned_entity_id, operating.id);

    assert_eq!(ledger.share_classes_by_entity(operating.id).len(), 1);
}

#[test]
fn validate_ownership_change_is_a_dry_run() {
    let ledger = ledger();
    let owner = add_entity(&ledger, "Holding");
    let owned = add_entity(&ledger, "Operating");
    let class = add_class(&ledger, &owned, 100);

    let candidate = Ownership::from_new(
        NewOwnership::new(owner.id, owned.id, class.id, 0, Utc::now().date_naive()),
        actor(),
        Utc::now(),
    );
    let report = ledger.validate_ownership_change(&candidate);
    assert!(!report.is_valid());
    assert_eq!(report.failed_rules(), vec!["positive_shares"]);
    // Nothing was written by the dry run.
    assert!(ledger.ownerships_by_entity(owned.id).is_empty());
    assert_eq!(ledger.audit_trail(&AuditQuery::default()).len(), 3);
}

#[test]
fn audit_trail_filters_by_entity() {
    let ledger = ledger();
    let a = add_entity(&ledger, "A");
    let b = add_entity(&ledger, "B");
    let class_b = add_class(&ledger, &b, 1_000);
    own(&ledger, &a, &b, &class_b, 10).unwrap();

    // A appears in its own create plus the ownership entry.
    let trail_a = ledger.audit_trail(&AuditQuery {
        entity_id: Some(a.id),
        ..AuditQuery::default()
    });
    assert_eq!(trail_a.len(), 2);

    // B additionally appears in the share-class entry.
    let trail_b = ledger.audit_trail(&AuditQuery {
        entity_id: Some(b.id),
        ..AuditQuery::default()
    });
    assert_eq!(trail_b.len(), 3);

    let ownership_entry = trail_a
        .iter()
        .find(|e| e.target_kind == capledger_core::RecordKind::Ownership)
        .unwrap();
    assert_eq!(ownership_entry.related_entity_ids, vec![a.id, b.id]);
    assert!(
        ownership_entry
            .rules_passed
            .contains(&"no_circular_ownership".to_string())
    );
}

#[test]
fn missing_records_surface_not_found() {
    let ledger = ledger();
    assert!(matches!(
        ledger.validate_entity_deletion(EntityId::new()),
        Err(LedgerError::NotFound { .. })
    ));
    assert!(matches!(
        ledger.delete_entity(EntityId::new(), ExpectedVersion::Any, actor(), None),
        Err(LedgerError::NotFound { .. })
    ));
    assert!(matches!(
        ledger.create_share_class(
            NewShareClass::new(EntityId::new(), "Common", ShareClassKind::Common, 100),
            actor(),
            None,
        ),
        Err(LedgerError::NotFound { .. })
    ));
}
