//! Build a small holding structure and print its cap table and hierarchy.
//!
//! Run with `cargo run -p capledger-infra --example holding_structure`.

use chrono::Utc;

use capledger_core::ActorId;
use capledger_entities::{EntityKind, NewEntity};
use capledger_equity::{NewShareClass, ShareClassKind};
use capledger_events::Event;
use capledger_infra::Ledger;
use capledger_ownership::NewOwnership;

fn main() -> anyhow::Result<()> {
    capledger_observability::init();

    let ledger = Ledger::new();
    let actor = ActorId::new();
    let today = Utc::now().date_naive();

    let subscription = ledger.subscribe(|event| {
        println!("event: {}", event.event_type());
    });

    let founder = ledger.create_entity(
        NewEntity::new("Dana Reyes", EntityKind::Individual),
        actor,
        None,
    )?;
    let holdco = ledger.create_entity(
        NewEntity::new("Reyes Holding AG", EntityKind::Corporation).with_jurisdiction("CH"),
        actor,
        None,
    )?;
    let opco = ledger.create_entity(
        NewEntity::new("Reyes Operations GmbH", EntityKind::Llc).with_jurisdiction("DE"),
        actor,
        None,
    )?;

    let holdco_common = ledger.create_share_class(
        NewShareClass::new(holdco.id, "Common", ShareClassKind::Common, 100_000),
        actor,
        None,
    )?;
    let opco_common = ledger.create_share_class(
        NewShareClass::new(opco.id, "Common", ShareClassKind::Common, 25_000),
        actor,
        None,
    )?;

    ledger.create_ownership(
        NewOwnership::new(founder.id, holdco.id, holdco_common.id, 100_000, today),
        actor,
    )?;
    ledger.create_ownership(
        NewOwnership::new(holdco.id, opco.id, opco_common.id, 25_000, today),
        actor,
    )?;

    let view = ledger
        .cap_table_view(opco.id)
        .ok_or_else(|| anyhow::anyhow!("cap table unavailable for {}", opco.id))?;
    println!("\ncap table: {}", view.entity_name);
    println!(
        "  issued {} / authorized {} (available {})",
        view.total_issued_shares, view.authorized_shares, view.available_shares
    );
    for row in &view.ownership_summary {
        println!(
            "  {:<24} {:>8} shares  {:>6.2}%  ({:.2}% fully diluted)",
            row.owner_name, row.shares, row.percentage, row.fully_diluted_percentage
        );
    }

    let hierarchy = ledger.ownership_hierarchy();
    println!("\nhierarchy:");
    for (level, ids) in &hierarchy.groups {
        for id in ids {
            if let Some(entity) = ledger.entity(*id) {
                println!("  level {level}: {}", entity.name);
            }
        }
    }

    subscription.unsubscribe();
    Ok(())
}
