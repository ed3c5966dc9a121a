use engine::actor::ResistanceRow;
use engine::resist::{apply_damage, reduce_component};
use engine::{ActorSnapshot, DamageType, RemoteUpdate, ResistanceEntry, TypedDamage};
use indexmap::IndexMap;

fn victim() -> ActorSnapshot {
    ActorSnapshot {
        name: "Victim".to_string(),
        health: 10,
        max_health: 10,
        defences: IndexMap::new(),
        resources: IndexMap::new(),
        resistances: vec![
            ResistanceRow {
                damage_type: DamageType::new("phys", "slash"),
                value: 3,
                immune: false,
            },
            ResistanceRow {
                damage_type: DamageType::new("elem", "fire"),
                value: 0,
                immune: true,
            },
        ],
    }
}

#[test]
fn reduction_never_flips_a_component_negative() {
    let entry = Some(ResistanceEntry {
        value: 5,
        immune: false,
    });
    assert_eq!(reduce_component(entry, 8), 3);
    assert_eq!(reduce_component(entry, 5), 0);
    assert_eq!(reduce_component(entry, 2), 0);
    assert_eq!(reduce_component(None, 8), 8);
}

#[test]
fn immunity_negates_the_whole_component() {
    let entry = Some(ResistanceEntry {
        value: 0,
        immune: true,
    });
    assert_eq!(reduce_component(entry, 100), 0);
}

#[test]
fn negative_components_pass_through_unreduced() {
    let entry = Some(ResistanceEntry {
        value: 5,
        immune: false,
    });
    assert_eq!(reduce_component(entry, -4), -4);
    assert_eq!(reduce_component(entry, 0), 0);
}

#[test]
fn each_component_is_reduced_independently() {
    let mut actor = victim();
    let mut updates: Vec<RemoteUpdate> = Vec::new();
    let mut log = Vec::new();
    let applied = apply_damage(
        "victim",
        &mut actor,
        &[
            TypedDamage {
                damage_type: DamageType::new("phys", "slash"),
                amount: 5,
            },
            TypedDamage {
                damage_type: DamageType::new("elem", "fire"),
                amount: 7,
            },
            TypedDamage {
                damage_type: DamageType::new("elem", "cold"),
                amount: 1,
            },
        ],
        true,
        &mut updates,
        |line| log.push(line),
    );
    // slash 5-3=2, fire immune, cold unlisted: net 3.
    assert_eq!(applied.raw, 13);
    assert_eq!(applied.net, 3);
    assert_eq!(actor.health, 7);
    assert!(updates.is_empty());
    assert_eq!(log.len(), 1);
}

#[test]
fn health_floors_at_zero() {
    let mut actor = victim();
    let mut updates: Vec<RemoteUpdate> = Vec::new();
    let applied = apply_damage(
        "victim",
        &mut actor,
        &[TypedDamage {
            damage_type: DamageType::new("elem", "cold"),
            amount: 50,
        }],
        true,
        &mut updates,
        |_| {},
    );
    assert_eq!(applied.health_after, 0);
    assert_eq!(actor.health, 0);
}

#[test]
fn updates_carry_the_new_health_when_not_authoritative() {
    let mut actor = victim();
    let mut updates: Vec<RemoteUpdate> = Vec::new();
    apply_damage(
        "victim",
        &mut actor,
        &[TypedDamage {
            damage_type: DamageType::new("elem", "cold"),
            amount: 4,
        }],
        false,
        &mut updates,
        |_| {},
    );
    assert_eq!(actor.health, 10);
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].operation, "updateActorData");
    assert_eq!(updates[0].update, serde_json::json!({ "health": 6 }));
}
