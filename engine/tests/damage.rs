use std::str::FromStr;

use engine::{
    DamageComponent, DamageConfiguration, DamageOptions, DamageRoll, DamageType, Dice,
};

fn slash() -> DamageType {
    DamageType::new("phys", "slash")
}

fn fire() -> DamageType {
    DamageType::new("elem", "fire")
}

#[test]
fn damage_type_string_form() {
    let parsed = DamageType::from_str("phys:slash").unwrap();
    assert_eq!(parsed, slash());
    assert_eq!(parsed.to_string(), "phys:slash");
    assert!(DamageType::from_str("slash").is_err());
    assert!(DamageType::from_str(":slash").is_err());
}

#[test]
fn terms_get_typed_positionally_across_operators() {
    let mut roll = DamageRoll::new(
        "2d6 + 3",
        DamageOptions {
            types: vec![fire(), DamageType::new("phys", "blunt")],
            ..DamageOptions::default()
        },
    )
    .unwrap();

    let mut dice = Dice::from_scripted(vec![4, 5]);
    let outcome = roll.evaluate(&mut dice);
    assert_eq!(outcome.total, 12);
    assert_eq!(outcome.components.len(), 2);
    assert_eq!(outcome.components[0].damage_type, fire());
    assert_eq!(outcome.components[0].amount, 9);
    assert_eq!(outcome.components[1].damage_type, DamageType::new("phys", "blunt"));
    assert_eq!(outcome.components[1].amount, 3);
}

#[test]
fn critical_adds_bonus_dice_and_flat_face_total() {
    let mut roll = DamageRoll::new(
        "2d6",
        DamageOptions {
            is_critical: true,
            critical_bonus_dice: 1,
            types: vec![slash()],
            ..DamageOptions::default()
        },
    )
    .unwrap();
    // 2 base dice become 3; the flat bonus is the base dice's face total.
    assert_eq!(roll.formula(), "3d6 + 12");

    let mut dice = Dice::from_scripted(vec![4, 5, 6]);
    let outcome = roll.evaluate(&mut dice);
    assert_eq!(outcome.total, 27);
    assert_eq!(outcome.components.len(), 1);
    assert_eq!(outcome.components[0].damage_type, slash());
    assert_eq!(outcome.components[0].amount, 27);
}

#[test]
fn critical_with_multiple_dice_terms_tracks_one_bonus_constant() {
    let mut roll = DamageRoll::new(
        "1d6 + 1d8",
        DamageOptions {
            is_critical: true,
            types: vec![slash(), fire()],
            ..DamageOptions::default()
        },
    )
    .unwrap();
    // Both dice feed the same constant: 6 + 8 = 14, inserted once.
    assert_eq!(roll.formula(), "1d6 + 14 + 1d8");

    let mut dice = Dice::from_scripted(vec![3, 5]);
    let outcome = roll.evaluate(&mut dice);
    assert_eq!(outcome.total, 22);
    // The bonus constant inherits the first term's type.
    assert_eq!(outcome.components[0].damage_type, slash());
    assert_eq!(outcome.components[0].amount, 17);
    assert_eq!(outcome.components[1].damage_type, fire());
    assert_eq!(outcome.components[1].amount, 5);
}

#[test]
fn multiply_numeric_doubles_flat_terms() {
    let mut roll = DamageRoll::new(
        "1d4 + 2",
        DamageOptions {
            is_critical: true,
            multiply_numeric: true,
            types: vec![slash()],
            ..DamageOptions::default()
        },
    )
    .unwrap();
    assert_eq!(roll.formula(), "1d4 + 4 + 4");

    let mut dice = Dice::from_scripted(vec![3]);
    assert_eq!(roll.evaluate(&mut dice).total, 11);
}

#[test]
fn numeric_terms_stay_put_without_multiply_numeric() {
    let mut roll = DamageRoll::new(
        "1d4 + 2",
        DamageOptions {
            is_critical: true,
            types: vec![slash()],
            ..DamageOptions::default()
        },
    )
    .unwrap();
    assert_eq!(roll.formula(), "1d4 + 4 + 2");
}

#[test]
fn pool_groups_are_inert_under_critical() {
    let mut roll = DamageRoll::new(
        "{1d6, 1d8} + 2",
        DamageOptions {
            is_critical: true,
            critical_bonus_dice: 1,
            multiply_numeric: true,
            types: vec![slash()],
            ..DamageOptions::default()
        },
    )
    .unwrap();
    // The pool's dice gain no bonus die and feed no flat face total; only
    // the top-level constant is doubled.
    assert_eq!(roll.formula(), "{1d6, 1d8} + 4");

    let mut dice = Dice::from_scripted(vec![3, 5]);
    assert_eq!(roll.evaluate(&mut dice).total, 12);
}

#[test]
fn reconfiguring_off_critical_restores_the_base_formula() {
    let mut roll = DamageRoll::new(
        "2d6",
        DamageOptions {
            is_critical: true,
            critical_bonus_dice: 1,
            types: vec![slash()],
            ..DamageOptions::default()
        },
    )
    .unwrap();
    assert_eq!(roll.formula(), "3d6 + 12");

    roll.apply_configuration(&DamageConfiguration {
        is_critical: Some(false),
        ..DamageConfiguration::default()
    });
    assert_eq!(roll.formula(), "2d6");

    // And back on again: still exactly one bonus constant.
    roll.apply_configuration(&DamageConfiguration {
        is_critical: Some(true),
        ..DamageConfiguration::default()
    });
    assert_eq!(roll.formula(), "3d6 + 12");
}

#[test]
fn combine_aligns_each_component_with_its_type() {
    let components = vec![
        DamageComponent {
            formula: "1d6".to_string(),
            types: vec![fire()],
        },
        DamageComponent {
            formula: "1d8".to_string(),
            types: vec![DamageType::new("elem", "cold")],
        },
        DamageComponent {
            formula: "2".to_string(),
            types: vec![DamageType::new("elem", "acid")],
        },
    ];
    let (formula, types) = DamageComponent::combine(&components, 0).unwrap();
    assert_eq!(formula, "1d6 + 1d8 + 2");

    let mut roll = DamageRoll::new(
        &formula,
        DamageOptions {
            types,
            ..DamageOptions::default()
        },
    )
    .unwrap();
    let mut dice = Dice::from_scripted(vec![6, 8]);
    let outcome = roll.evaluate(&mut dice);
    assert_eq!(outcome.total, 16);
    let amounts: Vec<(String, i32)> = outcome
        .components
        .iter()
        .map(|c| (c.damage_type.to_string(), c.amount))
        .collect();
    assert_eq!(
        amounts,
        vec![
            ("elem:fire".to_string(), 6),
            ("elem:cold".to_string(), 8),
            ("elem:acid".to_string(), 2),
        ]
    );
}

#[test]
fn combine_rejects_an_empty_component_list() {
    assert!(DamageComponent::combine(&[], 0).is_err());
}
