use engine::formula::{derive_formula, evaluate, parse};
use engine::Dice;
use proptest::prelude::*;

proptest! {
    #[test]
    fn simple_formulas_round_trip(count in 1u32..10, faces in 1u32..100, bonus in 0i32..50) {
        let src = format!("{count}d{faces} + {bonus}");
        let terms = parse(&src).unwrap();
        prop_assert_eq!(derive_formula(&terms), src);
    }

    #[test]
    fn totals_stay_within_dice_bounds(count in 1u32..10, faces in 1u32..20, seed in 0u64..1000) {
        let src = format!("{count}d{faces}");
        let terms = parse(&src).unwrap();
        let mut dice = Dice::from_seed(seed);
        let eval = evaluate(&terms, &mut dice);
        prop_assert!(eval.total >= count as i32);
        prop_assert!(eval.total <= (count * faces) as i32);
    }

    #[test]
    fn keep_highest_never_beats_the_best_roll(seed in 0u64..1000) {
        let terms = parse("2d20kh").unwrap();
        let mut dice = Dice::from_seed(seed);
        let eval = evaluate(&terms, &mut dice);
        let best = eval.terms[0].rolls.iter().copied().max().unwrap();
        prop_assert_eq!(eval.total, best);
    }
}
