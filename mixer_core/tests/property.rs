use mixer_core::{
    AllocationEngine, CalibrationTable, Direction, Ingredient, Percentage, TotalCheck,
};
use proptest::prelude::*;

fn direction() -> impl Strategy<Value = Direction> {
    prop_oneof![Just(Direction::Clockwise), Just(Direction::CounterClockwise)]
}

proptest! {
    #[test]
    fn accepted_allocations_never_exceed_one_hundred(
        turns in prop::collection::vec(prop::collection::vec(direction(), 0..12), 4)
    ) {
        let mut engine = AllocationEngine::new();
        for (ingredient, dirs) in Ingredient::ALL.into_iter().zip(&turns) {
            for d in dirs {
                engine.adjust(*d);
            }
            prop_assert_eq!(engine.commit_current().unwrap(), ingredient);
        }
        let sum: u16 = Ingredient::ALL
            .into_iter()
            .map(|i| u16::from(engine.committed(i).value()))
            .sum();
        match engine.validate_total().unwrap() {
            TotalCheck::Ok(a) => {
                prop_assert!(a.total() <= 100);
                prop_assert_eq!(a.total(), sum);
            }
            TotalCheck::Exceeded { total } => {
                prop_assert!(total > 100);
                prop_assert_eq!(total, sum);
            }
        }
    }

    #[test]
    fn encoder_value_stays_on_the_step_grid(dirs in prop::collection::vec(direction(), 0..40)) {
        let mut engine = AllocationEngine::new();
        for d in dirs {
            let v = engine.adjust(d);
            prop_assert!(Percentage::try_new(v.value()).is_ok());
        }
    }

    #[test]
    fn clamping_is_idempotent_at_the_ends(extra in 0usize..10) {
        let mut engine = AllocationEngine::new();
        for _ in 0..(5 + extra) {
            engine.adjust(Direction::Clockwise);
        }
        prop_assert_eq!(engine.working(), Percentage::FULL);
        for _ in 0..(5 + extra) {
            engine.adjust(Direction::CounterClockwise);
        }
        prop_assert_eq!(engine.working(), Percentage::ZERO);
    }

    #[test]
    fn off_grid_values_never_actuate(value in any::<u8>()) {
        let table = CalibrationTable::default();
        let d = table.duration_for_raw(value);
        match Percentage::try_new(value) {
            Ok(p) => prop_assert_eq!(d, table.duration_for(p)),
            Err(_) => prop_assert_eq!(d, std::time::Duration::ZERO),
        }
    }

    #[test]
    fn custom_tables_must_start_at_zero_and_not_decrease(
        ms in prop::array::uniform6(0u64..20_000)
    ) {
        let ok = ms[0] == 0 && ms.windows(2).all(|w| w[0] <= w[1]);
        prop_assert_eq!(CalibrationTable::from_millis(ms).is_ok(), ok);
    }
}

#[test]
fn factory_table_is_monotonic() {
    let table = CalibrationTable::default();
    let durations: Vec<_> = table.entries().map(|(_, d)| d).collect();
    assert!(durations.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(durations[0], std::time::Duration::ZERO);
}
