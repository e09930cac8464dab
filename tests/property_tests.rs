use damage_pipeline::*;
use proptest::prelude::*;
use std::collections::HashSet;

fn build_tree(root: f64, subs: &[(f64, Option<f64>)]) -> Pack {
    let mut pack = Pack::new(root);
    for &(value, grandchild) in subs {
        let mut sub = Pack::new(value);
        if let Some(g) = grandchild {
            sub.add_sub_pack(Pack::new(g));
        }
        pack.add_sub_pack(sub);
    }
    pack
}

fn mode_strategy() -> impl Strategy<Value = PackMode> {
    prop_oneof![Just(PackMode::Add), Just(PackMode::Set), Just(PackMode::Subtract)]
}

fn sub_strategy() -> impl Strategy<Value = Vec<(f64, Option<f64>)>> {
    prop::collection::vec((0.1f64..50.0, prop::option::of(0.1f64..50.0)), 0..6)
}

proptest! {
    #[test]
    fn test_exhaustion_is_permanent(values in prop::collection::vec(-50.0f64..50.0, 1..20)) {
        let mut pack = Pack::new(values[0]);
        let mut was_exhausted = pack.is_exhausted();
        for &value in &values[1..] {
            pack.set_value(value);
            if was_exhausted {
                prop_assert!(pack.is_exhausted());
                prop_assert_eq!(pack.value(), 0.0);
            }
            prop_assert!(pack.value() >= 0.0);
            was_exhausted = pack.is_exhausted();
        }
    }

    #[test]
    fn test_post_order_ends_with_root(root in 0.1f64..100.0, subs in sub_strategy()) {
        let pack = build_tree(root, &subs);
        let ids = pack.all_pack_ids();

        let expected = 1 + subs.len() + subs.iter().filter(|(_, g)| g.is_some()).count();
        prop_assert_eq!(ids.len(), expected);
        prop_assert_eq!(ids.last().copied(), Some(pack.id()));

        // Every sub-pack appears after all of its own descendants
        for sub in pack.sub_packs() {
            let own = ids.iter().position(|&id| id == sub.id()).unwrap();
            for grandchild in sub.sub_packs() {
                let below = ids.iter().position(|&id| id == grandchild.id()).unwrap();
                prop_assert!(below < own);
            }
        }
    }

    #[test]
    fn test_clone_is_independent(root in 0.1f64..100.0, subs in sub_strategy()) {
        let original = build_tree(root, &subs);
        let mut copy = original.clone();

        let original_ids: HashSet<PackId> = original.all_pack_ids().into_iter().collect();
        prop_assert!(copy.all_pack_ids().iter().all(|id| !original_ids.contains(id)));
        prop_assert_eq!(copy.total_value(), original.total_value());

        copy.set_value(0.0);
        prop_assert!(!original.is_exhausted());
        prop_assert_eq!(original.value(), root);
    }

    #[test]
    fn test_empty_filter_matches_everything(tags in prop::collection::vec(0i64..10, 0..5)) {
        let mut pack = Pack::new(1.0);
        for tag in tags {
            pack.add_tag(tag);
        }
        prop_assert!(pack.has_tag_in(&[]));
    }

    #[test]
    fn test_subtract_conserves_value(
        value_max in 1.0f64..500.0,
        fraction in 0.0f64..=1.0,
        hit in 0.1f64..1000.0,
    ) {
        let mut meter = Meter::new(Some(value_max * fraction), value_max);
        let before = meter.value();
        let mut pack = Pack::new(hit);
        meter.transfer(&mut pack);

        let drained = before - meter.value();
        prop_assert!((drained + pack.value() - hit).abs() < 1e-9 * hit.max(1.0));
        prop_assert!(pack.value() == 0.0 || meter.value() == 0.0);
    }

    #[test]
    fn test_meter_stays_in_range(
        value_max in 1.0f64..200.0,
        packs in prop::collection::vec((0.1f64..300.0, mode_strategy()), 1..30),
    ) {
        let mut pipeline = Pipeline::new();
        let hp = pipeline.add_meter(MeterParams::named("hp").with_value_max(value_max));
        for (value, mode) in packs {
            pipeline.receive(hp, Pack::new(value).with_mode(mode)).unwrap();
            let meter = pipeline.meter(hp).unwrap();
            prop_assert!(meter.value() >= 0.0);
            prop_assert!(meter.value() <= meter.meter().value_max());
        }
    }

    #[test]
    fn test_shield_chain_conserves_damage(shield_value in 0.0f64..50.0, hit in 0.1f64..100.0) {
        let mut pipeline = Pipeline::new();
        let shield = pipeline.add_meter(MeterParams::named("shield").with_value(shield_value));
        let hp = pipeline.add_meter(MeterParams::named("hp").with_value_max(1000.0));
        pipeline.add_child(shield, hp).unwrap();

        pipeline.receive(shield, Pack::new(hit)).unwrap();

        let absorbed = (shield_value - pipeline.meter(shield).unwrap().value())
            + (1000.0 - pipeline.meter(hp).unwrap().value());
        prop_assert!((absorbed - hit).abs() < 1e-9 * hit.max(1.0));
    }
}
