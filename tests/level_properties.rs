//! 级别注册表的性质测试

use proptest::prelude::*;
use relay_log::{LevelDefinition, LevelRegistry, Rank};

/// 生成名称互不相同、rank 可重复（别名）的级别集合
fn definitions() -> impl Strategy<Value = Vec<LevelDefinition>> {
    prop::collection::vec(0i32..6, 1..8).prop_map(|ranks| {
        ranks
            .into_iter()
            .enumerate()
            .map(|(index, rank)| {
                let definition = LevelDefinition::new(format!("level{}", index), rank);
                if index == 0 {
                    definition.default_level()
                } else {
                    definition
                }
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn test_name_round_trip_is_stable(defs in definitions()) {
        let registry = LevelRegistry::new(defs.clone()).unwrap();
        for definition in &defs {
            let rank = registry.as_rank(definition.name.as_str()).unwrap();
            let preferred = registry.as_name(rank).unwrap();
            // 别名解析到最先声明的名称
            let first = defs.iter().find(|d| d.rank == rank).unwrap();
            prop_assert_eq!(preferred, first.name.as_str());
            prop_assert_eq!(registry.as_name(rank).unwrap(), preferred);
        }
    }

    #[test]
    fn test_meets_threshold_reflexive_and_monotonic(
        defs in definitions(),
        picks in prop::collection::vec(any::<prop::sample::Index>(), 3),
    ) {
        let registry = LevelRegistry::new(defs.clone()).unwrap();
        let level = picks[0].get(&defs).name.as_str();
        let strict = picks[1].get(&defs).name.as_str();
        let permissive = picks[2].get(&defs).name.as_str();

        prop_assert!(registry.meets_threshold(level, level).unwrap());

        let strict_rank: Rank = registry.as_rank(strict).unwrap();
        let permissive_rank: Rank = registry.as_rank(permissive).unwrap();
        if registry.meets_threshold(level, strict).unwrap()
            && strict_rank.is_at_least_as_severe_as(permissive_rank)
        {
            prop_assert!(registry.meets_threshold(level, permissive).unwrap());
        }
    }

    #[test]
    fn test_max_width_grows_with_threshold(defs in definitions(), pick in any::<prop::sample::Index>()) {
        let registry = LevelRegistry::new(defs.clone()).unwrap();
        let up_to = pick.get(&defs);
        let width = registry.max_width(up_to.name.as_str()).unwrap();
        prop_assert!(width >= up_to.name.len());
        prop_assert!(registry.max_width(registry.lowest_level_name()).unwrap() >= width);
    }
}
