// Property-based tests: stat caps and validate-before-write over random operation sequences
use std::sync::Arc;

use ds_arena::action::PlayerAction;
use ds_arena::catalog::StaticCatalog;
use ds_arena::encounter::random::PcgRandom;
use ds_arena::player::{self, MemoryPlayerRepository, MAX_ATTACK_ACTION, MAX_EVADE_ACTION, MAX_HEALTH_PTS};
use ds_arena::Engine;
use proptest::prelude::*;

const ITEMS: [&str; 5] = ["Health Potion", "Attack Potion", "Evade Potion", "Elixir", "Mana Potion"];

#[derive(Debug, Clone)]
enum Op {
    Act(PlayerAction),
    Tick,
    Buy(usize),
    Use(usize),
    Delete(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Act(PlayerAction::Attack)),
        Just(Op::Act(PlayerAction::Evade)),
        Just(Op::Act(PlayerAction::Defend)),
        Just(Op::Tick),
        (0..ITEMS.len()).prop_map(Op::Buy),
        (0..ITEMS.len()).prop_map(Op::Use),
        (0..ITEMS.len()).prop_map(Op::Delete),
    ]
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("tokio runtime")
}

proptest! {
    #[test]
    fn proptest_operations_respect_caps_and_leave_failures_unwritten(
        seed in any::<u64>(),
        coin in 0u64..60,
        ops in prop::collection::vec(op_strategy(), 0..40)
    ) {
        runtime().block_on(async {
            let engine = Engine::new(
                Arc::new(MemoryPlayerRepository::new()),
                Arc::new(StaticCatalog::builtin()),
                Box::new(PcgRandom::from_seed(seed)),
            );
            let mut start = player::new("alice");
            start.coin = coin;
            engine.provision(start).await.expect("provision");

            for op in &ops {
                let before = engine.player("alice").await.expect("player");
                let result = match op {
                    Op::Act(action) => engine.resolve("alice", *action).await,
                    Op::Tick => engine.advance_encounter("alice").await,
                    Op::Buy(i) => engine.buy("alice", ITEMS[*i]).await,
                    Op::Use(i) => engine.use_item("alice", ITEMS[*i]).await,
                    Op::Delete(i) => engine.delete_item("alice", ITEMS[*i]).await,
                };
                let after = engine.player("alice").await.expect("player");
                match result {
                    Ok(returned) => {
                        prop_assert_eq!(&returned, &after);
                        prop_assert!(after.health_pts <= MAX_HEALTH_PTS);
                        prop_assert!(after.attack_action <= MAX_ATTACK_ACTION);
                        prop_assert!(after.evade_action <= MAX_EVADE_ACTION);
                        prop_assert!(after.coin <= coin + after.current_score * 2);
                    }
                    Err(_) => prop_assert_eq!(&before, &after),
                }
            }
            Ok(())
        })?;
    }

    #[test]
    fn proptest_buy_then_use_matches_capped_sum(
        health in 0u32..=MAX_HEALTH_PTS,
        attack in 0u32..=MAX_ATTACK_ACTION,
        evade in 0u32..=MAX_EVADE_ACTION,
        pick in 0usize..4
    ) {
        runtime().block_on(async {
            let engine = Engine::new(
                Arc::new(MemoryPlayerRepository::new()),
                Arc::new(StaticCatalog::builtin()),
                Box::new(PcgRandom::from_seed(1)),
            );
            let mut start = player::new("alice");
            start.health_pts = health;
            start.attack_action = attack;
            start.evade_action = evade;
            start.coin = 12;
            engine.provision(start).await.expect("provision");

            let item = ITEMS[pick];
            let bought = engine.buy("alice", item).await.expect("buy");
            let potion = bought.inventory.last().cloned().expect("owned copy");
            prop_assert_eq!(bought.inventory.len(), 1);

            match engine.use_item("alice", item).await {
                Ok(used) => {
                    let capped = |cur: u32, delta: i32, cap: u32| (cur as i64 + delta as i64).min(cap as i64) as u32;
                    prop_assert_eq!(used.health_pts, capped(health, potion.health_delta, MAX_HEALTH_PTS));
                    prop_assert_eq!(used.attack_action, capped(attack, potion.attack_delta, MAX_ATTACK_ACTION));
                    prop_assert_eq!(used.evade_action, capped(evade, potion.evade_delta, MAX_EVADE_ACTION));
                    prop_assert!(used.inventory.is_empty());
                }
                Err(_) => {
                    prop_assert!(health == MAX_HEALTH_PTS && attack == MAX_ATTACK_ACTION && evade == MAX_EVADE_ACTION);
                }
            }
            Ok(())
        })?;
    }
}
