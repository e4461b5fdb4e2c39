// Per-player serialization of concurrent mutations
mod common;

use std::sync::Arc;

use common::{bearer, facing, scripted_engine, verifier, ALICE_TOKEN};
use ds_arena::action::PlayerAction;
use ds_arena::error::EngineError;
use ds_arena::{player, rocket_with_engine};
use rocket::http::ContentType;
use rocket::local::asynchronous::Client;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn last_attack_point_is_spent_once() {
    for _ in 0..20 {
        let engine = Arc::new(scripted_engine(vec![]));
        let mut start = facing("alice", "Dragon", 14);
        start.attack_action = 1;
        engine.provision(start).await.expect("provision");

        let mut handles = Vec::new();
        for _ in 0..2 {
            let engine = Arc::clone(&engine);
            handles.push(tokio::spawn(async move {
                engine.resolve("alice", PlayerAction::Attack).await
            }));
        }
        let mut ok = 0;
        let mut refused = 0;
        for h in handles {
            match h.await.expect("task panicked") {
                Ok(_) => ok += 1,
                Err(EngineError::InsufficientResource(_)) => refused += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!((ok, refused), (1, 1));

        let stored = engine.player("alice").await.expect("player");
        assert_eq!(stored.attack_action, 0);
        assert_eq!(stored.encounter.map(|e| e.enemy_current_health), Some(12));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_purchases_never_overspend() {
    let engine = Arc::new(scripted_engine(vec![]));
    let mut start = player::new("alice");
    start.coin = 20;
    engine.provision(start).await.expect("provision");

    let mut handles = Vec::new();
    for _ in 0..16 {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            engine.buy("alice", "Attack Potion").await
        }));
    }
    let mut bought = 0;
    for h in handles {
        if h.await.expect("task panicked").is_ok() {
            bought += 1;
        }
    }
    assert_eq!(bought, 5);

    let stored = engine.player("alice").await.expect("player");
    assert_eq!(stored.coin, 0);
    assert_eq!(stored.inventory.len(), 5);
    assert_eq!(engine.locks().tracked(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn players_progress_independently() {
    let engine = Arc::new(scripted_engine(vec![]));
    let ids: Vec<String> = (0..8).map(|i| format!("p{i}")).collect();
    for id in &ids {
        engine.provision(player::new(id.as_str())).await.expect("provision");
    }

    let mut handles = Vec::new();
    for id in ids.clone() {
        for _ in 0..5 {
            let engine = Arc::clone(&engine);
            let id = id.clone();
            handles.push(tokio::spawn(async move {
                engine.resolve(&id, PlayerAction::Evade).await
            }));
        }
    }
    for h in handles {
        h.await.expect("task panicked").expect("evade");
    }

    for id in &ids {
        let stored = engine.player(id).await.expect("player");
        assert_eq!(stored.evade_action, 0);
    }
    let seqs: Vec<u64> = engine.journal().entries().iter().map(|e| e.seq).collect();
    assert_eq!(seqs, (1..=seqs.len() as u64).collect::<Vec<_>>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_http_attacks_spend_one_point() {
    let engine = scripted_engine(vec![]);
    let mut start = facing("alice", "Dragon", 14);
    start.attack_action = 1;
    engine.provision(start).await.expect("provision");
    let client = Client::tracked(rocket_with_engine(engine, verifier()))
        .await
        .expect("valid rocket instance");

    let body = r#"{ "player_id": "alice", "action": "attack" }"#;
    let first = client
        .post("/action")
        .header(ContentType::JSON)
        .header(bearer(ALICE_TOKEN))
        .body(body)
        .dispatch();
    let second = client
        .post("/action")
        .header(ContentType::JSON)
        .header(bearer(ALICE_TOKEN))
        .body(body)
        .dispatch();
    let (first, second) = tokio::join!(first, second);
    let mut codes = vec![first.status().code, second.status().code];
    codes.sort_unstable();
    assert_eq!(codes, vec![200, 400]);
}
