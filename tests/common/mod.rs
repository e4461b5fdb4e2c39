#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use ds_arena::auth::{StaticTokenVerifier, TokenVerifier};
use ds_arena::catalog::StaticCatalog;
use ds_arena::encounter::random::ScriptedRandom;
use ds_arena::player::{self, Encounter, MemoryPlayerRepository, PlayerRepository, PlayerState};
use ds_arena::{rocket_with_engine, Engine};
use rocket::http::Header;
use rocket::local::blocking::Client;

pub const ALICE_TOKEN: &str = "alice-token";
pub const BOB_TOKEN: &str = "bob-token";

/// Engine over the built-in catalog whose random draws follow `choices`.
pub fn scripted_engine(choices: Vec<usize>) -> Engine {
    engine_over(Arc::new(MemoryPlayerRepository::new()), choices)
}

pub fn engine_over(players: Arc<dyn PlayerRepository>, choices: Vec<usize>) -> Engine {
    Engine::new(
        players,
        Arc::new(StaticCatalog::builtin()),
        Box::new(ScriptedRandom::new(choices)),
    )
}

pub fn verifier() -> Arc<dyn TokenVerifier> {
    Arc::new(StaticTokenVerifier::new(HashMap::from([
        (ALICE_TOKEN.to_string(), "alice".to_string()),
        (BOB_TOKEN.to_string(), "bob".to_string()),
    ])))
}

pub fn client(engine: Engine) -> Client {
    Client::tracked(rocket_with_engine(engine, verifier())).expect("valid rocket instance")
}

pub fn bearer(token: &str) -> Header<'static> {
    Header::new("Authorization", format!("Bearer {token}"))
}

/// A registered player already facing `enemy` at `health`.
pub fn facing(player_id: &str, enemy: &str, health: i64) -> PlayerState {
    let mut state = player::new(player_id);
    state.encounter = Some(Encounter {
        current_enemy: enemy.to_string(),
        enemy_current_health: health,
        enemy_next_move: "Idle".to_string(),
    });
    state
}
