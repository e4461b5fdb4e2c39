//! Canonical per-player record and the stat caps every transition must honour.

use rocket::serde::{Deserialize, Serialize};
use rocket_okapi::JsonSchema;

pub mod endpoints;
pub mod locks;
pub mod repository;

pub use locks::PlayerLocks;
pub use repository::{MemoryPlayerRepository, PlayerRepository, RepositoryError, Versioned};

use crate::catalog::ItemDefinition;

pub const MAX_HEALTH_PTS: u32 = 10;
pub const MAX_ATTACK_ACTION: u32 = 10;
pub const MAX_EVADE_ACTION: u32 = 5;

/// The enemy a player is currently facing.
///
/// Held as a single optional value on `PlayerState` so enemy health can only
/// exist while an enemy is assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct Encounter {
    pub current_enemy: String,
    pub enemy_current_health: i64,
    pub enemy_next_move: String,
}

/// Snapshot of a potion's effect taken at purchase time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct OwnedItem {
    pub item_name: String,
    pub health_delta: i32,
    pub attack_delta: i32,
    pub evade_delta: i32,
}

impl From<&ItemDefinition> for OwnedItem {
    fn from(item: &ItemDefinition) -> Self {
        OwnedItem {
            item_name: item.item_name.clone(),
            health_delta: item.health_delta,
            attack_delta: item.attack_delta,
            evade_delta: item.evade_delta,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct PlayerState {
    pub player_id: String,
    pub health_pts: u32,
    pub attack_action: u32,
    pub evade_action: u32,
    pub coin: u64,
    pub current_score: u64,
    #[serde(default)]
    pub inventory: Vec<OwnedItem>,
    #[serde(default)]
    pub encounter: Option<Encounter>,
}

/// A freshly registered player: full combat resources, empty purse, no enemy.
pub fn new(player_id: impl Into<String>) -> PlayerState {
    PlayerState {
        player_id: player_id.into(),
        health_pts: MAX_HEALTH_PTS,
        attack_action: MAX_ATTACK_ACTION,
        evade_action: MAX_EVADE_ACTION,
        coin: 0,
        current_score: 0,
        inventory: Vec::new(),
        encounter: None,
    }
}

/// Apply a signed delta to a capped stat, staying within `0..=cap`.
pub fn apply_capped(current: u32, delta: i32, cap: u32) -> u32 {
    let next = i64::from(current) + i64::from(delta);
    next.clamp(0, i64::from(cap)) as u32
}

impl PlayerState {
    pub fn within_caps(&self) -> bool {
        self.health_pts <= MAX_HEALTH_PTS
            && self.attack_action <= MAX_ATTACK_ACTION
            && self.evade_action <= MAX_EVADE_ACTION
    }

    /// True when no potion could raise any gated stat further.
    pub fn is_saturated(&self) -> bool {
        self.health_pts >= MAX_HEALTH_PTS
            && self.attack_action >= MAX_ATTACK_ACTION
            && self.evade_action >= MAX_EVADE_ACTION
    }
}

/// Highest `current_score` first, ties broken by player id, at most `limit` entries.
pub fn rank(mut players: Vec<PlayerState>, limit: usize) -> Vec<PlayerState> {
    players.sort_by(|a, b| {
        b.current_score
            .cmp(&a.current_score)
            .then_with(|| a.player_id.cmp(&b.player_id))
    });
    players.truncate(limit);
    players
}
