//! Enemy Director: respawns defeated enemies, pays out defeat rewards, and
//! telegraphs the acting enemy's next move.

use log::{info, warn};
use rocket::serde::{Deserialize, Serialize};
use rocket_okapi::JsonSchema;

mod endpoints;
pub mod random;

pub use endpoints::{okapi_add_operation_for_tick_, tick, TickRequest};

use crate::catalog::EnemyDefinition;
use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};
use crate::journal::ActionPayload;
use crate::player::{Encounter, PlayerState};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct DefeatReward {
    pub enemy: String,
    pub coin_reward: u64,
    pub score_reward: u64,
}

/// The enemy left standing after a tick, and what the tick paid out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct EncounterOutcome {
    pub enemy: String,
    pub enemy_health: i64,
    pub next_move: String,
    pub defeated: Option<DefeatReward>,
}

impl EncounterOutcome {
    /// Journal record for this outcome.
    pub fn journal_payload(&self) -> (&'static str, ActionPayload) {
        match &self.defeated {
            Some(reward) => (
                "EnemyDefeated",
                ActionPayload::EnemyDefeated {
                    enemy: reward.enemy.clone(),
                    coin_reward: reward.coin_reward,
                    score_reward: reward.score_reward,
                    next_enemy: self.enemy.clone(),
                },
            ),
            None => (
                "EncounterTick",
                ActionPayload::EncounterTick {
                    enemy: self.enemy.clone(),
                    enemy_health: self.enemy_health,
                    next_move: self.next_move.clone(),
                },
            ),
        }
    }
}

impl Engine {
    /// One round of the player's encounter, applied to `state` in place.
    ///
    /// At zero or less health the enemy is defeated: its rewards are credited
    /// and a new enemy is drawn from the whole almanac (repeats allowed).
    /// Otherwise the enemy stays as it is. Either way the acting enemy gets a
    /// freshly drawn next move. The caller persists `state`.
    pub async fn on_encounter_tick(&self, state: &mut PlayerState) -> EngineResult<EncounterOutcome> {
        let encounter = match &state.encounter {
            Some(e) => e.clone(),
            None => return self.engage(state).await,
        };

        let (acting, health, defeated) = if encounter.enemy_current_health <= 0 {
            let fallen = self.known_enemy(&encounter.current_enemy).await?;
            state.coin = state.coin.saturating_add(fallen.coin_reward);
            state.current_score = state.current_score.saturating_add(fallen.score_reward);
            info!(
                "Player {} defeated {}: +{} coin, +{} score",
                state.player_id, fallen.name, fallen.coin_reward, fallen.score_reward
            );
            let next = self.draw_enemy().await?;
            let health = next.base_health;
            let reward = DefeatReward {
                enemy: fallen.name,
                coin_reward: fallen.coin_reward,
                score_reward: fallen.score_reward,
            };
            (next, health, Some(reward))
        } else {
            let current = self.known_enemy(&encounter.current_enemy).await?;
            (current, encounter.enemy_current_health, None)
        };

        let next_move = self.draw_skill(&acting).await?;
        state.encounter = Some(Encounter {
            current_enemy: acting.name.clone(),
            enemy_current_health: health,
            enemy_next_move: next_move.clone(),
        });
        info!(
            "Player {} now faces {} ({} hp), next move {}",
            state.player_id, acting.name, health, next_move
        );
        Ok(EncounterOutcome {
            enemy: acting.name,
            enemy_health: health,
            next_move,
            defeated,
        })
    }

    /// Assign a fresh enemy at full health to a player who has none.
    pub async fn engage(&self, state: &mut PlayerState) -> EngineResult<EncounterOutcome> {
        let enemy = self.draw_enemy().await?;
        let next_move = self.draw_skill(&enemy).await?;
        info!(
            "Player {} engaged by {} ({} hp)",
            state.player_id, enemy.name, enemy.base_health
        );
        state.encounter = Some(Encounter {
            current_enemy: enemy.name.clone(),
            enemy_current_health: enemy.base_health,
            enemy_next_move: next_move.clone(),
        });
        Ok(EncounterOutcome {
            enemy: enemy.name,
            enemy_health: enemy.base_health,
            next_move,
            defeated: None,
        })
    }

    /// Tick the stored encounter for `player_id` and persist the result.
    pub async fn advance_encounter(&self, player_id: &str) -> EngineResult<PlayerState> {
        let _guard = self.locks().acquire(player_id).await;
        let record = self.load(player_id).await?;
        let mut state = record.state;
        let outcome = self.on_encounter_tick(&mut state).await?;
        self.commit(record.version, state, vec![outcome.journal_payload()])
            .await
    }

    async fn known_enemy(&self, name: &str) -> EngineResult<EnemyDefinition> {
        match self.enemy(name).await? {
            Some(enemy) => Ok(enemy),
            None => {
                warn!("Enemy {} missing from almanac", name);
                Err(EngineError::DataIntegrity(format!(
                    "Enemy {name} is not in the almanac"
                )))
            }
        }
    }

    async fn draw_enemy(&self) -> EngineResult<EnemyDefinition> {
        let mut roster = self.almanac().await?;
        if roster.is_empty() {
            warn!("Almanac is empty; no enemy to assign");
            return Err(EngineError::DataIntegrity("Almanac has no enemies".to_string()));
        }
        let idx = self.pick(roster.len()).await;
        Ok(roster.swap_remove(idx))
    }

    async fn draw_skill(&self, enemy: &EnemyDefinition) -> EngineResult<String> {
        if enemy.skills.is_empty() {
            warn!("No skills found for enemy {}", enemy.name);
            return Err(EngineError::DataIntegrity(format!(
                "Enemy {} has no skills available",
                enemy.name
            )));
        }
        let idx = self.pick(enemy.skills.len()).await;
        Ok(enemy.skills[idx].clone())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::random::ScriptedRandom;
    use super::*;
    use crate::catalog::StaticCatalog;
    use crate::player::{self, MemoryPlayerRepository};

    fn director(choices: Vec<usize>, enemies: Vec<EnemyDefinition>) -> Engine {
        let catalog = StaticCatalog::new(enemies, vec![]).expect("catalog");
        Engine::new(
            Arc::new(MemoryPlayerRepository::new()),
            Arc::new(catalog),
            Box::new(ScriptedRandom::new(choices)),
        )
    }

    fn enemy(name: &str, base_health: i64, skills: &[&str]) -> EnemyDefinition {
        EnemyDefinition {
            name: name.to_string(),
            base_health,
            coin_reward: 3,
            score_reward: 2,
            skills: skills.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn facing(name: &str, health: i64) -> PlayerState {
        let mut p = player::new("p1");
        p.encounter = Some(Encounter {
            current_enemy: name.to_string(),
            enemy_current_health: health,
            enemy_next_move: "Idle".to_string(),
        });
        p
    }

    #[rocket::async_test]
    async fn living_enemy_only_changes_its_move() {
        let engine = director(vec![1], vec![enemy("Slime", 4, &["Bounce", "Split"])]);
        let mut state = facing("Slime", 3);
        let outcome = engine.on_encounter_tick(&mut state).await.expect("tick");
        assert_eq!(outcome.defeated, None);
        assert_eq!(outcome.enemy_health, 3);
        assert_eq!(outcome.next_move, "Split");
        assert_eq!(state.coin, 0);
        assert_eq!(state.encounter.expect("encounter").enemy_next_move, "Split");
    }

    #[rocket::async_test]
    async fn defeat_pays_out_and_respawns() {
        let engine = director(
            vec![1, 0],
            vec![enemy("Slime", 4, &["Bounce"]), enemy("Goblin", 6, &["Stab"])],
        );
        let mut state = facing("Slime", -2);
        let outcome = engine.on_encounter_tick(&mut state).await.expect("tick");
        assert_eq!(
            outcome.defeated,
            Some(DefeatReward {
                enemy: "Slime".to_string(),
                coin_reward: 3,
                score_reward: 2
            })
        );
        assert_eq!(state.coin, 3);
        assert_eq!(state.current_score, 2);
        let encounter = state.encounter.expect("encounter");
        assert_eq!(encounter.current_enemy, "Goblin");
        assert_eq!(encounter.enemy_current_health, 6);
        assert_eq!(encounter.enemy_next_move, "Stab");
    }

    #[rocket::async_test]
    async fn unknown_enemy_is_a_data_integrity_failure() {
        let engine = director(vec![], vec![enemy("Slime", 4, &["Bounce"])]);
        let mut state = facing("Wraith", 0);
        let err = engine.on_encounter_tick(&mut state).await.unwrap_err();
        assert!(matches!(err, EngineError::DataIntegrity(_)));
        assert_eq!(state.coin, 0);
    }

    #[rocket::async_test]
    async fn skill_less_enemy_is_a_data_integrity_failure() {
        let engine = director(vec![], vec![enemy("Statue", 4, &[])]);
        let mut state = facing("Statue", 4);
        let err = engine.on_encounter_tick(&mut state).await.unwrap_err();
        assert_eq!(
            err,
            EngineError::DataIntegrity("Enemy Statue has no skills available".to_string())
        );
    }

    #[rocket::async_test]
    async fn player_without_enemy_is_engaged() {
        let engine = director(vec![0, 0], vec![enemy("Slime", 4, &["Bounce"])]);
        let mut state = player::new("p1");
        let outcome = engine.on_encounter_tick(&mut state).await.expect("tick");
        assert_eq!(outcome.enemy, "Slime");
        assert_eq!(outcome.enemy_health, 4);
        assert!(state.encounter.is_some());
    }
}
