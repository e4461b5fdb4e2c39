use std::str::FromStr;

use log::{info, warn};
use rocket::serde::json::Json;
use rocket::serde::{Deserialize, Serialize};
use rocket::State;
use rocket_okapi::{openapi, JsonSchema};

use crate::auth::AuthenticatedPlayer;
use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};
use crate::journal::ActionPayload;
use crate::player::PlayerState;

/// Enemy health removed by one attack.
pub const ATTACK_DAMAGE: i64 = 2;

/// Combat actions a player can take in a round.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PlayerAction {
    Attack,
    Evade,
    Defend,
}

impl FromStr for PlayerAction {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "attack" => Ok(PlayerAction::Attack),
            "evade" => Ok(PlayerAction::Evade),
            "defend" => Ok(PlayerAction::Defend),
            other => Err(EngineError::InvalidArgument(format!(
                "Invalid action '{other}': expected attack, evade or defend"
            ))),
        }
    }
}

/// Body of `POST /action` as it arrives on the wire.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct ActionRequest {
    pub player_id: Option<String>,
    pub action: Option<String>,
}

/// A validated `ActionRequest`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ActionCommand {
    pub player_id: String,
    pub action: PlayerAction,
}

impl TryFrom<ActionRequest> for ActionCommand {
    type Error = EngineError;

    fn try_from(request: ActionRequest) -> Result<Self, Self::Error> {
        Ok(ActionCommand {
            player_id: required_field(request.player_id, "player_id")?,
            action: required_field(request.action, "action")?.parse()?,
        })
    }
}

/// A present, non-blank string field.
pub(crate) fn required_field(value: Option<String>, name: &str) -> EngineResult<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => {
            warn!("Request rejected: missing {}", name);
            Err(EngineError::InvalidArgument(format!(
                "Missing required field: {name}"
            )))
        }
    }
}

impl Engine {
    /// Apply one combat action for `player_id` and persist the result.
    ///
    /// Attacks and evades cost one action point each and fail without touching
    /// the record when the points are spent. An attack that brings the enemy to
    /// zero or below runs the defeat path before anything is saved. Defending
    /// costs nothing and writes nothing.
    pub async fn resolve(&self, player_id: &str, action: PlayerAction) -> EngineResult<PlayerState> {
        let _guard = self.locks().acquire(player_id).await;
        let record = self.load(player_id).await?;
        let mut state = record.state;

        match action {
            PlayerAction::Attack => {
                if state.attack_action == 0 {
                    warn!("Player {} cannot attack: no attack actions left", player_id);
                    return Err(EngineError::InsufficientResource(
                        "No attack actions left".to_string(),
                    ));
                }
                state.attack_action -= 1;
                if state.encounter.is_none() {
                    self.engage(&mut state).await?;
                }
                let (enemy, enemy_health) = match state.encounter.as_mut() {
                    Some(enc) => {
                        enc.enemy_current_health =
                            enc.enemy_current_health.saturating_sub(ATTACK_DAMAGE);
                        (enc.current_enemy.clone(), enc.enemy_current_health)
                    }
                    None => {
                        return Err(EngineError::DataIntegrity(format!(
                            "Player {player_id} has no enemy to attack"
                        )))
                    }
                };
                info!(
                    "Player {} attacked {}: enemy health now {}",
                    player_id, enemy, enemy_health
                );
                let mut journal = vec![(
                    "Attack",
                    ActionPayload::Attack {
                        enemy,
                        enemy_health,
                        attack_action: state.attack_action,
                    },
                )];
                if enemy_health <= 0 {
                    let outcome = self.on_encounter_tick(&mut state).await?;
                    journal.push(outcome.journal_payload());
                }
                self.commit(record.version, state, journal).await
            }
            PlayerAction::Evade => {
                if state.evade_action == 0 {
                    warn!("Player {} cannot evade: no evade actions left", player_id);
                    return Err(EngineError::InsufficientResource(
                        "No evade actions left".to_string(),
                    ));
                }
                state.evade_action -= 1;
                info!("Player {} evaded; {} left", player_id, state.evade_action);
                let journal = vec![(
                    "Evade",
                    ActionPayload::Evade {
                        evade_action: state.evade_action,
                    },
                )];
                self.commit(record.version, state, journal).await
            }
            PlayerAction::Defend => {
                info!("Player {} defends", player_id);
                self.journal()
                    .append("Defend", player_id, ActionPayload::Defend);
                Ok(state)
            }
        }
    }
}

/// Resolve one combat action for the authenticated player.
#[openapi]
#[post("/action", format = "json", data = "<request>")]
pub async fn play(
    engine: &State<Engine>,
    auth: AuthenticatedPlayer,
    request: Json<ActionRequest>,
) -> Result<Json<PlayerState>, EngineError> {
    let command = ActionCommand::try_from(request.into_inner())?;
    auth.authorize(&command.player_id)?;
    let state = engine.resolve(&command.player_id, command.action).await?;
    Ok(Json(state))
}
