use either::{Either, Left, Right};
use rocket::response::status::Created;
use rocket::serde::json::Json;
use rocket::serde::{Deserialize, Serialize};
use rocket::State;
use rocket_okapi::{openapi, JsonSchema};

use super::{Encounter, OwnedItem, PlayerState};
use crate::action::required_field;
use crate::auth::AuthenticatedPlayer;
use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};

/// Player record to create; omitted stats take registration defaults.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct ProvisionRequest {
    pub player_id: Option<String>,
    pub health_pts: Option<u32>,
    pub attack_action: Option<u32>,
    pub evade_action: Option<u32>,
    pub coin: Option<u64>,
    pub current_score: Option<u64>,
    #[serde(default)]
    pub inventory: Vec<OwnedItem>,
    pub current_enemy: Option<String>,
    pub enemy_current_health: Option<i64>,
    pub enemy_next_move: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct LeaderboardEntry {
    pub player_id: String,
    pub current_score: u64,
}

async fn build_state(engine: &Engine, request: ProvisionRequest) -> EngineResult<PlayerState> {
    let player_id = required_field(request.player_id, "player_id")?;
    let defaults = super::new(player_id);
    let encounter = match request.current_enemy {
        Some(name) => {
            let enemy = engine.enemy(&name).await?.ok_or_else(|| {
                EngineError::InvalidArgument(format!("Unknown enemy {name}"))
            })?;
            let next_move = match request.enemy_next_move {
                Some(m) => m,
                None => enemy.skills.first().cloned().ok_or_else(|| {
                    EngineError::DataIntegrity(format!("Enemy {name} has no skills available"))
                })?,
            };
            let enemy_current_health = request.enemy_current_health.unwrap_or(enemy.base_health);
            if !(0..=enemy.base_health).contains(&enemy_current_health) {
                return Err(EngineError::InvalidArgument(format!(
                    "enemy_current_health for {} must be between 0 and {}",
                    enemy.name, enemy.base_health
                )));
            }
            Some(Encounter {
                current_enemy: enemy.name,
                enemy_current_health,
                enemy_next_move: next_move,
            })
        }
        None if request.enemy_current_health.is_some() => {
            return Err(EngineError::InvalidArgument(
                "enemy_current_health given without current_enemy".to_string(),
            ))
        }
        None => None,
    };
    Ok(PlayerState {
        health_pts: request.health_pts.unwrap_or(defaults.health_pts),
        attack_action: request.attack_action.unwrap_or(defaults.attack_action),
        evade_action: request.evade_action.unwrap_or(defaults.evade_action),
        coin: request.coin.unwrap_or(defaults.coin),
        current_score: request.current_score.unwrap_or(defaults.current_score),
        inventory: request.inventory,
        encounter,
        player_id: defaults.player_id,
    })
}

/// Test endpoint: create or overwrite a player record.
#[openapi]
#[post("/tests/players", format = "json", data = "<request>")]
pub async fn provision_player(
    engine: &State<Engine>,
    request: Json<ProvisionRequest>,
) -> Result<Either<Created<Json<PlayerState>>, Json<PlayerState>>, EngineError> {
    let state = build_state(engine, request.into_inner()).await?;
    let record = engine.provision(state).await?;
    if record.version == 1 {
        let location = format!("/players/{}", record.state.player_id);
        Ok(Left(Created::new(location).body(Json(record.state))))
    } else {
        Ok(Right(Json(record.state)))
    }
}

/// Full stats of the authenticated player.
#[openapi]
#[get("/players/<player_id>")]
pub async fn get_player(
    engine: &State<Engine>,
    auth: AuthenticatedPlayer,
    player_id: &str,
) -> Result<Json<PlayerState>, EngineError> {
    auth.authorize(player_id)?;
    Ok(Json(engine.player(player_id).await?))
}

#[openapi]
#[get("/leaderboard")]
pub async fn leaderboard(
    engine: &State<Engine>,
) -> Result<Json<Vec<LeaderboardEntry>>, EngineError> {
    let ranked = engine.leaderboard().await?;
    Ok(Json(
        ranked
            .into_iter()
            .map(|p| LeaderboardEntry {
                player_id: p.player_id,
                current_score: p.current_score,
            })
            .collect(),
    ))
}
