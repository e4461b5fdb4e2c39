use rocket::serde::json::Json;
use rocket::serde::{Deserialize, Serialize};
use rocket::State;
use rocket_okapi::{openapi, JsonSchema};

use crate::action::required_field;
use crate::auth::AuthenticatedPlayer;
use crate::engine::Engine;
use crate::error::EngineError;
use crate::player::PlayerState;

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct TickRequest {
    pub player_id: Option<String>,
}

/// Complete a combat round: refresh the enemy's next move, or pay out and
/// respawn if the enemy is down. Engages a new enemy when there is none.
#[openapi]
#[post("/encounter/tick", format = "json", data = "<request>")]
pub async fn tick(
    engine: &State<Engine>,
    auth: AuthenticatedPlayer,
    request: Json<TickRequest>,
) -> Result<Json<PlayerState>, EngineError> {
    let player_id = required_field(request.into_inner().player_id, "player_id")?;
    auth.authorize(&player_id)?;
    Ok(Json(engine.advance_encounter(&player_id).await?))
}
