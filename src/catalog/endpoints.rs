use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

use super::{EnemyDefinition, ItemDefinition};
use crate::engine::Engine;
use crate::error::EngineError;

/// Every potion for sale.
#[openapi]
#[get("/shop")]
pub async fn list_shop(engine: &State<Engine>) -> Result<Json<Vec<ItemDefinition>>, EngineError> {
    Ok(Json(engine.shop().await?))
}

/// Every enemy a player can meet, with rewards and skills.
#[openapi]
#[get("/almanac")]
pub async fn list_almanac(
    engine: &State<Engine>,
) -> Result<Json<Vec<EnemyDefinition>>, EngineError> {
    Ok(Json(engine.almanac().await?))
}
