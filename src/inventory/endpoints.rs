use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

use super::{ItemCommand, ItemRequest};
use crate::auth::AuthenticatedPlayer;
use crate::engine::Engine;
use crate::error::EngineError;
use crate::player::{OwnedItem, PlayerState};

fn authorized(auth: &AuthenticatedPlayer, request: ItemRequest) -> Result<ItemCommand, EngineError> {
    let command = ItemCommand::try_from(request)?;
    auth.authorize(&command.player_id)?;
    Ok(command)
}

/// Buy a potion from the shop.
#[openapi]
#[post("/inventory/buy", format = "json", data = "<request>")]
pub async fn buy_item(
    engine: &State<Engine>,
    auth: AuthenticatedPlayer,
    request: Json<ItemRequest>,
) -> Result<Json<PlayerState>, EngineError> {
    let command = authorized(&auth, request.into_inner())?;
    Ok(Json(engine.buy(&command.player_id, &command.item_name).await?))
}

/// Drink one owned potion.
#[openapi]
#[patch("/inventory/use", format = "json", data = "<request>")]
pub async fn use_item(
    engine: &State<Engine>,
    auth: AuthenticatedPlayer,
    request: Json<ItemRequest>,
) -> Result<Json<PlayerState>, EngineError> {
    let command = authorized(&auth, request.into_inner())?;
    Ok(Json(
        engine
            .use_item(&command.player_id, &command.item_name)
            .await?,
    ))
}

/// Discard every owned copy of an item.
#[openapi]
#[delete("/inventory", format = "json", data = "<request>")]
pub async fn delete_item(
    engine: &State<Engine>,
    auth: AuthenticatedPlayer,
    request: Json<ItemRequest>,
) -> Result<Json<PlayerState>, EngineError> {
    let command = authorized(&auth, request.into_inner())?;
    Ok(Json(
        engine
            .delete_item(&command.player_id, &command.item_name)
            .await?,
    ))
}

#[openapi]
#[get("/players/<player_id>/inventory")]
pub async fn list_inventory(
    engine: &State<Engine>,
    auth: AuthenticatedPlayer,
    player_id: &str,
) -> Result<Json<Vec<OwnedItem>>, EngineError> {
    auth.authorize(player_id)?;
    Ok(Json(engine.player(player_id).await?.inventory))
}
