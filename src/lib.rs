//! # DS Arena
//!
//! A persistence-backed game-state API: players spend action points fighting
//! randomly drawn enemies, earn coin and score for each defeat, and spend coin
//! on potions that restore their combat stats.
//!
//! ## Architecture
//!
//! Endpoints validate the request body once into a typed command and hand it
//! to the [`Engine`], which owns the injected player repository, catalog and
//! random source. Every mutating operation holds a per-player lock across its
//! read-modify-write, so concurrent requests for one player are applied one
//! after another while different players proceed independently. Store calls
//! are bounded by a timeout and surface as retryable `Unavailable` errors.
//!
//! The API is built on Rocket with OpenAPI documentation served at `/swagger`.

// Rocket makes this a bit tricky to support
#![allow(clippy::module_name_repetitions)]
#[macro_use]
extern crate rocket;

use std::sync::Arc;

use log::{error, info};
use rocket::fairing::AdHoc;
use rocket::http::Status as HttpStatus;
use rocket::serde::json::Json;
use rocket::{Build, Request, Rocket};
use rocket_okapi::openapi_get_routes;
use rocket_okapi::swagger_ui::{make_swagger_ui, SwaggerUIConfig};

pub mod action;
pub mod actions_log;
pub mod auth;
pub mod catalog;
pub mod config;
pub mod encounter;
pub mod engine;
pub mod error;
pub mod inventory;
pub mod journal;
pub mod player;
pub mod status_messages;

pub use crate::engine::Engine;

use crate::auth::{AuthRejection, StaticTokenVerifier, TokenVerifier};
use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::status_messages::{new_status, Status};

/// Builds the server from Rocket's figment (`Rocket.toml`, `ROCKET_*` env).
///
/// The engine is assembled on ignite; bad configuration aborts launch.
///
/// # Example
///
/// ```no_run
/// use ds_arena::rocket_initialize;
///
/// #[rocket::main]
/// async fn main() {
///     let _ = rocket_initialize().launch().await;
/// }
/// ```
pub fn rocket_initialize() -> Rocket<Build> {
    mount_routes(rocket::build()).attach(AdHoc::try_on_ignite("engine", |rocket| async move {
        let config: EngineConfig = match rocket.figment().extract() {
            Ok(c) => c,
            Err(e) => {
                error!("Invalid engine configuration: {}", e);
                return Err(rocket);
            }
        };
        match Engine::from_config(&config) {
            Ok(engine) => {
                let verifier: Arc<dyn TokenVerifier> =
                    Arc::new(StaticTokenVerifier::new(config.auth_tokens.clone()));
                Ok(rocket.manage(engine).manage(verifier))
            }
            Err(e) => {
                error!("Engine failed to start: {}", e);
                Err(rocket)
            }
        }
    }))
}

/// Builds the server from an explicit configuration instead of the figment.
pub fn rocket_with_config(config: EngineConfig) -> EngineResult<Rocket<Build>> {
    let engine = Engine::from_config(&config)?;
    let verifier = Arc::new(StaticTokenVerifier::new(config.auth_tokens));
    Ok(rocket_with_engine(engine, verifier))
}

/// Builds the server around an already assembled engine and token verifier.
pub fn rocket_with_engine(engine: Engine, verifier: Arc<dyn TokenVerifier>) -> Rocket<Build> {
    mount_routes(rocket::build()).manage(engine).manage(verifier)
}

fn mount_routes(rocket: Rocket<Build>) -> Rocket<Build> {
    use crate::action::{okapi_add_operation_for_play_, play};
    use crate::actions_log::{list_actions_log, okapi_add_operation_for_list_actions_log_};
    use crate::catalog::{
        list_almanac, list_shop, okapi_add_operation_for_list_almanac_,
        okapi_add_operation_for_list_shop_,
    };
    use crate::encounter::{okapi_add_operation_for_tick_, tick};
    use crate::inventory::{
        buy_item, delete_item, list_inventory, okapi_add_operation_for_buy_item_,
        okapi_add_operation_for_delete_item_, okapi_add_operation_for_list_inventory_,
        okapi_add_operation_for_use_item_, use_item,
    };
    use crate::player::endpoints::{
        get_player, leaderboard, okapi_add_operation_for_get_player_,
        okapi_add_operation_for_leaderboard_, okapi_add_operation_for_provision_player_,
        provision_player,
    };

    let _ = env_logger::try_init();

    rocket
        .mount(
            "/",
            openapi_get_routes![
                play,
                tick,
                buy_item,
                use_item,
                delete_item,
                list_inventory,
                get_player,
                provision_player,
                leaderboard,
                list_shop,
                list_almanac,
                list_actions_log
            ],
        )
        .mount("/swagger", make_swagger_ui(&get_docs()))
        .register(
            "/",
            catchers![
                bad_request,
                unauthorized,
                forbidden,
                not_found,
                unprocessable,
                internal_error
            ],
        )
        .attach(AdHoc::on_shutdown("journal-flush", |rocket| {
            Box::pin(async move {
                if let Some(engine) = rocket.state::<Engine>() {
                    info!("Flushing journal before shutdown");
                    engine.journal().shutdown();
                }
            })
        }))
}

fn get_docs() -> SwaggerUIConfig {
    SwaggerUIConfig {
        url: "/openapi.json".to_string(),
        ..Default::default()
    }
}

#[catch(400)]
fn bad_request(_req: &Request) -> Json<Status> {
    new_status("Malformed request body".to_string())
}

#[catch(401)]
fn unauthorized(req: &Request) -> Json<Status> {
    new_status(AuthRejection::of(req))
}

#[catch(403)]
fn forbidden(_req: &Request) -> Json<Status> {
    new_status("Unauthorized".to_string())
}

#[catch(404)]
fn not_found(req: &Request) -> Json<Status> {
    new_status(format!(
        "The endpoint {} is not available; see /swagger for the endpoints that are",
        req.uri()
    ))
}

/// Well-formed JSON that does not fit the request schema.
#[catch(422)]
fn unprocessable(_req: &Request) -> (HttpStatus, Json<Status>) {
    (
        HttpStatus::BadRequest,
        new_status("Request body does not match the expected fields".to_string()),
    )
}

#[catch(500)]
fn internal_error(_req: &Request) -> Json<Status> {
    new_status("An internal error occurred".to_string())
}
