use rocket::serde::json::Json;
use rocket::serde::{Deserialize, Serialize};
use rocket::State;
use rocket_okapi::{openapi, JsonSchema};

use crate::engine::Engine;
use crate::journal::{ActionEntry, LogQuery};

const DEFAULT_PAGE: usize = 1000;

#[derive(Serialize, Deserialize, JsonSchema, Debug)]
#[serde(crate = "rocket::serde")]
pub struct ActionLogResponse {
    pub entries: Vec<ActionEntry>,
    /// Pass as `from_seq` to fetch the next page; absent on the last one.
    pub next_seq: Option<u64>,
    pub limit: usize,
}

/// Committed transitions, oldest first, optionally narrowed to one player,
/// one action type, or entries after a millisecond timestamp.
#[openapi]
#[get("/actions/log?<from_seq>&<limit>&<action_type>&<player_id>&<since>")]
pub async fn list_actions_log(
    engine: &State<Engine>,
    from_seq: Option<u64>,
    limit: Option<usize>,
    action_type: Option<String>,
    player_id: Option<String>,
    since: Option<u128>,
) -> Json<ActionLogResponse> {
    let query = LogQuery {
        from_seq,
        action_type,
        player_id,
        since,
    };
    let limit = limit.unwrap_or(DEFAULT_PAGE);
    let (entries, next_seq) = engine.journal().page(&query, limit);
    Json(ActionLogResponse {
        entries,
        next_seq,
        limit,
    })
}
