//! Inventory Economy: buying, drinking and discarding potions.

use log::{info, warn};
use rocket::serde::{Deserialize, Serialize};
use rocket_okapi::JsonSchema;

mod endpoints;

pub use endpoints::{
    buy_item, delete_item, list_inventory, okapi_add_operation_for_buy_item_,
    okapi_add_operation_for_delete_item_, okapi_add_operation_for_list_inventory_,
    okapi_add_operation_for_use_item_, use_item,
};

use crate::action::required_field;
use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};
use crate::journal::ActionPayload;
use crate::player::{
    apply_capped, OwnedItem, PlayerState, MAX_ATTACK_ACTION, MAX_EVADE_ACTION, MAX_HEALTH_PTS,
};

/// Body shared by the buy, use and delete endpoints.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct ItemRequest {
    pub player_id: Option<String>,
    pub item_name: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ItemCommand {
    pub player_id: String,
    pub item_name: String,
}

impl TryFrom<ItemRequest> for ItemCommand {
    type Error = EngineError;

    fn try_from(request: ItemRequest) -> Result<Self, Self::Error> {
        Ok(ItemCommand {
            player_id: required_field(request.player_id, "player_id")?,
            item_name: required_field(request.item_name, "item_name")?,
        })
    }
}

/// Apply a potion's deltas, each stat clamped to `0..=cap`.
pub fn drink(state: &mut PlayerState, potion: &OwnedItem) {
    state.health_pts = apply_capped(state.health_pts, potion.health_delta, MAX_HEALTH_PTS);
    state.attack_action = apply_capped(state.attack_action, potion.attack_delta, MAX_ATTACK_ACTION);
    state.evade_action = apply_capped(state.evade_action, potion.evade_delta, MAX_EVADE_ACTION);
}

impl Engine {
    /// Buy one `item_name` from the shop, paying its cost in coin.
    pub async fn buy(&self, player_id: &str, item_name: &str) -> EngineResult<PlayerState> {
        let _guard = self.locks().acquire(player_id).await;
        let item = match self.item(item_name).await? {
            Some(item) => item,
            None => {
                warn!("Item not found: {}", item_name);
                return Err(EngineError::NotFound(format!("Item {item_name} not found")));
            }
        };
        let record = self.load(player_id).await?;
        let mut state = record.state;
        if state.coin < item.cost {
            warn!(
                "Player {} has insufficient coins ({}) to buy {} ({})",
                player_id, state.coin, item_name, item.cost
            );
            return Err(EngineError::InsufficientResource(format!(
                "Insufficient coins: {item_name} costs {}, you have {}",
                item.cost, state.coin
            )));
        }
        state.coin -= item.cost;
        state.inventory.push(OwnedItem::from(&item));
        info!(
            "Item {} purchased by player {}, remaining coins: {}",
            item_name, player_id, state.coin
        );
        let journal = vec![(
            "Buy",
            ActionPayload::Buy {
                item_name: item.item_name.clone(),
                cost: item.cost,
                coin: state.coin,
            },
        )];
        self.commit(record.version, state, journal).await
    }

    /// Drink the first owned `item_name`.
    ///
    /// Refused only when health, attack and evade are all already at their
    /// caps; otherwise whatever part of the effect fits is applied and exactly
    /// one copy is consumed.
    pub async fn use_item(&self, player_id: &str, item_name: &str) -> EngineResult<PlayerState> {
        let _guard = self.locks().acquire(player_id).await;
        let record = self.load(player_id).await?;
        let mut state = record.state;
        let idx = match state.inventory.iter().position(|i| i.item_name == item_name) {
            Some(idx) => idx,
            None => {
                warn!("Potion {} not found in inventory of {}", item_name, player_id);
                return Err(EngineError::NotFound(format!(
                    "Potion {item_name} not in inventory"
                )));
            }
        };
        if state.is_saturated() {
            warn!("Player {} has full stats; potion {} not used", player_id, item_name);
            return Err(EngineError::ResourceAtCapacity(
                "Health, attack and evade are already full".to_string(),
            ));
        }
        let potion = state.inventory.remove(idx);
        drink(&mut state, &potion);
        info!("Potion {} used by player {}", item_name, player_id);
        let journal = vec![(
            "UseItem",
            ActionPayload::UseItem {
                item_name: potion.item_name,
            },
        )];
        self.commit(record.version, state, journal).await
    }

    /// Throw away every owned copy of `item_name`.
    pub async fn delete_item(&self, player_id: &str, item_name: &str) -> EngineResult<PlayerState> {
        let _guard = self.locks().acquire(player_id).await;
        let record = self.load(player_id).await?;
        let mut state = record.state;
        let before = state.inventory.len();
        state.inventory.retain(|i| i.item_name != item_name);
        let removed = before - state.inventory.len();
        if removed == 0 {
            warn!("Item {} not found in inventory of {}", item_name, player_id);
            return Err(EngineError::NotFound(format!(
                "Item {item_name} not in inventory"
            )));
        }
        info!(
            "Removed {} x {} from inventory of {}",
            removed, item_name, player_id
        );
        let journal = vec![(
            "DeleteItem",
            ActionPayload::DeleteItem {
                item_name: item_name.to_string(),
                removed,
            },
        )];
        self.commit(record.version, state, journal).await
    }
}
