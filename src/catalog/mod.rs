//! Read-only almanac of enemies and the potion shop.

use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use log::{info, warn};
use rocket::serde::{Deserialize, Serialize};
use rocket_okapi::JsonSchema;

mod endpoints;

pub use endpoints::{
    list_almanac, list_shop, okapi_add_operation_for_list_almanac_,
    okapi_add_operation_for_list_shop_,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct EnemyDefinition {
    pub name: String,
    pub base_health: i64,
    pub coin_reward: u64,
    pub score_reward: u64,
    pub skills: Vec<String>,
}

/// A potion as sold in the shop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct ItemDefinition {
    pub item_name: String,
    pub cost: u64,
    pub health_delta: i32,
    pub attack_delta: i32,
    pub evade_delta: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("Catalog unavailable: {0}")]
    Unavailable(String),
    #[error("Invalid catalog: {0}")]
    Invalid(String),
}

#[rocket::async_trait]
pub trait Catalog: Send + Sync {
    async fn list_enemies(&self) -> Result<Vec<EnemyDefinition>, CatalogError>;
    async fn get_enemy(&self, name: &str) -> Result<Option<EnemyDefinition>, CatalogError>;
    async fn list_items(&self) -> Result<Vec<ItemDefinition>, CatalogError>;
    async fn get_item(&self, item_name: &str) -> Result<Option<ItemDefinition>, CatalogError>;
}

/// On-disk layout of a catalog file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct CatalogFile {
    #[serde(default)]
    pub enemies: Vec<EnemyDefinition>,
    #[serde(default)]
    pub items: Vec<ItemDefinition>,
}

/// Catalog held entirely in memory; immutable once built.
#[derive(Debug, Clone)]
pub struct StaticCatalog {
    enemies: Vec<EnemyDefinition>,
    items: Vec<ItemDefinition>,
}

impl StaticCatalog {
    pub fn new(
        enemies: Vec<EnemyDefinition>,
        items: Vec<ItemDefinition>,
    ) -> Result<Self, CatalogError> {
        let mut names = HashSet::new();
        for enemy in &enemies {
            if !names.insert(enemy.name.as_str()) {
                return Err(CatalogError::Invalid(format!(
                    "Duplicate enemy {}",
                    enemy.name
                )));
            }
            if enemy.base_health <= 0 {
                return Err(CatalogError::Invalid(format!(
                    "Enemy {} has non-positive base health {}",
                    enemy.name, enemy.base_health
                )));
            }
            if enemy.skills.is_empty() {
                warn!("Enemy {} has no skills defined", enemy.name);
            }
        }
        let mut item_names = HashSet::new();
        for item in &items {
            if !item_names.insert(item.item_name.as_str()) {
                return Err(CatalogError::Invalid(format!(
                    "Duplicate item {}",
                    item.item_name
                )));
            }
        }
        Ok(StaticCatalog { enemies, items })
    }

    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let file = File::open(path).map_err(|e| CatalogError::Invalid(e.to_string()))?;
        let parsed: CatalogFile = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| CatalogError::Invalid(e.to_string()))?;
        info!(
            "Loaded catalog from {:?}: {} enemies, {} items",
            path,
            parsed.enemies.len(),
            parsed.items.len()
        );
        Self::new(parsed.enemies, parsed.items)
    }

    /// The almanac and shop shipped with the service.
    pub fn builtin() -> Self {
        let enemy = |name: &str, base_health, coin_reward, score_reward, skills: &[&str]| {
            EnemyDefinition {
                name: name.to_string(),
                base_health,
                coin_reward,
                score_reward,
                skills: skills.iter().map(|s| s.to_string()).collect(),
            }
        };
        let potion = |item_name: &str, cost, health_delta, attack_delta, evade_delta| {
            ItemDefinition {
                item_name: item_name.to_string(),
                cost,
                health_delta,
                attack_delta,
                evade_delta,
            }
        };
        StaticCatalog {
            enemies: vec![
                enemy("Slime", 4, 2, 1, &["Bounce", "Split"]),
                enemy("Goblin", 6, 3, 2, &["Stab", "Taunt", "Dodge"]),
                enemy("Skeleton", 8, 5, 3, &["Slash", "Bone Shield"]),
                enemy("Dragon", 14, 12, 8, &["Fire Breath", "Tail Swipe", "Roar"]),
            ],
            items: vec![
                potion("Health Potion", 5, 3, 0, 0),
                potion("Attack Potion", 4, 0, 3, 0),
                potion("Evade Potion", 4, 0, 0, 2),
                potion("Elixir", 12, 5, 5, 5),
            ],
        }
    }
}

#[rocket::async_trait]
impl Catalog for StaticCatalog {
    async fn list_enemies(&self) -> Result<Vec<EnemyDefinition>, CatalogError> {
        Ok(self.enemies.clone())
    }

    async fn get_enemy(&self, name: &str) -> Result<Option<EnemyDefinition>, CatalogError> {
        Ok(self.enemies.iter().find(|e| e.name == name).cloned())
    }

    async fn list_items(&self) -> Result<Vec<ItemDefinition>, CatalogError> {
        Ok(self.items.clone())
    }

    async fn get_item(&self, item_name: &str) -> Result<Option<ItemDefinition>, CatalogError> {
        Ok(self.items.iter().find(|i| i.item_name == item_name).cloned())
    }
}
