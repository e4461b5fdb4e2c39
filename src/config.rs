use std::collections::HashMap;
use std::path::PathBuf;

use rocket::serde::Deserialize;

/// Engine settings, read from the same figment Rocket uses
/// (`Rocket.toml` and `ROCKET_*` environment variables).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct EngineConfig {
    /// Upper bound on every player store and catalog call.
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
    /// Fixed seed for enemy and skill selection; entropy when absent.
    #[serde(default)]
    pub rng_seed: Option<u64>,
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,
    /// Directory holding one JSON record per player.
    #[serde(default)]
    pub players_path: Option<PathBuf>,
    #[serde(default)]
    pub journal_path: Option<PathBuf>,
    /// Journal entries kept in memory; older pages come from `journal_path`.
    #[serde(default = "default_journal_window")]
    pub journal_window: usize,
    /// Bearer token -> player id.
    #[serde(default)]
    pub auth_tokens: HashMap<String, String>,
    #[serde(default = "default_leaderboard_limit")]
    pub leaderboard_limit: usize,
}

fn default_store_timeout_ms() -> u64 {
    2000
}

fn default_leaderboard_limit() -> usize {
    10
}

fn default_journal_window() -> usize {
    10_000
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            store_timeout_ms: default_store_timeout_ms(),
            rng_seed: None,
            catalog_path: None,
            players_path: None,
            journal_path: None,
            journal_window: default_journal_window(),
            auth_tokens: HashMap::new(),
            leaderboard_limit: default_leaderboard_limit(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rocket::figment::providers::{Format, Serialized, Toml};
    use rocket::figment::Figment;

    #[test]
    fn defaults_apply_when_keys_are_missing() {
        let config: EngineConfig = Figment::new()
            .merge(Toml::string("port = 9000"))
            .extract()
            .expect("valid config");
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn tokens_and_seed_are_read() {
        let config: EngineConfig = Figment::from(Serialized::defaults(
            rocket::serde::json::json!({
                "rng_seed": 7,
                "store_timeout_ms": 50,
                "auth_tokens": { "tok-a": "alice" }
            }),
        ))
        .extract()
        .expect("valid config");
        assert_eq!(config.rng_seed, Some(7));
        assert_eq!(config.store_timeout_ms, 50);
        assert_eq!(config.auth_tokens.get("tok-a").map(String::as_str), Some("alice"));
    }
}
