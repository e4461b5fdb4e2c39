//! Shared plumbing for every state transition: injected stores, per-player
//! locking, bounded store calls, and commit-then-journal.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use rocket::futures::lock::Mutex;
use rocket::tokio::time::timeout;

use crate::catalog::{Catalog, CatalogError, EnemyDefinition, ItemDefinition, StaticCatalog};
use crate::config::EngineConfig;
use crate::encounter::random::{PcgRandom, RandomSource};
use crate::error::{EngineError, EngineResult};
use crate::journal::persistence::FileWriter;
use crate::journal::{ActionLog, ActionPayload};
use crate::player::{
    self, MemoryPlayerRepository, PlayerLocks, PlayerRepository, PlayerState, Versioned,
};

pub struct Engine {
    players: Arc<dyn PlayerRepository>,
    catalog: Arc<dyn Catalog>,
    random: Mutex<Box<dyn RandomSource>>,
    locks: PlayerLocks,
    journal: Arc<ActionLog>,
    store_timeout: Duration,
    leaderboard_limit: usize,
}

impl Engine {
    pub fn new(
        players: Arc<dyn PlayerRepository>,
        catalog: Arc<dyn Catalog>,
        random: Box<dyn RandomSource>,
    ) -> Self {
        let defaults = EngineConfig::default();
        Engine {
            players,
            catalog,
            random: Mutex::new(random),
            locks: PlayerLocks::new(),
            journal: Arc::new(ActionLog::new()),
            store_timeout: Duration::from_millis(defaults.store_timeout_ms),
            leaderboard_limit: defaults.leaderboard_limit,
        }
    }

    pub fn with_store_timeout(mut self, store_timeout: Duration) -> Self {
        self.store_timeout = store_timeout;
        self
    }

    pub fn with_journal(mut self, journal: Arc<ActionLog>) -> Self {
        self.journal = journal;
        self
    }

    pub fn with_leaderboard_limit(mut self, limit: usize) -> Self {
        self.leaderboard_limit = limit;
        self
    }

    /// Build the stores named by `config`, falling back to the in-memory
    /// player store and the built-in catalog.
    pub fn from_config(config: &EngineConfig) -> EngineResult<Engine> {
        let catalog = match &config.catalog_path {
            Some(path) => StaticCatalog::from_file(path)?,
            None => StaticCatalog::builtin(),
        };
        let players = match &config.players_path {
            Some(path) => MemoryPlayerRepository::with_snapshot_dir(path.clone())?,
            None => MemoryPlayerRepository::new(),
        };
        let random: Box<dyn RandomSource> = match config.rng_seed {
            Some(seed) => Box::new(PcgRandom::from_seed(seed)),
            None => Box::new(PcgRandom::from_entropy()),
        };
        let journal = match &config.journal_path {
            Some(path) => {
                let mut log = if path.exists() {
                    ActionLog::load_from_file(path, config.journal_window).map_err(|e| {
                        EngineError::DataIntegrity(format!("Journal {path:?} unreadable: {e}"))
                    })?
                } else {
                    ActionLog::with_window(config.journal_window)
                };
                let writer = FileWriter::new(path.clone()).map_err(|e| {
                    EngineError::Unavailable(format!("Journal {path:?} not writable: {e}"))
                })?;
                log.set_writer(Some(writer));
                log
            }
            None => ActionLog::with_window(config.journal_window),
        };
        info!(
            "Engine configured: store timeout {}ms, seeded rng: {}",
            config.store_timeout_ms,
            config.rng_seed.is_some()
        );
        Ok(Engine::new(Arc::new(players), Arc::new(catalog), random)
            .with_store_timeout(Duration::from_millis(config.store_timeout_ms))
            .with_journal(Arc::new(journal))
            .with_leaderboard_limit(config.leaderboard_limit))
    }

    pub fn journal(&self) -> &Arc<ActionLog> {
        &self.journal
    }

    pub fn locks(&self) -> &PlayerLocks {
        &self.locks
    }

    /// Run a store call under the configured timeout.
    pub(crate) async fn bounded<T, E>(
        &self,
        what: &str,
        call: impl Future<Output = Result<T, E>>,
    ) -> EngineResult<T>
    where
        E: Into<EngineError>,
    {
        match timeout(self.store_timeout, call).await {
            Ok(result) => result.map_err(Into::into),
            Err(_) => {
                warn!("{} timed out after {:?}", what, self.store_timeout);
                Err(EngineError::Unavailable(format!(
                    "{what} timed out after {}ms",
                    self.store_timeout.as_millis()
                )))
            }
        }
    }

    pub(crate) async fn load(&self, player_id: &str) -> EngineResult<Versioned<PlayerState>> {
        self.bounded("player lookup", self.players.get(player_id)).await
    }

    /// Persist `state` over `version`, then journal each step of the transition.
    ///
    /// A failed save means the outcome is unknown to the caller; nothing is
    /// journaled and the computed state is discarded.
    pub(crate) async fn commit(
        &self,
        version: u64,
        state: PlayerState,
        journal: Vec<(&str, ActionPayload)>,
    ) -> EngineResult<PlayerState> {
        if !state.within_caps() {
            error!(
                "Refusing to persist out-of-range stats for player {}: {:?}",
                state.player_id, state
            );
            return Err(EngineError::DataIntegrity(format!(
                "Computed stats for player {} exceed their caps",
                state.player_id
            )));
        }
        match self
            .bounded(
                "player save",
                self.players.save(&state.player_id, &state, version),
            )
            .await
        {
            Ok(_) => {
                for (action_type, payload) in journal {
                    self.journal.append(action_type, &state.player_id, payload);
                }
                Ok(state)
            }
            Err(e) => {
                let attempted: Vec<&str> = journal.iter().map(|(t, _)| *t).collect();
                error!(
                    "{:?} for player {} not committed: {}",
                    attempted, state.player_id, e
                );
                Err(match e {
                    // record vanished between load and save
                    EngineError::NotFound(msg) => EngineError::Unavailable(msg),
                    other => other,
                })
            }
        }
    }

    pub(crate) async fn pick(&self, len: usize) -> usize {
        self.random.lock().await.pick(len)
    }

    pub(crate) async fn enemy(&self, name: &str) -> EngineResult<Option<EnemyDefinition>> {
        self.bounded("enemy lookup", self.catalog.get_enemy(name)).await
    }

    pub async fn almanac(&self) -> EngineResult<Vec<EnemyDefinition>> {
        self.bounded("almanac listing", self.catalog.list_enemies()).await
    }

    pub(crate) async fn item(&self, item_name: &str) -> EngineResult<Option<ItemDefinition>> {
        self.bounded("item lookup", self.catalog.get_item(item_name)).await
    }

    pub async fn shop(&self) -> EngineResult<Vec<ItemDefinition>> {
        self.bounded("shop listing", self.catalog.list_items()).await
    }

    /// Current record for one player, without taking the player's lock.
    pub async fn player(&self, player_id: &str) -> EngineResult<PlayerState> {
        Ok(self.load(player_id).await?.state)
    }

    /// Create or replace a player record (registration stand-in).
    /// A returned version of 1 means the player did not exist before.
    pub async fn provision(&self, state: PlayerState) -> EngineResult<Versioned<PlayerState>> {
        if !state.within_caps() {
            return Err(EngineError::InvalidArgument(format!(
                "Stats for player {} exceed their caps",
                state.player_id
            )));
        }
        let _guard = self.locks.acquire(&state.player_id).await;
        let record = self
            .bounded("player insert", self.players.insert(state))
            .await?;
        self.journal
            .append("Provision", &record.state.player_id, ActionPayload::Provision);
        info!(
            "Provisioned player {} at version {}",
            record.state.player_id, record.version
        );
        Ok(record)
    }

    /// Top players by score, ties broken by id.
    pub async fn leaderboard(&self) -> EngineResult<Vec<PlayerState>> {
        let players = self.bounded("player listing", self.players.list()).await?;
        Ok(player::rank(players, self.leaderboard_limit))
    }
}

impl From<CatalogError> for EngineError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::Unavailable(_) => EngineError::Unavailable(e.to_string()),
            CatalogError::Invalid(_) => EngineError::DataIntegrity(e.to_string()),
        }
    }
}
