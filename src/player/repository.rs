//! Versioned player store.
//!
//! The engine only ever talks to `PlayerRepository`; `MemoryPlayerRepository`
//! is the bundled backend, optionally mirrored to one JSON file per player.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};

use log::{debug, info, warn};
use rocket::serde::{Deserialize, Serialize};
use rocket::tokio::sync::Mutex;
use rocket::tokio::task::spawn_blocking;

use super::PlayerState;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("Player {0} not found")]
    NotFound(String),
    #[error("Write conflict for player {player_id}: expected version {expected}, found {found}")]
    Conflict {
        player_id: String,
        expected: u64,
        found: u64,
    },
    #[error("Player store I/O failure: {0}")]
    Io(String),
}

/// A stored record together with the version the compare-and-swap is keyed on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct Versioned<T> {
    pub version: u64,
    pub state: T,
}

#[rocket::async_trait]
pub trait PlayerRepository: Send + Sync {
    async fn get(&self, player_id: &str) -> Result<Versioned<PlayerState>, RepositoryError>;

    /// Conditional write: succeeds only while the stored version still equals
    /// `expected_version`. Returns the new version.
    async fn save(
        &self,
        player_id: &str,
        state: &PlayerState,
        expected_version: u64,
    ) -> Result<u64, RepositoryError>;

    /// Create or replace a record outright.
    async fn insert(&self, state: PlayerState) -> Result<Versioned<PlayerState>, RepositoryError>;

    async fn list(&self) -> Result<Vec<PlayerState>, RepositoryError>;
}

/// One player's record; `None` until the first insert lands.
type Slot = Arc<Mutex<Option<Versioned<PlayerState>>>>;

/// Records live behind their own lock, so a slow write for one player never
/// holds up reads or writes for another. The map lock is only taken to find
/// or create a slot and is never held across an await.
#[derive(Debug, Default)]
pub struct MemoryPlayerRepository {
    slots: StdMutex<HashMap<String, Slot>>,
    snapshot_dir: Option<PathBuf>,
}

impl MemoryPlayerRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a repository mirrored to `dir`, loading every `*.json` record in it.
    pub fn with_snapshot_dir(dir: PathBuf) -> Result<Self, RepositoryError> {
        fs::create_dir_all(&dir).map_err(|e| RepositoryError::Io(e.to_string()))?;
        let mut slots = HashMap::new();
        let listing = fs::read_dir(&dir).map_err(|e| RepositoryError::Io(e.to_string()))?;
        for dirent in listing {
            let path = dirent.map_err(|e| RepositoryError::Io(e.to_string()))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = fs::read(&path).map_err(|e| RepositoryError::Io(e.to_string()))?;
            let record: Versioned<PlayerState> = serde_json::from_slice(&bytes)
                .map_err(|e| RepositoryError::Io(format!("{}: {}", path.display(), e)))?;
            slots.insert(
                record.state.player_id.clone(),
                Arc::new(Mutex::new(Some(record))),
            );
        }
        info!("Loaded {} player records from {:?}", slots.len(), dir);
        Ok(MemoryPlayerRepository {
            slots: StdMutex::new(slots),
            snapshot_dir: Some(dir),
        })
    }

    fn slot(&self, player_id: &str) -> Option<Slot> {
        let slots = match self.slots.lock() {
            Ok(g) => g,
            Err(e) => e.into_inner(),
        };
        slots.get(player_id).cloned()
    }

    fn slot_or_create(&self, player_id: &str) -> Slot {
        let mut slots = match self.slots.lock() {
            Ok(g) => g,
            Err(e) => e.into_inner(),
        };
        Arc::clone(slots.entry(player_id.to_string()).or_default())
    }

    /// Mirror one record to disk off the async workers. Must finish before
    /// the in-memory record changes, so a failed write leaves the old one live.
    async fn persist(&self, record: &Versioned<PlayerState>) -> Result<(), RepositoryError> {
        let dir = match &self.snapshot_dir {
            Some(dir) => dir.clone(),
            None => return Ok(()),
        };
        let bytes =
            serde_json::to_vec_pretty(record).map_err(|e| RepositoryError::Io(e.to_string()))?;
        let path = dir.join(record_file_name(&record.state.player_id));
        spawn_blocking(move || write_atomically(&path, &bytes))
            .await
            .map_err(|e| RepositoryError::Io(format!("snapshot task failed: {e}")))?
    }
}

/// Player ids are arbitrary strings; hex keeps them filesystem-safe.
fn record_file_name(player_id: &str) -> String {
    let hex: String = player_id.bytes().map(|b| format!("{b:02x}")).collect();
    format!("player_{hex}.json")
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), RepositoryError> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes).map_err(|e| RepositoryError::Io(e.to_string()))?;
    fs::rename(&tmp, path).map_err(|e| {
        warn!("Could not move {:?} into place: {}", tmp, e);
        RepositoryError::Io(e.to_string())
    })?;
    debug!("Wrote player record {:?}", path);
    Ok(())
}

#[rocket::async_trait]
impl PlayerRepository for MemoryPlayerRepository {
    async fn get(&self, player_id: &str) -> Result<Versioned<PlayerState>, RepositoryError> {
        let slot = self
            .slot(player_id)
            .ok_or_else(|| RepositoryError::NotFound(player_id.to_string()))?;
        let record = slot.lock().await;
        record
            .clone()
            .ok_or_else(|| RepositoryError::NotFound(player_id.to_string()))
    }

    async fn save(
        &self,
        player_id: &str,
        state: &PlayerState,
        expected_version: u64,
    ) -> Result<u64, RepositoryError> {
        let slot = self
            .slot(player_id)
            .ok_or_else(|| RepositoryError::NotFound(player_id.to_string()))?;
        let mut record = slot.lock().await;
        let found = record
            .as_ref()
            .map(|r| r.version)
            .ok_or_else(|| RepositoryError::NotFound(player_id.to_string()))?;
        if found != expected_version {
            return Err(RepositoryError::Conflict {
                player_id: player_id.to_string(),
                expected: expected_version,
                found,
            });
        }
        let next = Versioned {
            version: found + 1,
            state: state.clone(),
        };
        self.persist(&next).await?;
        let version = next.version;
        *record = Some(next);
        Ok(version)
    }

    async fn insert(&self, state: PlayerState) -> Result<Versioned<PlayerState>, RepositoryError> {
        let slot = self.slot_or_create(&state.player_id);
        let mut record = slot.lock().await;
        let version = record.as_ref().map_or(1, |r| r.version + 1);
        let next = Versioned { version, state };
        self.persist(&next).await?;
        *record = Some(next.clone());
        Ok(next)
    }

    async fn list(&self) -> Result<Vec<PlayerState>, RepositoryError> {
        let slots: Vec<Slot> = {
            let slots = match self.slots.lock() {
                Ok(g) => g,
                Err(e) => e.into_inner(),
            };
            slots.values().cloned().collect()
        };
        let mut players = Vec::with_capacity(slots.len());
        for slot in slots {
            if let Some(record) = slot.lock().await.as_ref() {
                players.push(record.state.clone());
            }
        }
        Ok(players)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "ds_arena_repo_{}_{}",
            name,
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[rocket::async_test]
    async fn stale_version_is_rejected() {
        let repo = MemoryPlayerRepository::new();
        let record = repo.insert(player::new("p1")).await.expect("insert");
        assert_eq!(record.version, 1);

        let mut changed = record.state.clone();
        changed.coin = 7;
        let v2 = repo.save("p1", &changed, 1).await.expect("first save");
        assert_eq!(v2, 2);

        let err = repo.save("p1", &changed, 1).await.unwrap_err();
        assert_eq!(
            err,
            RepositoryError::Conflict {
                player_id: "p1".to_string(),
                expected: 1,
                found: 2
            }
        );
        assert_eq!(repo.get("p1").await.expect("get").state.coin, 7);
    }

    #[rocket::async_test]
    async fn saving_unknown_player_is_not_found() {
        let repo = MemoryPlayerRepository::new();
        let err = repo.save("nobody", &player::new("nobody"), 0).await.unwrap_err();
        assert_eq!(err, RepositoryError::NotFound("nobody".to_string()));
    }

    #[rocket::async_test]
    async fn snapshot_survives_reopen() {
        let dir = scratch_dir("reopen");
        {
            let repo = MemoryPlayerRepository::with_snapshot_dir(dir.clone()).expect("open");
            let mut p = player::new("carol/../x");
            p.coin = 42;
            repo.insert(p).await.expect("insert");
        }

        let reopened = MemoryPlayerRepository::with_snapshot_dir(dir.clone()).expect("reopen");
        let record = reopened.get("carol/../x").await.expect("get");
        assert_eq!(record.state.coin, 42);
        assert_eq!(record.version, 1);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[rocket::async_test]
    async fn save_rewrites_only_that_players_file() {
        let dir = scratch_dir("per_player");
        let repo = MemoryPlayerRepository::with_snapshot_dir(dir.clone()).expect("open");
        let alice = repo.insert(player::new("alice")).await.expect("insert");
        repo.insert(player::new("bob")).await.expect("insert");

        let bob_file = dir.join(record_file_name("bob"));
        std::fs::remove_file(&bob_file).expect("bob's file exists");

        let mut changed = alice.state.clone();
        changed.coin = 3;
        repo.save("alice", &changed, alice.version).await.expect("save");

        assert!(!bob_file.exists());
        let stored: Versioned<PlayerState> = serde_json::from_slice(
            &std::fs::read(dir.join(record_file_name("alice"))).expect("alice's file"),
        )
        .expect("record");
        assert_eq!(stored.version, 2);
        assert_eq!(stored.state.coin, 3);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[rocket::async_test]
    async fn busy_record_does_not_block_other_players() {
        let repo = MemoryPlayerRepository::new();
        repo.insert(player::new("alice")).await.expect("insert");
        repo.insert(player::new("bob")).await.expect("insert");

        let alice = repo.slot("alice").expect("slot");
        let _held = alice.lock().await;
        let bob = rocket::tokio::time::timeout(
            std::time::Duration::from_millis(100),
            repo.get("bob"),
        )
        .await;
        assert!(matches!(bob, Ok(Ok(_))));
        let stuck = rocket::tokio::time::timeout(
            std::time::Duration::from_millis(20),
            repo.get("alice"),
        )
        .await;
        assert!(stuck.is_err());
    }
}
