//! Append-only record of every committed state transition.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use log::{error, info, warn};
use rocket::serde::{Deserialize, Serialize};
use rocket_okapi::JsonSchema;

pub mod persistence;

use persistence::FileWriter;

/// What a committed transition did, recorded after the write succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde", tag = "kind")]
pub enum ActionPayload {
    Provision,
    Attack {
        enemy: String,
        enemy_health: i64,
        attack_action: u32,
    },
    Evade {
        evade_action: u32,
    },
    Defend,
    EncounterTick {
        enemy: String,
        enemy_health: i64,
        next_move: String,
    },
    EnemyDefeated {
        enemy: String,
        coin_reward: u64,
        score_reward: u64,
        next_enemy: String,
    },
    Buy {
        item_name: String,
        cost: u64,
        coin: u64,
    },
    UseItem {
        item_name: String,
    },
    DeleteItem {
        item_name: String,
        removed: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct ActionEntry {
    pub seq: u64,
    pub action_type: String,
    pub player_id: String,
    pub payload: ActionPayload,
    pub timestamp: String,
}

/// Which entries a journal read returns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogQuery {
    pub from_seq: Option<u64>,
    pub action_type: Option<String>,
    pub player_id: Option<String>,
    /// Only entries stamped at or after this many milliseconds since the epoch.
    pub since: Option<u128>,
}

impl LogQuery {
    fn matches(&self, entry: &ActionEntry) -> bool {
        if self.from_seq.is_some_and(|f| entry.seq < f) {
            return false;
        }
        if self.action_type.as_ref().is_some_and(|t| entry.action_type != *t) {
            return false;
        }
        if self.player_id.as_ref().is_some_and(|p| entry.player_id != *p) {
            return false;
        }
        match self.since {
            Some(since) => entry
                .timestamp
                .parse::<u128>()
                .map_or(false, |ts| ts >= since),
            None => true,
        }
    }
}

/// Entries kept in memory when no window is configured.
pub const DEFAULT_WINDOW: usize = 10_000;

#[derive(Debug)]
struct Entries {
    seq: u64,
    window: usize,
    items: VecDeque<ActionEntry>,
}

impl Entries {
    fn new(window: usize) -> Self {
        Entries {
            seq: 0,
            window: window.max(1),
            items: VecDeque::new(),
        }
    }

    fn push(&mut self, entry: ActionEntry) {
        if self.items.len() == self.window {
            self.items.pop_front();
        }
        self.items.push_back(entry);
    }

    /// Lowest `seq` still held in memory.
    fn oldest_held(&self) -> u64 {
        self.items.front().map_or(self.seq + 1, |e| e.seq)
    }
}

/// The most recent `window` entries stay in memory; with a file writer
/// attached, older pages are read back from its file.
#[derive(Debug)]
pub struct ActionLog {
    entries: Mutex<Entries>,
    writer: Option<FileWriter>,
}

impl Default for ActionLog {
    fn default() -> Self {
        ActionLog::with_window(DEFAULT_WINDOW)
    }
}

impl ActionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_window(window: usize) -> Self {
        ActionLog {
            entries: Mutex::new(Entries::new(window)),
            writer: None,
        }
    }

    pub fn with_writer(writer: FileWriter) -> Self {
        let mut log = ActionLog::new();
        log.writer = Some(writer);
        log
    }

    /// Rebuild a log from a JSONL file, keeping the newest `window` entries
    /// in memory and continuing the sequence after the highest one.
    pub fn load_from_file(path: &Path, window: usize) -> Result<ActionLog, String> {
        let file = File::open(path).map_err(|e| e.to_string())?;
        let mut entries = Entries::new(window);
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| e.to_string())?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: ActionEntry = serde_json::from_str(&line).map_err(|e| e.to_string())?;
            entries.seq = entries.seq.max(entry.seq);
            entries.push(entry);
        }
        info!(
            "Journal {:?} replayed up to seq {}, {} entries in memory",
            path,
            entries.seq,
            entries.items.len()
        );
        Ok(ActionLog {
            entries: Mutex::new(entries),
            writer: None,
        })
    }

    pub fn set_writer(&mut self, writer: Option<FileWriter>) {
        self.writer = writer;
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        match self.entries.lock() {
            Ok(g) => g,
            Err(e) => e.into_inner(),
        }
    }

    /// Append an entry with the next sequence number.
    ///
    /// Numbering, insertion and the hand-off to the file writer happen under
    /// one lock, so both memory and file stay ordered by `seq`.
    pub fn append(&self, action_type: &str, player_id: &str, payload: ActionPayload) -> ActionEntry {
        let timestamp = match std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH) {
            Ok(dur) => format!("{}", dur.as_millis()),
            Err(_) => "0".to_string(),
        };
        let mut entries = self.lock();
        entries.seq += 1;
        let entry = ActionEntry {
            seq: entries.seq,
            action_type: action_type.to_string(),
            player_id: player_id.to_string(),
            payload,
            timestamp,
        };
        entries.push(entry.clone());
        if let Some(writer) = &self.writer {
            writer.send(entry.clone());
        }
        entry
    }

    /// Cloned snapshot of the entries held in memory, oldest first.
    pub fn entries(&self) -> Vec<ActionEntry> {
        self.lock().items.iter().cloned().collect()
    }

    /// Up to `limit` matching entries, plus the `seq` to resume from when more remain.
    pub fn page(&self, query: &LogQuery, limit: usize) -> (Vec<ActionEntry>, Option<u64>) {
        let want = limit.saturating_add(1);
        let (oldest_held, recent) = {
            let entries = self.lock();
            let recent: Vec<ActionEntry> = entries
                .items
                .iter()
                .filter(|e| query.matches(e))
                .take(want)
                .cloned()
                .collect();
            (entries.oldest_held(), recent)
        };
        let archived = if oldest_held > 1 && query.from_seq.map_or(true, |f| f < oldest_held) {
            self.archived(query, oldest_held, want)
        } else {
            Vec::new()
        };
        let mut matching = archived.into_iter().chain(recent);
        let page: Vec<ActionEntry> = matching.by_ref().take(limit).collect();
        let next_seq = match matching.next() {
            Some(_) => page.last().map(|e| e.seq + 1),
            None => None,
        };
        (page, next_seq)
    }

    /// Matching entries below `before`, read back from the writer's file.
    fn archived(&self, query: &LogQuery, before: u64, want: usize) -> Vec<ActionEntry> {
        let Some(path) = self.writer.as_ref().map(FileWriter::path) else {
            return Vec::new();
        };
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                warn!("Journal archive {:?} unreadable: {}", path, e);
                return Vec::new();
            }
        };
        BufReader::new(file)
            .lines()
            .map_while(Result::ok)
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<ActionEntry>(&line) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping unreadable archived entry in {:?}: {}", path, e);
                    None
                }
            })
            .take_while(|e| e.seq < before)
            .filter(|e| query.matches(e))
            .take(want)
            .collect()
    }

    /// Stop the file writer, if any, and wait until everything queued is on disk.
    pub fn shutdown(&self) {
        let worker = self.writer.as_ref().and_then(FileWriter::stop);
        if let Some(worker) = worker {
            if worker.join().is_err() {
                error!("Journal writer thread panicked; the file may be missing entries");
            }
        }
    }
}
