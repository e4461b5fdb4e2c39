use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use rocket::tokio::sync::{Mutex, OwnedMutexGuard};

type Slots = Arc<StdMutex<HashMap<String, Arc<Mutex<()>>>>>;

/// One async mutex per player id. Mutating operations for the same player run
/// one at a time; different players never wait on each other.
#[derive(Debug, Default, Clone)]
pub struct PlayerLocks {
    slots: Slots,
}

/// Held for the whole read-modify-write of one player.
#[derive(Debug)]
pub struct PlayerGuard {
    key: String,
    slot: Arc<Mutex<()>>,
    slots: Slots,
    _guard: OwnedMutexGuard<()>,
}

impl PlayerLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, player_id: &str) -> PlayerGuard {
        let slot = {
            let mut slots = match self.slots.lock() {
                Ok(g) => g,
                Err(e) => e.into_inner(),
            };
            Arc::clone(
                slots
                    .entry(player_id.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        let guard = Arc::clone(&slot).lock_owned().await;
        PlayerGuard {
            key: player_id.to_string(),
            slot,
            slots: Arc::clone(&self.slots),
            _guard: guard,
        }
    }

    /// Number of players with a live lock slot.
    pub fn tracked(&self) -> usize {
        match self.slots.lock() {
            Ok(g) => g.len(),
            Err(e) => e.into_inner().len(),
        }
    }
}

impl Drop for PlayerGuard {
    fn drop(&mut self) {
        let mut slots = match self.slots.lock() {
            Ok(g) => g,
            Err(e) => e.into_inner(),
        };
        // map entry + our `slot` + the owned guard: nobody else is waiting
        let idle = slots
            .get(&self.key)
            .map(|s| Arc::ptr_eq(s, &self.slot) && Arc::strong_count(s) <= 3)
            .unwrap_or(false);
        if idle {
            slots.remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[rocket::async_test]
    async fn slots_are_released_after_use() {
        let locks = PlayerLocks::new();
        {
            let _g = locks.acquire("p1").await;
            assert_eq!(locks.tracked(), 1);
        }
        assert_eq!(locks.tracked(), 0);
    }

    #[rocket::async_test]
    async fn same_player_is_serialized() {
        let locks = PlayerLocks::new();
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let inside = Arc::clone(&inside);
            let max_seen = Arc::clone(&max_seen);
            handles.push(rocket::tokio::spawn(async move {
                let _g = locks.acquire("shared").await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                rocket::tokio::time::sleep(Duration::from_millis(2)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for h in handles {
            h.await.expect("task panicked");
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(locks.tracked(), 0);
    }

    #[rocket::async_test]
    async fn different_players_do_not_block() {
        let locks = PlayerLocks::new();
        let _a = locks.acquire("a").await;
        let b = rocket::tokio::time::timeout(Duration::from_millis(100), locks.acquire("b")).await;
        assert!(b.is_ok());
    }
}
