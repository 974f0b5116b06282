//! # In-Memory Window Store
//!
//! Process-local [`WindowStore`] for single-instance deployments and tests.
//!
//! Every key has its own mutex, so check-count-insert is atomic per key while
//! unrelated keys only share the brief map lookup.

use crate::rate_limit::{SlidingWindowEntry, StoreError, WindowCheck, WindowKey, WindowStore};
use async_trait::async_trait;
use std::{
    collections::{BTreeSet, HashMap},
    sync::{Arc, Mutex, RwLock},
};

type Window = BTreeSet<(i64, String)>;

/// Thread-safe in-memory sliding-window store
#[derive(Clone, Default)]
pub struct InMemoryWindowStore {
    windows: Arc<RwLock<HashMap<WindowKey, Arc<Mutex<Window>>>>>,
}

impl InMemoryWindowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently tracked
    pub fn tracked_keys(&self) -> usize {
        self.windows.read().map(|w| w.len()).unwrap_or(0)
    }

    /// Drop keys whose windows hold no entry newer than `now_ms - max_window_ms`
    ///
    /// Returns the number of keys removed. Intended to be called periodically
    /// with the longest configured window.
    pub fn evict_idle(&self, now_ms: i64, max_window_ms: i64) -> Result<usize, StoreError> {
        let cutoff = now_ms.saturating_sub(max_window_ms);
        let mut windows = self.windows.write().map_err(poisoned)?;
        let before = windows.len();

        // A window still referenced elsewhere is mid-check and must stay mapped.
        windows.retain(|_, window| {
            if Arc::strong_count(window) > 1 {
                return true;
            }
            match window.lock() {
                Ok(mut entries) => {
                    purge(&mut entries, cutoff);
                    !entries.is_empty()
                }
                Err(_) => false,
            }
        });

        Ok(before - windows.len())
    }

    fn window_for(&self, key: &WindowKey) -> Result<Arc<Mutex<Window>>, StoreError> {
        if let Some(window) = self.windows.read().map_err(poisoned)?.get(key) {
            return Ok(Arc::clone(window));
        }

        let mut windows = self.windows.write().map_err(poisoned)?;
        Ok(Arc::clone(windows.entry(key.clone()).or_default()))
    }
}

#[async_trait]
impl WindowStore for InMemoryWindowStore {
    async fn check_and_record(
        &self,
        key: &WindowKey,
        entry: SlidingWindowEntry,
        window_ms: i64,
        limit: u64,
    ) -> Result<WindowCheck, StoreError> {
        let window = self.window_for(key)?;
        let mut entries = window.lock().map_err(poisoned)?;

        purge(&mut entries, entry.timestamp_ms.saturating_sub(window_ms));

        let count = entries.len() as u64;
        if count < limit {
            entries.insert((entry.timestamp_ms, entry.token));
            return Ok(WindowCheck {
                admitted: true,
                count: count + 1,
                oldest_ms: entries.first().map(|(ts, _)| *ts),
            });
        }

        Ok(WindowCheck {
            admitted: false,
            count,
            oldest_ms: entries.first().map(|(ts, _)| *ts),
        })
    }

    async fn window_size(
        &self,
        key: &WindowKey,
        now_ms: i64,
        window_ms: i64,
    ) -> Result<u64, StoreError> {
        let window = match self.windows.read().map_err(poisoned)?.get(key) {
            Some(window) => Arc::clone(window),
            None => return Ok(0),
        };
        let mut entries = window.lock().map_err(poisoned)?;
        purge(&mut entries, now_ms.saturating_sub(window_ms));
        Ok(entries.len() as u64)
    }

    async fn reset(&self, key: &WindowKey) -> Result<(), StoreError> {
        let window = match self.windows.read().map_err(poisoned)?.get(key) {
            Some(window) => Arc::clone(window),
            None => return Ok(()),
        };
        window.lock().map_err(poisoned)?.clear();
        Ok(())
    }
}

/// Remove every entry scored strictly below `cutoff`
fn purge(entries: &mut Window, cutoff: i64) {
    let retained = entries.split_off(&(cutoff, String::new()));
    *entries = retained;
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> StoreError {
    StoreError::Backend {
        message: "window store lock poisoned".to_string(),
    }
}

#[cfg(test)]
#[path = "memory_window_store_tests.rs"]
mod tests;
