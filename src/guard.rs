//! Per-assignment in-flight guard.
//!
//! A threshold save or toggle on an assignment must finish before the next
//! write to the same record starts, or the store sees lost updates. The
//! guard is held for the duration of the write and released on drop.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::error::AppError;

// ---

#[derive(Debug, Clone, Default)]
pub struct InFlight {
    keys: Arc<Mutex<HashSet<String>>>,
}

/// Releases its key when dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    keys: Arc<Mutex<HashSet<String>>>,
    key: String,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key`, or fail with `Conflict` if a write for it is outstanding.
    pub fn acquire(&self, key: &str) -> Result<InFlightGuard, AppError> {
        // ---
        let mut keys = self.keys.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !keys.insert(key.to_string()) {
            return Err(AppError::Conflict(format!(
                "a save for sensor assignment {key} is already in progress"
            )));
        }
        Ok(InFlightGuard {
            keys: Arc::clone(&self.keys),
            key: key.to_string(),
        })
    }

    #[cfg(test)]
    fn is_busy(&self, key: &str) -> bool {
        self.keys
            .lock()
            .map(|keys| keys.contains(key))
            .unwrap_or(false)
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut keys = self.keys.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        keys.remove(&self.key);
    }
}
