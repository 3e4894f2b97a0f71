#![forbid(unsafe_code)]

//! Session storage for the reveal timer.
//!
//! The widget persists two values across reloads: the epoch millisecond of
//! the first token activation, and how long the visitor took to complete the
//! code. Storage is a string key/value store (the browser's `localStorage`
//! shape); [`MemoryStorage`] backs tests and native hosts.
//!
//! # Failure Modes
//!
//! | Failure | Behavior |
//! |---------|----------|
//! | Backend write refused | Logged at `warn`, widget continues |
//! | Stored start not a number | Treated as "now", duration becomes 0 |
//! | Missing start at trigger | Treated as "now", duration becomes 0 |

use std::collections::HashMap;
use std::fmt;

/// Key holding the first-activation timestamp (epoch ms, decimal).
pub const START_KEY: &str = "mida_start_ms";

/// Key holding the measured completion duration (ms, decimal).
pub const DURATION_KEY: &str = "mida_duration_ms";

/// Errors reported by a storage backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Backend is not available (storage disabled, private mode, ...).
    Unavailable(String),
    /// Backend rejected the write (quota, policy).
    Rejected(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Unavailable(msg) => write!(f, "storage unavailable: {msg}"),
            StorageError::Rejected(msg) => write!(f, "storage write rejected: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// String key/value store.
pub trait SessionStorage {
    /// Read a value. Absent keys and unreadable backends both yield `None`.
    fn get_item(&self, key: &str) -> Option<String>;

    /// Write a value, replacing any existing one.
    fn set_item(&mut self, key: &str, value: &str) -> StorageResult<()>;
}

/// In-memory storage.
#[derive(Default)]
pub struct MemoryStorage {
    data: HashMap<String, String>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create storage pre-populated with entries, e.g. to simulate a reload.
    #[must_use]
    pub fn with_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let data = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self { data }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.data.get(key).cloned()
    }

    fn set_item(&mut self, key: &str, value: &str) -> StorageResult<()> {
        self.data.insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

impl fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStorage")
            .field("entries", &self.len())
            .finish()
    }
}

/// Persisted first-activation / completion-duration pair.
///
/// Stateless: every call goes to the backend so a reload (fresh widget, same
/// storage) sees the same start timestamp.
#[derive(Debug, Default, Clone, Copy)]
pub struct SessionTimer;

impl SessionTimer {
    /// Record `now_ms` as the start timestamp unless one is already stored.
    ///
    /// Returns `true` if this call wrote the timestamp. An empty stored value
    /// counts as absent.
    pub fn mark_start(storage: &mut dyn SessionStorage, now_ms: u64) -> bool {
        if storage
            .get_item(START_KEY)
            .is_some_and(|value| !value.is_empty())
        {
            return false;
        }
        match storage.set_item(START_KEY, &now_ms.to_string()) {
            Ok(()) => {
                tracing::debug!(start_ms = now_ms, "recorded first activation");
                true
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to persist start timestamp");
                false
            }
        }
    }

    /// Stored start timestamp, if present and numeric.
    #[must_use]
    pub fn start(storage: &dyn SessionStorage) -> Option<u64> {
        storage.get_item(START_KEY)?.trim().parse().ok()
    }

    /// Compute `now − start` (floored at zero) and persist it.
    pub fn record_duration(storage: &mut dyn SessionStorage, now_ms: u64) -> u64 {
        let start = Self::start(storage).unwrap_or_else(|| {
            tracing::warn!("start timestamp missing or unreadable, using trigger time");
            now_ms
        });
        let duration = now_ms.saturating_sub(start);
        if let Err(err) = storage.set_item(DURATION_KEY, &duration.to_string()) {
            tracing::warn!(error = %err, "failed to persist session duration");
        }
        duration
    }

    /// Stored duration, if present and numeric.
    #[must_use]
    pub fn duration(storage: &dyn SessionStorage) -> Option<u64> {
        storage.get_item(DURATION_KEY)?.trim().parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_start_is_write_once() {
        let mut storage = MemoryStorage::new();
        assert!(SessionTimer::mark_start(&mut storage, 1_000));
        assert!(!SessionTimer::mark_start(&mut storage, 5_000));
        assert_eq!(SessionTimer::start(&storage), Some(1_000));
    }

    #[test]
    fn mark_start_overwrites_empty_value() {
        let mut storage = MemoryStorage::with_entries([(START_KEY, "")]);
        assert!(SessionTimer::mark_start(&mut storage, 42));
        assert_eq!(SessionTimer::start(&storage), Some(42));
    }

    #[test]
    fn duration_floors_at_zero_on_clock_skew() {
        let mut storage = MemoryStorage::with_entries([(START_KEY, "10000")]);
        assert_eq!(SessionTimer::record_duration(&mut storage, 9_000), 0);
        assert_eq!(SessionTimer::duration(&storage), Some(0));
    }

    #[test]
    fn duration_is_elapsed_since_start() {
        let mut storage = MemoryStorage::with_entries([(START_KEY, "10000")]);
        assert_eq!(SessionTimer::record_duration(&mut storage, 12_500), 2_500);
        assert_eq!(
            storage.get_item(DURATION_KEY).as_deref(),
            Some("2500")
        );
    }

    #[test]
    fn unreadable_start_yields_zero_duration() {
        let mut storage = MemoryStorage::with_entries([(START_KEY, "yesterday")]);
        assert_eq!(SessionTimer::record_duration(&mut storage, 12_500), 0);
    }

    #[test]
    fn set_item_replaces_existing_value() {
        let mut storage = MemoryStorage::with_entries([(DURATION_KEY, "1")]);
        storage.set_item(DURATION_KEY, "2").expect("memory write");
        assert_eq!(storage.len(), 1);
        assert_eq!(storage.get_item(DURATION_KEY).as_deref(), Some("2"));
    }

    struct RefusingStorage;

    impl SessionStorage for RefusingStorage {
        fn get_item(&self, _key: &str) -> Option<String> {
            None
        }

        fn set_item(&mut self, _key: &str, _value: &str) -> StorageResult<()> {
            Err(StorageError::Rejected("quota".into()))
        }
    }

    #[test]
    fn refused_writes_do_not_panic() {
        let mut storage = RefusingStorage;
        assert!(!SessionTimer::mark_start(&mut storage, 1));
        assert_eq!(SessionTimer::record_duration(&mut storage, 5), 0);
    }
}
