//! The per-server key-value store.
//!
//! One `HashMap` behind one `Mutex`; the handle is cheap to clone and is
//! shared by the connection handlers, the reaper and the persistence
//! writer. An entry whose `expire_at` has passed is logically absent even
//! before the reaper deletes it (lazy expiry), so every read path checks
//! the timestamp itself.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Clone, Debug)]
struct Entry {
    value: String,
    expire_at: Option<SystemTime>,
}

impl Entry {
    fn is_expired(&self, now: SystemTime) -> bool {
        self.expire_at.map(|t| t <= now).unwrap_or(false)
    }

    fn ttl_remaining(&self, now: SystemTime) -> Option<u64> {
        self.expire_at
            .and_then(|t| t.duration_since(now).ok())
            .map(|d| d.as_secs())
    }
}

/// One entry of the snapshot file, with `expire_at` as epoch seconds.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SnapshotEntry {
    pub key: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_at: Option<u64>,
}

#[derive(Clone, Default)]
pub struct Store {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl Store {
    pub fn new() -> Self {
        Store::default()
    }

    /// Inserts or overwrites a key. A plain SET clears any prior TTL;
    /// passing `ttl_seconds` sets value and expiry in one critical section.
    pub fn set(&self, key: String, value: String, ttl_seconds: Option<u64>) {
        let expire_at = ttl_seconds.map(|s| SystemTime::now() + Duration::from_secs(s));
        let mut entries = self.entries.lock().unwrap();
        entries.insert(key, Entry { value, expire_at });
    }

    /// Returns the value and remaining TTL, or `None` on a miss. An entry
    /// found expired is deleted on the spot rather than left for the
    /// reaper.
    pub fn get(&self, key: &str) -> Option<(String, Option<u64>)> {
        let now = SystemTime::now();
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                entries.remove(key);
                None
            }
            Some(entry) => Some((entry.value.clone(), entry.ttl_remaining(now))),
            None => None,
        }
    }

    /// Removes a key, reporting whether a live entry was there.
    pub fn delete(&self, key: &str) -> bool {
        let now = SystemTime::now();
        let mut entries = self.entries.lock().unwrap();
        match entries.remove(key) {
            Some(entry) => !entry.is_expired(now),
            None => false,
        }
    }

    /// Sets `expire_at = now + ttl_seconds` on an existing live key.
    /// Returns `false` when the key is absent or already expired.
    pub fn expire(&self, key: &str, ttl_seconds: u64) -> bool {
        let now = SystemTime::now();
        let mut entries = self.entries.lock().unwrap();
        match entries.get_mut(key) {
            Some(entry) if !entry.is_expired(now) => {
                entry.expire_at = Some(now + Duration::from_secs(ttl_seconds));
                true
            }
            _ => false,
        }
    }

    /// Sorted list of live keys.
    pub fn keys(&self) -> Vec<String> {
        let now = SystemTime::now();
        let entries = self.entries.lock().unwrap();
        let mut keys: Vec<String> = entries
            .iter()
            .filter(|(_, e)| !e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    /// `(total live keys, live keys carrying a TTL)`, computed on demand so
    /// the reaper's deletions can never make the numbers drift.
    pub fn counts(&self) -> (usize, usize) {
        let now = SystemTime::now();
        let entries = self.entries.lock().unwrap();
        let live = entries.values().filter(|e| !e.is_expired(now));
        let mut total = 0;
        let mut with_ttl = 0;
        for entry in live {
            total += 1;
            if entry.expire_at.is_some() {
                with_ttl += 1;
            }
        }
        (total, with_ttl)
    }

    /// Physically removes every expired entry. Idempotent; the reaper calls
    /// this on each cycle.
    pub fn purge_expired(&self) -> usize {
        let now = SystemTime::now();
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired(now));
        before - entries.len()
    }

    /// Copies all live entries out under the lock; serialization and disk
    /// I/O happen on the copy.
    pub fn snapshot(&self) -> Vec<SnapshotEntry> {
        let now = SystemTime::now();
        let entries = self.entries.lock().unwrap();
        entries
            .iter()
            .filter(|(_, e)| !e.is_expired(now))
            .map(|(k, e)| SnapshotEntry {
                key: k.clone(),
                value: e.value.clone(),
                expire_at: e.expire_at.and_then(to_epoch_secs),
            })
            .collect()
    }

    /// Repopulates the store from snapshot entries, discarding any whose
    /// expiry already passed. Returns the number of entries kept.
    pub fn restore(&self, snapshot: Vec<SnapshotEntry>) -> usize {
        let now = SystemTime::now();
        let mut entries = self.entries.lock().unwrap();
        let mut kept = 0;
        for item in snapshot {
            let expire_at = item.expire_at.map(from_epoch_secs);
            let entry = Entry {
                value: item.value,
                expire_at,
            };
            if entry.is_expired(now) {
                continue;
            }
            entries.insert(item.key, entry);
            kept += 1;
        }
        kept
    }
}

fn to_epoch_secs(t: SystemTime) -> Option<u64> {
    t.duration_since(UNIX_EPOCH).ok().map(|d| d.as_secs())
}

fn from_epoch_secs(secs: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expired_entry(value: &str) -> Entry {
        Entry {
            value: value.to_owned(),
            expire_at: Some(SystemTime::now() - Duration::from_secs(1)),
        }
    }

    #[test]
    fn set_then_get_returns_value() {
        let store = Store::new();
        store.set("k".to_owned(), "v".to_owned(), None);
        assert_eq!(store.get("k"), Some(("v".to_owned(), None)));
    }

    #[test]
    fn overwrite_replaces_value_and_clears_ttl() {
        let store = Store::new();
        store.set("k".to_owned(), "v1".to_owned(), Some(300));
        store.set("k".to_owned(), "v2".to_owned(), None);
        assert_eq!(store.get("k"), Some(("v2".to_owned(), None)));
    }

    #[test]
    fn set_with_ttl_reports_remaining() {
        let store = Store::new();
        store.set("k".to_owned(), "v".to_owned(), Some(300));
        let (_, ttl) = store.get("k").unwrap();
        let ttl = ttl.unwrap();
        assert!(ttl > 0 && ttl <= 300);
    }

    #[test]
    fn delete_then_get_misses() {
        let store = Store::new();
        store.set("k".to_owned(), "v".to_owned(), None);
        assert!(store.delete("k"));
        assert_eq!(store.get("k"), None);
        assert!(!store.delete("k"));
    }

    #[test]
    fn expire_on_missing_key_fails() {
        let store = Store::new();
        assert!(!store.expire("ghost", 10));
    }

    #[test]
    fn expired_entry_is_a_miss_before_any_sweep() {
        let store = Store::new();
        store
            .entries
            .lock()
            .unwrap()
            .insert("k".to_owned(), expired_entry("v"));
        assert_eq!(store.get("k"), None);
        // get removed it eagerly
        assert!(store.entries.lock().unwrap().get("k").is_none());
    }

    #[test]
    fn keys_and_counts_skip_expired_entries() {
        let store = Store::new();
        store.set("a".to_owned(), "1".to_owned(), None);
        store.set("b".to_owned(), "2".to_owned(), Some(300));
        store
            .entries
            .lock()
            .unwrap()
            .insert("dead".to_owned(), expired_entry("x"));

        assert_eq!(store.keys(), vec!["a".to_owned(), "b".to_owned()]);
        assert_eq!(store.counts(), (2, 1));
    }

    #[test]
    fn purge_removes_only_expired_entries() {
        let store = Store::new();
        store.set("live".to_owned(), "v".to_owned(), None);
        {
            let mut entries = store.entries.lock().unwrap();
            entries.insert("dead1".to_owned(), expired_entry("x"));
            entries.insert("dead2".to_owned(), expired_entry("y"));
        }
        assert_eq!(store.purge_expired(), 2);
        assert_eq!(store.purge_expired(), 0);
        assert_eq!(store.keys(), vec!["live".to_owned()]);
    }

    #[test]
    fn restore_drops_entries_already_expired() {
        let store = Store::new();
        let past = SystemTime::now() - Duration::from_secs(60);
        let future = SystemTime::now() + Duration::from_secs(60);
        let kept = store.restore(vec![
            SnapshotEntry {
                key: "a".to_owned(),
                value: "1".to_owned(),
                expire_at: None,
            },
            SnapshotEntry {
                key: "b".to_owned(),
                value: "2".to_owned(),
                expire_at: to_epoch_secs(future),
            },
            SnapshotEntry {
                key: "stale".to_owned(),
                value: "3".to_owned(),
                expire_at: to_epoch_secs(past),
            },
        ]);
        assert_eq!(kept, 2);
        assert_eq!(store.keys(), vec!["a".to_owned(), "b".to_owned()]);
    }

    #[test]
    fn snapshot_copies_live_entries_with_expiry() {
        let store = Store::new();
        store.set("a".to_owned(), "1".to_owned(), None);
        store.set("b".to_owned(), "2".to_owned(), Some(300));
        let mut snapshot = store.snapshot();
        snapshot.sort_by(|x, y| x.key.cmp(&y.key));
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot[0].expire_at.is_none());
        assert!(snapshot[1].expire_at.is_some());
    }
}
