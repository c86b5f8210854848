use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::protocol::{Command, StatsPayload};
use crate::store::Store;

/// Per-server request counters. Created at startup, bumped once per
/// dispatched command, never persisted.
#[derive(Clone, Default)]
pub struct Stats {
    inner: Arc<Mutex<Counters>>,
}

#[derive(Default)]
struct Counters {
    total_requests: u64,
    per_command: HashMap<Command, u64>,
}

impl Stats {
    pub fn new() -> Self {
        Stats::default()
    }

    /// Counts a dispatched command, regardless of the store-level outcome.
    pub fn record(&self, command: Command) {
        let mut counters = self.inner.lock().unwrap();
        counters.total_requests += 1;
        *counters.per_command.entry(command).or_insert(0) += 1;
    }

    pub fn total_requests(&self) -> u64 {
        self.inner.lock().unwrap().total_requests
    }

    pub fn count_for(&self, command: Command) -> u64 {
        self.inner
            .lock()
            .unwrap()
            .per_command
            .get(&command)
            .copied()
            .unwrap_or(0)
    }

    /// Builds the STATS payload; key counts come from the live store so the
    /// reaper's background deletions cannot make them drift.
    pub fn payload(&self, store: &Store) -> StatsPayload {
        let counters = self.inner.lock().unwrap();
        let mut per_command = HashMap::new();
        for command in Command::all() {
            let count = counters.per_command.get(command).copied().unwrap_or(0);
            per_command.insert(command.name().to_owned(), count);
        }
        let (total_keys, keys_with_ttl) = store.counts();
        StatsPayload {
            total_requests: counters.total_requests,
            per_command,
            total_keys,
            keys_with_ttl,
        }
    }
}
