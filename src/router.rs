//! Key-to-shard routing.
//!
//! Static modulo partitioning over the fixed server list. The docs of the
//! original system called this "consistent hashing", but there is no ring:
//! changing the server count remaps keys silently, which is an accepted
//! limitation.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Maps a key to a server index in `0..server_count`.
///
/// `DefaultHasher::new()` uses fixed keys, so the result is stable across
/// calls and across processes for the same key and server count.
///
/// Panics if `server_count` is zero; callers validate their config first.
pub fn route(key: &str, server_count: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    (hasher.finish() % server_count as u64) as usize
}
