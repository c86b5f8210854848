//! shardkv: a partitioned in-memory key-value store.
//!
//! A fixed pool of servers each owns a slice of the keyspace; the client
//! routes every key to exactly one server by stable hash modulo the pool
//! size and retries transient transport failures. Each server keeps its
//! shard in memory with optional per-key TTLs, reaps expired entries in
//! the background and snapshots itself to disk periodically.

#[macro_use]
extern crate failure;

pub mod background;
pub mod config;
mod error;
pub mod network;
pub mod protocol;
pub mod router;
pub mod snapshot;
pub mod stats;
pub mod store;
pub mod thread_pool;

pub use crate::config::{ClusterConfig, ServerDescriptor};
pub use crate::error::{Result, ShardKvError};
pub use crate::network::{dispatch, KvClient, KvServer, RetryPolicy, ServerCtx, ServerReply};
pub use crate::protocol::{Command, Request, Response, Status};
pub use crate::stats::Stats;
pub use crate::store::Store;
