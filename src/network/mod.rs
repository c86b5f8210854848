mod client;
mod server;

pub use client::{KvClient, RetryPolicy, ServerReply};
pub use server::{dispatch, KvServer, ServerCtx};
