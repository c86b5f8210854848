//! Shard-routing client and retry executor.
//!
//! The client is stateless and synchronous: one new connection per request,
//! one request in flight. Transport-class failures consume retry attempts
//! with a fixed delay between them; a well-formed error response from the
//! server comes back immediately and is never retried.

use log::warn;
use std::io::BufReader;
use std::net::TcpStream;
use std::thread;
use std::time::Duration;

use crate::config::{ClusterConfig, ServerDescriptor};
use crate::protocol::{read_message, write_message, Request, Response};
use crate::router::route;
use crate::{Result, ShardKvError};

#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// Total attempt budget, not "retries after the first try".
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 3,
            retry_delay: Duration::from_millis(500),
            timeout: Duration::from_secs(5),
        }
    }
}

/// Result of one server in a fan-out call (STATS/KEYS with no target).
pub struct ServerReply {
    pub server_id: u32,
    pub result: Result<Response>,
}

pub struct KvClient {
    config: ClusterConfig,
    policy: RetryPolicy,
}

impl KvClient {
    pub fn new(config: ClusterConfig) -> Result<Self> {
        if config.is_empty() {
            return Err(ShardKvError::Config("server list is empty".to_owned()));
        }
        Ok(KvClient {
            config,
            policy: RetryPolicy::default(),
        })
    }

    pub fn with_policy(config: ClusterConfig, policy: RetryPolicy) -> Result<Self> {
        let mut client = KvClient::new(config)?;
        client.policy = policy;
        Ok(client)
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// The server owning `key` under static modulo partitioning.
    pub fn server_for(&self, key: &str) -> &ServerDescriptor {
        &self.config.servers[route(key, self.config.len())]
    }

    pub fn set(&self, key: &str, value: &str) -> Result<Response> {
        self.execute(self.server_for(key), &Request::set(key, value))
    }

    pub fn get(&self, key: &str) -> Result<Response> {
        self.execute(self.server_for(key), &Request::get(key))
    }

    pub fn del(&self, key: &str) -> Result<Response> {
        self.execute(self.server_for(key), &Request::del(key))
    }

    pub fn expire(&self, key: &str, ttl_seconds: u64) -> Result<Response> {
        self.execute(self.server_for(key), &Request::expire(key, ttl_seconds))
    }

    /// STATS against one server, or all of them when no id is given.
    pub fn stats(&self, server_id: Option<u32>) -> Result<Vec<ServerReply>> {
        self.broadcast(Request::stats(), server_id)
    }

    /// KEYS against one server, or all of them when no id is given.
    pub fn keys(&self, server_id: Option<u32>) -> Result<Vec<ServerReply>> {
        self.broadcast(Request::keys(), server_id)
    }

    /// Fan-out helper. Per-server failures stay in the reply list so the
    /// caller can report partial success naming the servers that failed.
    fn broadcast(&self, request: Request, server_id: Option<u32>) -> Result<Vec<ServerReply>> {
        let targets: Vec<&ServerDescriptor> = match server_id {
            Some(id) => {
                let server = self
                    .config
                    .get(id)
                    .ok_or_else(|| ShardKvError::Config(format!("unknown server id {}", id)))?;
                vec![server]
            }
            None => self.config.servers.iter().collect(),
        };
        Ok(targets
            .into_iter()
            .map(|server| ServerReply {
                server_id: server.id,
                result: self.execute(server, &request),
            })
            .collect())
    }

    /// Sends one request to one server, retrying transport-class failures
    /// up to the policy's attempt budget with a fixed delay in between.
    pub fn execute(&self, server: &ServerDescriptor, request: &Request) -> Result<Response> {
        let mut attempt = 0;
        while attempt < self.policy.max_retries {
            attempt += 1;
            match self.attempt(server, request) {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transport() => {
                    warn!(
                        "server {} attempt {}/{} failed: {}",
                        server.id, attempt, self.policy.max_retries, e
                    );
                    if attempt < self.policy.max_retries {
                        thread::sleep(self.policy.retry_delay);
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Err(ShardKvError::Unavailable {
            server_id: server.id,
            attempts: self.policy.max_retries,
        })
    }

    /// One connect-send-receive round trip bounded by the per-attempt
    /// timeout.
    fn attempt(&self, server: &ServerDescriptor, request: &Request) -> Result<Response> {
        let addr = server.resolve()?;
        let stream = TcpStream::connect_timeout(&addr, self.policy.timeout)?;
        stream.set_read_timeout(Some(self.policy.timeout))?;
        stream.set_write_timeout(Some(self.policy.timeout))?;

        let mut writer = stream.try_clone()?;
        write_message(&mut writer, request)?;

        let mut reader = BufReader::new(stream);
        match read_message::<_, Response>(&mut reader) {
            Ok(response) => Ok(response),
            // EOF or garbage mid-response is not a transport failure worth
            // retrying: the server answered, just not usably
            Err(ShardKvError::Serde(_)) => {
                Err(ShardKvError::Rpc("invalid response from server".to_owned()))
            }
            Err(e) => Err(e),
        }
    }
}
