use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::Path;

use crate::{Result, ShardKvError};

/// One entry of the static server pool. Shared by the router and every
/// client; never changes while the cluster is running.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ServerDescriptor {
    pub id: u32,
    pub host: String,
    pub port: u16,
}

impl ServerDescriptor {
    pub fn new(id: u32, host: &str, port: u16) -> Self {
        ServerDescriptor {
            id,
            host: host.to_owned(),
            port,
        }
    }

    pub fn addr_string(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Resolves the host to a socket address. Resolution failure is
    /// transport-class: the server may simply be unreachable right now.
    pub fn resolve(&self) -> Result<SocketAddr> {
        let mut addrs = (self.host.as_str(), self.port).to_socket_addrs()?;
        addrs.next().ok_or_else(|| {
            ShardKvError::Io(std::io::Error::new(
                std::io::ErrorKind::AddrNotAvailable,
                format!("no address for {}", self.addr_string()),
            ))
        })
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ClusterConfig {
    pub servers: Vec<ServerDescriptor>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        ClusterConfig {
            servers: vec![
                ServerDescriptor::new(1, "localhost", 7001),
                ServerDescriptor::new(2, "localhost", 7002),
                ServerDescriptor::new(3, "localhost", 7003),
            ],
        }
    }
}

impl ClusterConfig {
    pub fn new(servers: Vec<ServerDescriptor>) -> Self {
        ClusterConfig { servers }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let config: ClusterConfig = serde_json::from_reader(reader)?;
        if config.servers.is_empty() {
            return Err(ShardKvError::Config("server list is empty".to_owned()));
        }
        Ok(config)
    }

    pub fn get(&self, server_id: u32) -> Option<&ServerDescriptor> {
        self.servers.iter().find(|s| s.id == server_id)
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}
