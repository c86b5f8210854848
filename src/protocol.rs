//! Wire types for the one-exchange-per-connection protocol.
//!
//! Each message is a single line of JSON. The client sends one `Request`,
//! the server answers with one `Response`, and either side may close.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::io::{BufRead, Write};

use crate::Result;

/// The command set. Matched case-insensitively on the wire.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Command {
    Get,
    Set,
    Del,
    Expire,
    Stats,
    Keys,
}

impl Command {
    /// `DELETE` is accepted as an alias of `DEL` for wire compatibility.
    pub fn parse(raw: &str) -> Option<Command> {
        match raw.to_uppercase().as_str() {
            "GET" => Some(Command::Get),
            "SET" => Some(Command::Set),
            "DEL" | "DELETE" => Some(Command::Del),
            "EXPIRE" => Some(Command::Expire),
            "STATS" => Some(Command::Stats),
            "KEYS" => Some(Command::Keys),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Get => "GET",
            Command::Set => "SET",
            Command::Del => "DEL",
            Command::Expire => "EXPIRE",
            Command::Stats => "STATS",
            Command::Keys => "KEYS",
        }
    }

    pub fn all() -> &'static [Command] {
        &[
            Command::Get,
            Command::Set,
            Command::Del,
            Command::Expire,
            Command::Stats,
            Command::Keys,
        ]
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Request {
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_seconds: Option<u64>,
}

impl Request {
    fn bare(command: Command) -> Self {
        Request {
            command: command.name().to_owned(),
            key: None,
            value: None,
            ttl_seconds: None,
        }
    }

    pub fn get(key: &str) -> Self {
        let mut req = Request::bare(Command::Get);
        req.key = Some(key.to_owned());
        req
    }

    pub fn set(key: &str, value: &str) -> Self {
        let mut req = Request::bare(Command::Set);
        req.key = Some(key.to_owned());
        req.value = Some(value.to_owned());
        req
    }

    pub fn set_with_ttl(key: &str, value: &str, ttl_seconds: u64) -> Self {
        let mut req = Request::set(key, value);
        req.ttl_seconds = Some(ttl_seconds);
        req
    }

    pub fn del(key: &str) -> Self {
        let mut req = Request::bare(Command::Del);
        req.key = Some(key.to_owned());
        req
    }

    pub fn expire(key: &str, ttl_seconds: u64) -> Self {
        let mut req = Request::bare(Command::Expire);
        req.key = Some(key.to_owned());
        req.ttl_seconds = Some(ttl_seconds);
        req
    }

    pub fn stats() -> Self {
        Request::bare(Command::Stats)
    }

    pub fn keys() -> Self {
        Request::bare(Command::Keys)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    #[serde(rename = "success")]
    Success,
    #[serde(rename = "error")]
    Error,
}

/// STATS payload: request counters plus key counts derived from the live
/// store at query time.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StatsPayload {
    pub total_requests: u64,
    pub per_command: HashMap<String, u64>,
    pub total_keys: usize,
    pub keys_with_ttl: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Response {
    pub status: Status,
    pub message: String,
    pub server_id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_remaining: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keys: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<StatsPayload>,
}

impl Response {
    pub fn ok(server_id: u32, message: &str) -> Self {
        Response {
            status: Status::Success,
            message: message.to_owned(),
            server_id,
            value: None,
            ttl_remaining: None,
            keys: None,
            count: None,
            stats: None,
        }
    }

    pub fn err(server_id: u32, message: &str) -> Self {
        let mut resp = Response::ok(server_id, message);
        resp.status = Status::Error;
        resp
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}

/// Writes one JSON message followed by a newline and flushes.
pub fn write_message<W: Write, T: Serialize>(writer: &mut W, message: &T) -> Result<()> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    writer.write_all(line.as_bytes())?;
    writer.flush()?;
    Ok(())
}

/// Reads one newline-delimited JSON message. A closed connection yields an
/// `UnexpectedEof` I/O error.
pub fn read_message<R: BufRead, T: serde::de::DeserializeOwned>(reader: &mut R) -> Result<T> {
    let mut line = String::new();
    let len = reader.read_line(&mut line)?;
    if len == 0 {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "connection closed before a message arrived",
        )
        .into());
    }
    Ok(serde_json::from_str(line.trim_end())?)
}
