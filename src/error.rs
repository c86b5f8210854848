use std::io;

#[derive(Fail, Debug)]
pub enum ShardKvError {
    #[fail(display = "{}", _0)]
    Io(#[cause] io::Error),
    #[fail(display = "{}", _0)]
    Serde(#[cause] serde_json::Error),
    #[fail(display = "invalid configuration: {}", _0)]
    Config(String),
    #[fail(display = "{}", _0)]
    Rpc(String),
    #[fail(display = "server {} unavailable after {} attempts", server_id, attempts)]
    Unavailable { server_id: u32, attempts: u32 },
}

impl ShardKvError {
    /// Transport-class failures (refused, timeout, reset) are the only ones
    /// the retry executor is allowed to retry.
    pub fn is_transport(&self) -> bool {
        match self {
            ShardKvError::Io(_) => true,
            _ => false,
        }
    }
}

impl From<io::Error> for ShardKvError {
    fn from(error: io::Error) -> Self {
        ShardKvError::Io(error)
    }
}

impl From<serde_json::Error> for ShardKvError {
    fn from(error: serde_json::Error) -> Self {
        ShardKvError::Serde(error)
    }
}

pub type Result<T> = std::result::Result<T, ShardKvError>;
