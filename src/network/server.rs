//! Connection listener and command dispatcher.
//!
//! Each accepted connection carries exactly one request/response exchange.
//! The listener hands streams to the thread pool; the dispatcher decodes,
//! validates, runs the store operation and encodes the reply. A miss is a
//! normal `success` outcome, not an error.

use log::{debug, warn};
use std::io::{BufRead, BufReader};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::time::Duration;

use crate::protocol::{write_message, Command, Request, Response};
use crate::stats::Stats;
use crate::store::Store;
use crate::thread_pool::ThreadPool;
use crate::Result;

/// Socket timeouts for one exchange; a stuck client must not pin a pool
/// worker forever.
const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything a connection handler needs; cheap to clone.
#[derive(Clone)]
pub struct ServerCtx {
    pub id: u32,
    pub store: Store,
    pub stats: Stats,
}

impl ServerCtx {
    pub fn new(id: u32, store: Store, stats: Stats) -> Self {
        ServerCtx { id, store, stats }
    }
}

pub struct KvServer<T: ThreadPool> {
    ctx: ServerCtx,
    pool: T,
}

impl<T: ThreadPool> KvServer<T> {
    pub fn new(ctx: ServerCtx, pool: T) -> Self {
        KvServer { ctx, pool }
    }

    pub fn listen(&self, addr: SocketAddr) -> Result<()> {
        let listener = TcpListener::bind(addr)?;
        self.serve(listener)
    }

    /// Accept loop. Connection-level failures are logged and the loop
    /// keeps serving; only a broken listener ends it.
    pub fn serve(&self, listener: TcpListener) -> Result<()> {
        for stream in listener.incoming() {
            let stream = stream?;
            let ctx = self.ctx.clone();
            self.pool.spawn(move || {
                if let Err(e) = handle(stream, &ctx) {
                    warn!("connection error: {}", e);
                }
            });
        }
        Ok(())
    }
}

fn handle(stream: TcpStream, ctx: &ServerCtx) -> Result<()> {
    stream.set_read_timeout(Some(EXCHANGE_TIMEOUT))?;
    stream.set_write_timeout(Some(EXCHANGE_TIMEOUT))?;
    let peer = stream.peer_addr()?;

    let mut reader = BufReader::new(stream.try_clone()?);
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        // client connected and went away; nothing to answer
        return Ok(());
    }

    let response = dispatch(ctx, line.trim_end());
    debug!(
        "[{}] {} -> {:?}",
        peer,
        line.trim_end(),
        response.status
    );

    let mut stream = stream;
    write_message(&mut stream, &response)
}

/// Decodes and executes one raw request line.
pub fn dispatch(ctx: &ServerCtx, raw: &str) -> Response {
    let request: Request = match serde_json::from_str(raw) {
        Ok(request) => request,
        Err(_) => return Response::err(ctx.id, "Invalid JSON"),
    };

    let command = match Command::parse(&request.command) {
        Some(command) => command,
        None => {
            return Response::err(ctx.id, &format!("Unknown command: {}", request.command));
        }
    };

    // counted once per recognized command, whatever the outcome
    ctx.stats.record(command);

    match command {
        Command::Get => handle_get(ctx, &request),
        Command::Set => handle_set(ctx, &request),
        Command::Del => handle_del(ctx, &request),
        Command::Expire => handle_expire(ctx, &request),
        Command::Stats => handle_stats(ctx),
        Command::Keys => handle_keys(ctx),
    }
}

fn required_key<'a>(ctx: &ServerCtx, request: &'a Request) -> std::result::Result<&'a str, Response> {
    match request.key.as_deref() {
        Some(key) if !key.is_empty() => Ok(key),
        _ => Err(Response::err(ctx.id, "Key is required")),
    }
}

fn handle_get(ctx: &ServerCtx, request: &Request) -> Response {
    let key = match required_key(ctx, request) {
        Ok(key) => key,
        Err(resp) => return resp,
    };
    match ctx.store.get(key) {
        Some((value, ttl_remaining)) => {
            let mut resp = Response::ok(ctx.id, "OK");
            resp.value = Some(value);
            resp.ttl_remaining = ttl_remaining;
            resp
        }
        None => Response::ok(ctx.id, "Key not found"),
    }
}

fn handle_set(ctx: &ServerCtx, request: &Request) -> Response {
    let key = match required_key(ctx, request) {
        Ok(key) => key,
        Err(resp) => return resp,
    };
    let value = match request.value.as_deref() {
        Some(value) => value,
        None => return Response::err(ctx.id, "Value is required"),
    };
    if request.ttl_seconds == Some(0) {
        return Response::err(ctx.id, "ttl_seconds must be a positive integer");
    }
    ctx.store
        .set(key.to_owned(), value.to_owned(), request.ttl_seconds);
    Response::ok(ctx.id, &format!("Key '{}' set successfully", key))
}

fn handle_del(ctx: &ServerCtx, request: &Request) -> Response {
    let key = match required_key(ctx, request) {
        Ok(key) => key,
        Err(resp) => return resp,
    };
    if ctx.store.delete(key) {
        Response::ok(ctx.id, &format!("Key '{}' deleted successfully", key))
    } else {
        Response::ok(ctx.id, "Key not found")
    }
}

fn handle_expire(ctx: &ServerCtx, request: &Request) -> Response {
    let key = match required_key(ctx, request) {
        Ok(key) => key,
        Err(resp) => return resp,
    };
    let ttl_seconds = match request.ttl_seconds {
        Some(ttl) if ttl > 0 => ttl,
        _ => return Response::err(ctx.id, "ttl_seconds must be a positive integer"),
    };
    if ctx.store.expire(key, ttl_seconds) {
        let mut resp = Response::ok(
            ctx.id,
            &format!("Key '{}' will expire in {} seconds", key, ttl_seconds),
        );
        resp.ttl_remaining = Some(ttl_seconds);
        resp
    } else {
        Response::ok(ctx.id, "Key not found")
    }
}

fn handle_stats(ctx: &ServerCtx) -> Response {
    let mut resp = Response::ok(ctx.id, "OK");
    resp.stats = Some(ctx.stats.payload(&ctx.store));
    resp
}

fn handle_keys(ctx: &ServerCtx) -> Response {
    let keys = ctx.store.keys();
    let mut resp = Response::ok(ctx.id, "OK");
    resp.count = Some(keys.len());
    resp.keys = Some(keys);
    resp
}
