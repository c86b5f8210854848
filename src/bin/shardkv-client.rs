extern crate env_logger;
extern crate shardkv;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use structopt::StructOpt;

use shardkv::{ClusterConfig, KvClient, Response, Result, ServerReply, Status};

#[derive(StructOpt, Debug)]
struct Opts {
    #[structopt(
        long,
        help = "Cluster config file (JSON server list)",
        value_name = "FILE",
        parse(from_os_str)
    )]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let opt = Opts::from_args();
    let config = match opt.config {
        Some(path) => ClusterConfig::from_file(&path)?,
        None => ClusterConfig::default(),
    };
    let client = KvClient::new(config)?;

    println!(
        "shardkv client - {} server(s), sharding by key hash",
        client.config().len()
    );
    print_help();

    let stdin = io::stdin();
    loop {
        print!("kv> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.is_empty() {
            continue;
        }
        match run_command(&client, &parts) {
            Ok(true) => break,
            Ok(false) => {}
            Err(e) => eprintln!("error: {}", e),
        }
    }
    println!("Goodbye!");
    Ok(())
}

/// Runs one shell command; returns `Ok(true)` when the shell should exit.
fn run_command(client: &KvClient, parts: &[&str]) -> Result<bool> {
    match parts[0].to_lowercase().as_str() {
        "exit" | "quit" => return Ok(true),
        "help" => print_help(),
        "servers" => print_servers(client),
        "set" if parts.len() >= 3 => {
            let value = parts[2..].join(" ");
            print_response(&client.set(parts[1], &value)?);
        }
        "set" => println!("Usage: set <key> <value>"),
        "get" if parts.len() == 2 => print_response(&client.get(parts[1])?),
        "get" => println!("Usage: get <key>"),
        "del" | "delete" if parts.len() == 2 => print_response(&client.del(parts[1])?),
        "del" | "delete" => println!("Usage: del <key>"),
        "expire" if parts.len() == 3 => match parts[2].parse::<u64>() {
            Ok(seconds) => print_response(&client.expire(parts[1], seconds)?),
            Err(_) => println!("Error: seconds must be an integer"),
        },
        "expire" => println!("Usage: expire <key> <seconds>"),
        "stats" => print_replies(&client.stats(parse_server_id(parts)?)?),
        "keys" => print_replies(&client.keys(parse_server_id(parts)?)?),
        other => println!("Unknown command: {} (type 'help')", other),
    }
    Ok(false)
}

fn parse_server_id(parts: &[&str]) -> Result<Option<u32>> {
    match parts.get(1) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<u32>()
            .map(Some)
            .map_err(|_| shardkv::ShardKvError::Config("server_id must be an integer".to_owned())),
    }
}

fn print_servers(client: &KvClient) {
    for server in &client.config().servers {
        println!("Server {}: {}", server.id, server.addr_string());
    }
    println!("Total servers: {}", client.config().len());
}

fn print_response(resp: &Response) {
    match resp.status {
        Status::Success => {
            println!("[server {}] {}", resp.server_id, resp.message);
            if let Some(value) = &resp.value {
                match resp.ttl_remaining {
                    Some(ttl) => println!("  value: {} (ttl: {}s)", value, ttl),
                    None => println!("  value: {}", value),
                }
            }
            if let Some(keys) = &resp.keys {
                println!(
                    "  keys ({}): {}",
                    resp.count.unwrap_or(keys.len()),
                    if keys.is_empty() {
                        "none".to_owned()
                    } else {
                        keys.join(", ")
                    }
                );
            }
            if let Some(stats) = &resp.stats {
                println!("  total requests: {}", stats.total_requests);
                let mut commands: Vec<_> = stats.per_command.iter().collect();
                commands.sort();
                for (command, count) in commands {
                    println!("  {}: {}", command, count);
                }
                println!("  total keys: {}", stats.total_keys);
                println!("  keys with ttl: {}", stats.keys_with_ttl);
            }
        }
        Status::Error => println!("[server {}] ERROR: {}", resp.server_id, resp.message),
    }
}

fn print_replies(replies: &[ServerReply]) {
    for reply in replies {
        match &reply.result {
            Ok(resp) => print_response(resp),
            Err(e) => println!("[server {}] UNREACHABLE: {}", reply.server_id, e),
        }
    }
}

fn print_help() {
    println!("Commands:");
    println!("  set <key> <value>       store a value");
    println!("  get <key>               fetch a value");
    println!("  del <key>               delete a key");
    println!("  expire <key> <seconds>  set a TTL on a key");
    println!("  stats [server_id]       request counters (one or all servers)");
    println!("  keys [server_id]        list keys (one or all servers)");
    println!("  servers                 show the static server pool");
    println!("  help                    show this help");
    println!("  exit                    leave the shell");
}
