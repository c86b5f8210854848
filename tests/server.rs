//! End-to-end tests: real servers on ephemeral ports, real TCP clients.

use std::net::TcpListener;
use std::thread;
use std::time::Duration;

use shardkv::router::route;
use shardkv::thread_pool::{NaiveThreadPool, SharedQueueThreadPool, ThreadPool};
use shardkv::{
    ClusterConfig, KvClient, KvServer, RetryPolicy, ServerCtx, ServerDescriptor, ShardKvError,
    Stats, Status, Store,
};

/// Binds an ephemeral port, serves on a background thread, and returns the
/// descriptor a client needs to reach it.
fn start_server(id: u32) -> ServerDescriptor {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let ctx = ServerCtx::new(id, Store::new(), Stats::new());
    let server = KvServer::new(ctx, NaiveThreadPool::new(0).unwrap());
    thread::spawn(move || {
        let _ = server.serve(listener);
    });
    ServerDescriptor::new(id, "127.0.0.1", port)
}

fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_retries: 2,
        retry_delay: Duration::from_millis(50),
        timeout: Duration::from_secs(2),
    }
}

/// A descriptor nothing listens on: bind a port, then drop the listener.
fn dead_server(id: u32) -> ServerDescriptor {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    ServerDescriptor::new(id, "127.0.0.1", port)
}

#[test]
fn read_your_write_over_the_wire() {
    let config = ClusterConfig::new(vec![start_server(1)]);
    let client = KvClient::new(config).unwrap();

    let set = client.set("user:alice", "Alice").unwrap();
    assert_eq!(set.status, Status::Success);
    assert_eq!(set.server_id, 1);

    let get = client.get("user:alice").unwrap();
    assert_eq!(get.value.as_deref(), Some("Alice"));
}

#[test]
fn delete_then_get_is_a_miss() {
    let config = ClusterConfig::new(vec![start_server(1)]);
    let client = KvClient::new(config).unwrap();

    client.set("k", "v").unwrap();
    let del = client.del("k").unwrap();
    assert_eq!(del.status, Status::Success);

    let get = client.get("k").unwrap();
    assert_eq!(get.status, Status::Success);
    assert!(get.value.is_none());
    assert_eq!(get.message, "Key not found");
}

#[test]
fn expire_then_get_reports_bounded_ttl() {
    let config = ClusterConfig::new(vec![start_server(1)]);
    let client = KvClient::new(config).unwrap();

    client.set("user:alice", "Alice").unwrap();
    let expire = client.expire("user:alice", 300).unwrap();
    assert_eq!(expire.status, Status::Success);

    let get = client.get("user:alice").unwrap();
    assert_eq!(get.value.as_deref(), Some("Alice"));
    let ttl = get.ttl_remaining.unwrap();
    assert!(ttl > 0 && ttl <= 300);
}

#[test]
fn lazy_expiry_over_the_wire() {
    let config = ClusterConfig::new(vec![start_server(1)]);
    let client = KvClient::new(config).unwrap();

    client.set("short", "lived").unwrap();
    client.expire("short", 1).unwrap();
    thread::sleep(Duration::from_millis(1100));

    // no reaper is running on this server; the read itself detects expiry
    let get = client.get("short").unwrap();
    assert_eq!(get.status, Status::Success);
    assert!(get.value.is_none());
}

#[test]
fn stats_counts_exact_request_mix() {
    let config = ClusterConfig::new(vec![start_server(1)]);
    let client = KvClient::new(config).unwrap();

    for i in 0..3 {
        client.set(&format!("k{}", i), "v").unwrap();
    }
    for _ in 0..2 {
        client.get("k0").unwrap();
    }
    client.del("k1").unwrap();

    let replies = client.stats(Some(1)).unwrap();
    assert_eq!(replies.len(), 1);
    let stats = replies[0].result.as_ref().unwrap().stats.clone().unwrap();
    assert_eq!(stats.per_command["SET"], 3);
    assert_eq!(stats.per_command["GET"], 2);
    assert_eq!(stats.per_command["DEL"], 1);
    // the STATS request is counted before the payload is built
    assert_eq!(stats.per_command["STATS"], 1);
    assert_eq!(stats.total_requests, 7);
    assert_eq!(stats.total_keys, 2);
}

#[test]
fn keys_land_on_the_routed_server() {
    let servers = vec![start_server(1), start_server(2), start_server(3)];
    let expected = |key: &str| servers[route(key, servers.len())].id;
    let client = KvClient::new(ClusterConfig::new(servers.clone())).unwrap();

    for key in &["user:alice", "user:bob", "session:9", "cart:17"] {
        let set = client.set(key, "x").unwrap();
        assert_eq!(set.server_id, expected(key));
        let get = client.get(key).unwrap();
        assert_eq!(get.server_id, expected(key));
        assert_eq!(get.value.as_deref(), Some("x"));
    }
}

#[test]
fn fanout_keys_sees_every_shard() {
    let servers = vec![start_server(1), start_server(2), start_server(3)];
    let client = KvClient::new(ClusterConfig::new(servers)).unwrap();

    let mut expected: Vec<String> = (0..12).map(|i| format!("key-{}", i)).collect();
    for key in &expected {
        client.set(key, "v").unwrap();
    }

    let mut seen: Vec<String> = client
        .keys(None)
        .unwrap()
        .into_iter()
        .flat_map(|reply| reply.result.unwrap().keys.unwrap())
        .collect();
    seen.sort();
    expected.sort();
    assert_eq!(seen, expected);
}

#[test]
fn fanout_reports_partial_failure_by_server() {
    let servers = vec![start_server(1), dead_server(2)];
    let client = KvClient::with_policy(ClusterConfig::new(servers), fast_policy()).unwrap();

    let replies = client.stats(None).unwrap();
    assert_eq!(replies.len(), 2);

    assert!(replies[0].result.is_ok());
    assert_eq!(replies[0].server_id, 1);

    match replies[1].result.as_ref().unwrap_err() {
        ShardKvError::Unavailable { server_id, attempts } => {
            assert_eq!(*server_id, 2);
            assert_eq!(*attempts, 2);
        }
        other => panic!("expected Unavailable, got {}", other),
    }
}

#[test]
fn malformed_request_gets_an_error_response_and_service_continues() {
    use shardkv::protocol::{read_message, write_message};
    use shardkv::Response;
    use std::io::BufReader;
    use std::net::TcpStream;

    let server = start_server(1);
    let addr = server.resolve().unwrap();

    // hand-rolled garbage request
    let stream = TcpStream::connect(addr).unwrap();
    let mut writer = stream.try_clone().unwrap();
    write_message(&mut writer, &serde_json::json!({"command": "NOPE"})).unwrap();
    let resp: Response = read_message(&mut BufReader::new(stream)).unwrap();
    assert_eq!(resp.status, Status::Error);

    // the server still answers well-formed requests afterwards
    let client = KvClient::new(ClusterConfig::new(vec![server])).unwrap();
    assert_eq!(client.set("k", "v").unwrap().status, Status::Success);
}

#[test]
fn shared_queue_pool_serves_concurrent_clients() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let ctx = ServerCtx::new(1, Store::new(), Stats::new());
    let server = KvServer::new(ctx, SharedQueueThreadPool::new(4).unwrap());
    thread::spawn(move || {
        let _ = server.serve(listener);
    });
    let descriptor = ServerDescriptor::new(1, "127.0.0.1", port);

    let mut handles = Vec::new();
    for i in 0..8 {
        let config = ClusterConfig::new(vec![descriptor.clone()]);
        handles.push(thread::spawn(move || {
            let client = KvClient::new(config).unwrap();
            let key = format!("k{}", i);
            client.set(&key, "v").unwrap();
            assert_eq!(client.get(&key).unwrap().value.as_deref(), Some("v"));
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
}
