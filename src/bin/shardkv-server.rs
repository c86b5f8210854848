#[macro_use]
extern crate log;
extern crate env_logger;
extern crate shardkv;

use std::net::SocketAddr;
use std::path::PathBuf;
use structopt::StructOpt;

use shardkv::background::{start_persister, start_reaper, PERSIST_INTERVAL, REAP_INTERVAL};
use shardkv::snapshot::{self, snapshot_path};
use shardkv::thread_pool::{SharedQueueThreadPool, ThreadPool};
use shardkv::{KvServer, Result, ServerCtx, Stats, Store};

#[derive(StructOpt, Debug)]
struct Opts {
    #[structopt(long, help = "Server id", value_name = "ID", default_value = "1")]
    id: u32,
    #[structopt(
        long,
        help = "Set server address",
        value_name = "IP:PORT",
        default_value = "127.0.0.1:7001",
        parse(try_from_str)
    )]
    addr: SocketAddr,
    #[structopt(
        long = "data-dir",
        help = "Directory for the snapshot file",
        value_name = "DIR",
        default_value = ".",
        parse(from_os_str)
    )]
    data_dir: PathBuf,
}

fn main() -> Result<()> {
    env_logger::init();
    let opt = Opts::from_args();
    info!(
        "{} version: {}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );
    info!(
        "Configuration: --id {} --addr {} --data-dir {}",
        opt.id,
        opt.addr,
        opt.data_dir.display()
    );

    let store = Store::new();
    let path = snapshot_path(&opt.data_dir, opt.id);
    match snapshot::load(&store, &path) {
        Ok(count) => info!("loaded {} key(s) from {}", count, path.display()),
        Err(e) => warn!("could not load snapshot, starting empty: {}", e),
    }

    let _reaper = start_reaper(store.clone(), REAP_INTERVAL);
    let _persister = start_persister(store.clone(), path, PERSIST_INTERVAL);

    let pool = SharedQueueThreadPool::new(num_cpus::get() as u32)?;
    let server = KvServer::new(ServerCtx::new(opt.id, store, Stats::new()), pool);
    info!("listening on {}", opt.addr);
    server.listen(opt.addr)
}
