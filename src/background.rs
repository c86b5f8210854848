//! Background loops: the expiry reaper and the persistence writer.
//!
//! Each runs on its own thread with a crossbeam stop channel;
//! `recv_timeout` doubles as the tick timer, so a stop signal interrupts
//! the wait immediately instead of after a full period.

use crossbeam::channel::{bounded, RecvTimeoutError, Sender};
use log::{debug, error, info};
use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::snapshot;
use crate::store::Store;

pub const REAP_INTERVAL: Duration = Duration::from_secs(5);
pub const PERSIST_INTERVAL: Duration = Duration::from_secs(10);

/// Handle to a running background loop. `stop` is cooperative: the loop
/// finishes its current cycle before the join returns.
pub struct BackgroundTask {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

impl BackgroundTask {
    pub fn stop(self) {
        let _ = self.stop_tx.send(());
        let _ = self.handle.join();
    }
}

/// Spawns the reaper: every `interval`, physically remove expired entries.
pub fn start_reaper(store: Store, interval: Duration) -> BackgroundTask {
    let (stop_tx, stop_rx) = bounded::<()>(1);
    let handle = thread::Builder::new()
        .name("reaper".to_owned())
        .spawn(move || loop {
            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {
                    let removed = store.purge_expired();
                    if removed > 0 {
                        info!("reaper removed {} expired key(s)", removed);
                    }
                }
                _ => break,
            }
        })
        .expect("failed to spawn reaper thread");
    BackgroundTask { stop_tx, handle }
}

/// Spawns the persistence writer: every `interval`, snapshot the store to
/// `path`. A failed write is logged and retried on the next cycle. Stopping
/// the task writes one final snapshot so a shutdown never loses the
/// in-flight state.
pub fn start_persister(store: Store, path: PathBuf, interval: Duration) -> BackgroundTask {
    let (stop_tx, stop_rx) = bounded::<()>(1);
    let handle = thread::Builder::new()
        .name("persister".to_owned())
        .spawn(move || loop {
            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => match snapshot::save(&store, &path) {
                    Ok(count) => debug!("persisted {} key(s) to {}", count, path.display()),
                    Err(e) => error!("failed to persist snapshot: {}", e),
                },
                _ => {
                    if let Err(e) = snapshot::save(&store, &path) {
                        error!("failed to write final snapshot: {}", e);
                    }
                    break;
                }
            }
        })
        .expect("failed to spawn persister thread");
    BackgroundTask { stop_tx, handle }
}
