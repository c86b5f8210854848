//! Snapshot persistence: one JSON file per server, replaced atomically.
//!
//! The writer serializes a copy of the store to `<file>.tmp` and renames it
//! over the previous snapshot, so a crash mid-write leaves the old file
//! intact. There is no write-ahead log; entries written after the last
//! snapshot are lost on crash.

use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use crate::store::{SnapshotEntry, Store};
use crate::Result;

#[derive(Serialize, Deserialize)]
struct SnapshotFile {
    entries: Vec<SnapshotEntry>,
}

/// Snapshot file name for a server, derived from its id.
pub fn snapshot_path(dir: &Path, server_id: u32) -> PathBuf {
    dir.join(format!("kv_store_server{}.json", server_id))
}

/// Writes the store to `path`, returning the number of entries saved.
pub fn save(store: &Store, path: &Path) -> Result<usize> {
    let entries = store.snapshot();
    let count = entries.len();

    let tmp_path = path.with_extension("json.tmp");
    {
        let writer = BufWriter::new(File::create(&tmp_path)?);
        serde_json::to_writer_pretty(writer, &SnapshotFile { entries })?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(count)
}

/// Loads a snapshot into the store, returning the number of live entries
/// restored. A missing file is not an error: the server starts empty.
pub fn load(store: &Store, path: &Path) -> Result<usize> {
    if !path.exists() {
        return Ok(0);
    }
    let reader = BufReader::new(File::open(path)?);
    let file: SnapshotFile = serde_json::from_reader(reader)?;
    Ok(store.restore(file.entries))
}
