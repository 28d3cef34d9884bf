//! Minimal loader for a prepared batch map.
//!
//! Transaction synthesis and disk serialization of prepared batches are
//! out of scope (they belong to the external generator); this module only
//! reads what that generator already wrote, mirroring the `Store.LoadTxsMap`
//! call site the broadcaster sits behind.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chainbench_core::{BatchMap, Transaction};
use serde::Deserialize;

use crate::error::PersistenceError;

/// On-disk shape: `{"<batch_id>": ["<hex tx>", ...], ...}`.
#[derive(Debug, Deserialize)]
struct RawBatchFile(BTreeMap<String, Vec<String>>);

/// Load a [`BatchMap`] from a JSON file of `{batch_id: [hex-encoded raw
/// tx, ...]}`.
///
/// Each hex string becomes a [`Transaction`] whose hash is its own
/// `0x`-prefixed hex form — the real generator attaches the actual
/// on-chain transaction hash, but that's outside this stand-in loader's
/// remit.
///
/// # Errors
///
/// Returns [`PersistenceError`] if the file can't be read, isn't valid
/// JSON in the expected shape, or contains non-hex transaction entries.
pub fn load_batch_map(path: impl AsRef<Path>) -> Result<BatchMap, PersistenceError> {
    let content = fs::read_to_string(path)?;
    let raw: RawBatchFile = serde_json::from_str(&content)?;

    let mut batches = BatchMap::new();
    for (batch_id_str, hex_txs) in raw.0 {
        let batch_id: i64 =
            batch_id_str.parse().map_err(|_| PersistenceError::InvalidBatchId(batch_id_str.clone()))?;

        let mut txs = Vec::with_capacity(hex_txs.len());
        for (index, hex_tx) in hex_txs.iter().enumerate() {
            let raw_bytes = hex::decode(hex_tx.trim_start_matches("0x"))
                .map_err(|source| PersistenceError::InvalidHex { batch_id, index, source })?;
            txs.push(Transaction::new(raw_bytes, hex_tx.clone()));
        }
        batches.insert(batch_id, txs);
    }

    Ok(batches)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;

    static COUNTER: AtomicU64 = AtomicU64::new(0);

    /// A throwaway path under the OS temp dir, removed on drop.
    fn scratch_path() -> std::path::PathBuf {
        let id = COUNTER.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!("chainbench-test-{}-{id}.json", std::process::id()))
    }

    #[test]
    fn loads_valid_batch_file() {
        let path = scratch_path();
        fs::write(&path, r#"{"0": ["0xdead", "0xbeef"], "1": ["0x01"]}"#).expect("write failed");

        let batches = load_batch_map(&path).expect("load failed");
        fs::remove_file(&path).ok();

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[&0].len(), 2);
        assert_eq!(batches[&0][0].hash(), "0xdead");
        assert_eq!(batches[&1].len(), 1);
    }

    #[test]
    fn rejects_invalid_hex() {
        let path = scratch_path();
        fs::write(&path, r#"{"0": ["not-hex"]}"#).expect("write failed");

        let result = load_batch_map(&path);
        fs::remove_file(&path).ok();

        assert!(matches!(result, Err(PersistenceError::InvalidHex { .. })));
    }

    #[test]
    fn missing_file_surfaces_io_error() {
        let result = load_batch_map("/nonexistent/path/batches.json");
        assert!(matches!(result, Err(PersistenceError::Io(_))));
    }
}
