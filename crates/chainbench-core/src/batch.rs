//! Batch input types consumed by the broadcaster.
//!
//! Transaction synthesis (signing, nonce management, ABI encoding) is
//! someone else's problem; a [`Transaction`] here is just an opaque
//! envelope with a hash worth logging.

use std::collections::BTreeMap;
use std::fmt;

/// A pre-signed, RLP-serialized transaction envelope.
///
/// The core never inspects nonces, gas, or signatures — it only moves the
/// raw bytes to `eth_sendRawTransaction` and keeps the hash around for
/// logging. `Debug`/`Display` print the hash only; the raw bytes are never
/// printed.
#[derive(Clone)]
pub struct Transaction {
    raw: Vec<u8>,
    hash: String,
}

impl Transaction {
    /// Build a transaction from its raw bytes and a precomputed hash.
    ///
    /// The hash is whatever the upstream signer produced; this type does
    /// not recompute or validate it.
    #[must_use]
    pub fn new(raw: Vec<u8>, hash: impl Into<String>) -> Self {
        Self { raw, hash: hash.into() }
    }

    /// The raw transaction bytes, as handed to `eth_sendRawTransaction`.
    #[must_use]
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// The stable textual hash used for logging.
    #[must_use]
    pub fn hash(&self) -> &str {
        &self.hash
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction").field("hash", &self.hash).field("len", &self.raw.len()).finish()
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.hash)
    }
}

/// A mapping from opaque batch-id to an ordered sequence of transactions.
///
/// Order within a batch must be preserved end-to-end (nonces are
/// sequential per sender); batches are mutually independent and may run
/// concurrently. `BTreeMap` is used over `HashMap` purely so tests iterate
/// batch ids in a deterministic order — batch ids carry no meaning beyond
/// identity.
pub type BatchMap = BTreeMap<i64, Vec<Transaction>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_and_display_never_print_raw_bytes() {
        let tx = Transaction::new(vec![0xde, 0xad, 0xbe, 0xef], "0xabc123");
        let debug = format!("{tx:?}");
        let display = format!("{tx}");
        assert!(!debug.contains("222")); // 0xde as decimal
        assert_eq!(display, "0xabc123");
        assert!(debug.contains("0xabc123"));
    }

    #[test]
    fn batch_map_preserves_insertion_order_within_a_batch() {
        let mut batches: BatchMap = BatchMap::new();
        batches.insert(0, vec![Transaction::new(vec![1], "a"), Transaction::new(vec![2], "b")]);
        let batch = &batches[&0];
        assert_eq!(batch[0].hash(), "a");
        assert_eq!(batch[1].hash(), "b");
    }
}
