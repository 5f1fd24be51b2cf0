//! Ledger blocks.

use crate::domain::transaction::TrailTransaction;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Zero string used as the genesis block's `previous_hash`.
pub const GENESIS_PREVIOUS_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// One block of the chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrailBlock {
    pub index: u64,
    /// Unix milliseconds.
    pub timestamp: i64,
    pub transactions: Vec<TrailTransaction>,
    pub previous_hash: String,
    pub nonce: u64,
    pub difficulty: u32,
    pub hash: String,
}

/// The hashed body: every field except `hash` itself.
#[derive(Serialize)]
struct BlockBody<'a> {
    index: u64,
    timestamp: i64,
    transactions: &'a [TrailTransaction],
    previous_hash: &'a str,
    nonce: u64,
    difficulty: u32,
}

impl TrailBlock {
    /// A candidate block, not yet mined: `hash` is the hash at nonce 0.
    pub fn candidate(
        index: u64,
        transactions: Vec<TrailTransaction>,
        previous_hash: String,
        difficulty: u32,
    ) -> Self {
        let mut block = Self {
            index,
            timestamp: Utc::now().timestamp_millis(),
            transactions,
            previous_hash,
            nonce: 0,
            difficulty,
            hash: String::new(),
        };
        block.hash = block.compute_hash();
        block
    }

    /// The genesis block: index 0, zero previous hash, no mining.
    pub fn genesis(difficulty: u32) -> Self {
        Self::candidate(0, Vec::new(), GENESIS_PREVIOUS_HASH.to_string(), difficulty)
    }

    /// SHA-256 over the canonical JSON body, hex-encoded.
    pub fn compute_hash(&self) -> String {
        let body = BlockBody {
            index: self.index,
            timestamp: self.timestamp,
            transactions: &self.transactions,
            previous_hash: &self.previous_hash,
            nonce: self.nonce,
            difficulty: self.difficulty,
        };
        // Struct serialization is deterministic: field order is fixed and
        // every map inside is a BTreeMap.
        let bytes = serde_json::to_vec(&body).expect("block body serializes");
        hex::encode(Sha256::digest(bytes))
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0
    }

    /// Whether a hash satisfies a difficulty (leading zero hex digits).
    pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
        hash.chars().take(difficulty as usize).all(|c| c == '0')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_covers_nonce() {
        let mut block = TrailBlock::genesis(1);
        let original = block.compute_hash();
        block.nonce = 42;
        assert_ne!(block.compute_hash(), original);
    }

    #[test]
    fn test_genesis_shape() {
        let block = TrailBlock::genesis(4);
        assert!(block.is_genesis());
        assert_eq!(block.previous_hash, GENESIS_PREVIOUS_HASH);
        assert_eq!(block.hash, block.compute_hash());
        assert!(block.transactions.is_empty());
    }

    #[test]
    fn test_meets_difficulty() {
        assert!(TrailBlock::meets_difficulty("000abc", 3));
        assert!(!TrailBlock::meets_difficulty("00abc0", 3));
        assert!(TrailBlock::meets_difficulty("anything", 0));
    }

    #[test]
    fn test_serde_round_trip_preserves_equality() {
        let block = TrailBlock::genesis(2);
        let json = serde_json::to_string(&block).unwrap();
        let back: TrailBlock = serde_json::from_str(&json).unwrap();
        assert_eq!(block, back);
    }
}
