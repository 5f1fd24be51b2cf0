//! The chain container and its validation rules.

use crate::domain::block::{TrailBlock, GENESIS_PREVIOUS_HASH};
use crate::error::TrailError;
use ed25519_dalek::VerifyingKey;

/// The in-memory chain. Owned by exactly one writer.
#[derive(Debug)]
pub struct TrailChain {
    blocks: Vec<TrailBlock>,
}

impl TrailChain {
    /// Fresh chain with a new genesis block.
    pub fn new(difficulty: u32) -> Self {
        Self {
            blocks: vec![TrailBlock::genesis(difficulty)],
        }
    }

    /// Adopt loaded blocks without validating; call [`Self::validate`]
    /// before trusting them.
    pub fn from_blocks(blocks: Vec<TrailBlock>) -> Self {
        Self { blocks }
    }

    pub fn blocks(&self) -> &[TrailBlock] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn tail(&self) -> &TrailBlock {
        self.blocks.last().expect("chain always has genesis")
    }

    /// Append a mined block after validating it against the tail.
    pub fn append(
        &mut self,
        block: TrailBlock,
        verifying_key: &VerifyingKey,
    ) -> Result<(), TrailError> {
        validate_link(self.tail(), &block, verifying_key)?;
        self.blocks.push(block);
        Ok(())
    }

    /// Full-chain validation: linkage, recomputed hashes, difficulty
    /// prefixes, and every transaction signature.
    pub fn validate(&self, verifying_key: &VerifyingKey) -> Result<(), TrailError> {
        let Some(genesis) = self.blocks.first() else {
            return Err(TrailError::BlockValidation {
                index: 0,
                reason: "empty chain".to_string(),
            });
        };
        if !genesis.is_genesis() || genesis.previous_hash != GENESIS_PREVIOUS_HASH {
            return Err(TrailError::BlockValidation {
                index: genesis.index,
                reason: "malformed genesis".to_string(),
            });
        }

        for pair in self.blocks.windows(2) {
            validate_link(&pair[0], &pair[1], verifying_key)?;
        }
        Ok(())
    }

    /// Transactions newest-first across the whole chain.
    pub fn transactions_newest_first(&self) -> impl Iterator<Item = &crate::domain::transaction::TrailTransaction> {
        self.blocks
            .iter()
            .rev()
            .flat_map(|block| block.transactions.iter().rev())
    }

    pub fn transaction_count(&self) -> usize {
        self.blocks.iter().map(|b| b.transactions.len()).sum()
    }
}

fn validate_link(
    previous: &TrailBlock,
    block: &TrailBlock,
    verifying_key: &VerifyingKey,
) -> Result<(), TrailError> {
    if block.index != previous.index + 1 {
        return Err(TrailError::BlockValidation {
            index: block.index,
            reason: format!("index gap after {}", previous.index),
        });
    }
    if block.previous_hash != previous.hash {
        return Err(TrailError::BlockValidation {
            index: block.index,
            reason: "previous_hash mismatch".to_string(),
        });
    }
    if block.hash != block.compute_hash() {
        return Err(TrailError::BlockValidation {
            index: block.index,
            reason: "hash does not match body".to_string(),
        });
    }
    if !TrailBlock::meets_difficulty(&block.hash, block.difficulty) {
        return Err(TrailError::BlockValidation {
            index: block.index,
            reason: format!("hash misses difficulty {}", block.difficulty),
        });
    }
    for tx in &block.transactions {
        if !tx.verify(verifying_key) {
            return Err(TrailError::TransactionValidation {
                tx_id: tx.tx_id,
                reason: "signature does not verify".to_string(),
            });
        }
    }
    Ok(())
}

/// Difficulty adjustment: compare the rolling average mine time against the
/// block-time target. Twice too fast raises difficulty, twice too slow
/// lowers it, never below 1.
pub fn adjusted_difficulty(current: u32, average_mine_secs: f64, target_secs: u64) -> u32 {
    let target = target_secs as f64;
    if average_mine_secs < 0.5 * target {
        current + 1
    } else if average_mine_secs > 2.0 * target && current > 1 {
        current - 1
    } else {
        current
    }
}
