use crate::{constants::CHAIN_DUMP_INTERVAL, pow, Block, ChainError};
use tracing::debug;

/// The ordered sequence of accepted blocks.
///
/// Every block held by the store has a valid proof for the store's difficulty,
/// the first block is a genesis block, and each block follows its predecessor.
/// Callers that share a store across tasks wrap it in a single lock.
#[derive(Clone, Debug)]
pub struct ChainStore {
    blocks: Vec<Block>,
    difficulty: usize,
}

impl ChainStore {
    pub fn new(difficulty: usize) -> Self {
        Self {
            blocks: Vec::new(),
            difficulty,
        }
    }

    pub fn with_genesis(genesis: Block, difficulty: usize) -> Result<Self, ChainError> {
        let mut store = Self::new(difficulty);
        store.append(genesis)?;
        Ok(store)
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Scans adjacent pairs and reports the first broken link.
    pub fn validate(&self) -> Result<(), ChainError> {
        for pair in self.blocks.windows(2) {
            let (prev, cur) = (&pair[0], &pair[1]);
            if !cur.follows(prev) {
                return Err(ChainError::ChainBroken {
                    prev_index: prev.index(),
                    index: cur.index(),
                });
            }
        }
        Ok(())
    }

    /// Appends `block`, rolling it back if the chain no longer validates.
    /// On error the store is exactly as it was before the call.
    pub fn append(&mut self, block: Block) -> Result<(), ChainError> {
        if !block.has_valid_proof(self.difficulty) {
            debug!(
                index = block.index(),
                zeros = pow::count_trailing_zero_digits(block.hash()),
                required = self.difficulty,
                "proof check failed"
            );
            return Err(ChainError::InvalidProof {
                index: block.index(),
            });
        }
        if self.blocks.is_empty() && !block.is_genesis() {
            return Err(ChainError::InvalidGenesis);
        }

        self.blocks.push(block);
        if let Err(err) = self.validate() {
            // only the block just pushed can have broken the chain
            self.blocks.pop();
            return Err(err);
        }

        if let Some(last) = self.blocks.last() {
            if last.index() % CHAIN_DUMP_INTERVAL == 0 {
                debug!(length = self.blocks.len(), chain = ?self.blocks, "chain state");
            }
        }
        Ok(())
    }

    /// Copies the blocks at or after `from_index`. Empty when `from_index` is past the tip.
    pub fn snapshot(&self, from_index: u64) -> Vec<Block> {
        usize::try_from(from_index)
            .ok()
            .and_then(|start| self.blocks.get(start..))
            .map(<[Block]>::to_vec)
            .unwrap_or_default()
    }

    pub fn last_block(&self) -> Result<&Block, ChainError> {
        self.blocks.last().ok_or(ChainError::EmptyChain)
    }

    pub fn get(&self, index: u64) -> Option<&Block> {
        usize::try_from(index).ok().and_then(|i| self.blocks.get(i))
    }
}
