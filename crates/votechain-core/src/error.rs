use thiserror::Error;

/// Reasons a chain store refuses a block or reports itself broken.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("chain is not valid in transition from block [{prev_index}] to block [{index}]")]
    ChainBroken { prev_index: u64, index: u64 },
    #[error("block [{index}] carries a hash that does not match its contents or difficulty")]
    InvalidProof { index: u64 },
    #[error("first block must have index 0 and the genesis previous hash")]
    InvalidGenesis,
    #[error("chain is empty")]
    EmptyChain,
}
