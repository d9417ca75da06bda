use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

pub mod chain;
pub mod constants;
pub mod error;
pub mod mine;
pub mod vote;

pub use chain::ChainStore;
pub use constants::GENESIS_PREV_HASH;
pub use error::ChainError;
pub use mine::{MineOutcome, Miner, SearchStrategy};
pub use vote::{BlockOutcome, Decision, PeerResponse, Tally};

/// A sealed block. Fields are only readable; a block never changes after it is built.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    index: u64,
    previous_hash: String,
    data: String,
    nonce: u64,
    hash: String,
    /// Milliseconds since the unix epoch. Informational, never hashed.
    timestamp: u64,
}

impl Block {
    /// Builds a block from already-known parts, e.g. one received from a peer.
    /// Nothing is checked here; the chain store decides whether it is acceptable.
    pub fn from_parts(
        index: u64,
        previous_hash: impl Into<String>,
        data: impl Into<String>,
        nonce: u64,
        hash: impl Into<String>,
        timestamp: u64,
    ) -> Self {
        Self {
            index,
            previous_hash: previous_hash.into(),
            data: data.into(),
            nonce,
            hash: hash.into(),
            timestamp,
        }
    }

    pub(crate) fn sealed(
        index: u64,
        previous_hash: String,
        data: String,
        nonce: u64,
        hash: String,
    ) -> Self {
        Self {
            index,
            previous_hash,
            data,
            nonce,
            hash,
            timestamp: now_millis(),
        }
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn previous_hash(&self) -> &str {
        &self.previous_hash
    }

    pub fn data(&self) -> &str {
        &self.data
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0 && self.previous_hash == GENESIS_PREV_HASH
    }

    /// Recomputes the digest of this block's stated fields.
    pub fn compute_hash(&self) -> String {
        block_hash(self.index, &self.previous_hash, &self.data, self.nonce)
    }

    /// True when the stated hash is the digest of the block's own fields and
    /// ends in `difficulty` zero hex digits.
    pub fn has_valid_proof(&self, difficulty: usize) -> bool {
        pow::meets_difficulty(&self.hash, difficulty) && self.hash == self.compute_hash()
    }

    /// True when `self` directly follows `prev`.
    pub fn follows(&self, prev: &Block) -> bool {
        prev.index.checked_add(1) == Some(self.index) && self.previous_hash == prev.hash
    }
}

/// The fixed part of the mining input: `index ∥ previous_hash ∥ data`.
pub fn base_text(index: u64, previous_hash: &str, data: &str) -> String {
    format!("{index}{previous_hash}{data}")
}

/// Lowercase hex SHA-256 of `text`.
pub fn digest_hex(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

pub fn block_hash(index: u64, previous_hash: &str, data: &str, nonce: u64) -> String {
    digest_hex(&format!("{}{nonce}", base_text(index, previous_hash, data)))
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

pub mod pow {
    /// Difficulty predicate: the last `difficulty` hex characters are all `0`.
    pub fn meets_difficulty(hash: &str, difficulty: usize) -> bool {
        hash.len() >= difficulty && hash.bytes().rev().take(difficulty).all(|b| b == b'0')
    }

    pub fn count_trailing_zero_digits(hash: &str) -> usize {
        hash.bytes().rev().take_while(|b| *b == b'0').count()
    }
}
