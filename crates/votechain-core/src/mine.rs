use crate::{base_text, constants::RANDOM_DATA_LEN, digest_hex, pow, Block, GENESIS_PREV_HASH};
use rand::{distributions::Alphanumeric, Rng};
use rayon::prelude::*;
use serde::Deserialize;
use tracing::{debug, info};

/// How the nonce space is walked.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchStrategy {
    /// Nonces 1, 2, 3, ... on the calling thread; the first hit wins.
    #[default]
    Sequential,
    /// Work-stealing search across the rayon pool; any hit wins.
    Parallel,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MineOutcome {
    Mined(Block),
    /// The cancellation predicate fired before a nonce was found.
    Cancelled,
    /// Every nonce was tried without success.
    Exhausted,
}

enum Step {
    Found(u64, String),
    Cancelled,
}

/// Proof-of-work search for a fixed difficulty.
#[derive(Clone, Copy, Debug)]
pub struct Miner {
    difficulty: usize,
    strategy: SearchStrategy,
}

impl Miner {
    pub fn new(difficulty: usize) -> Self {
        Self {
            difficulty,
            strategy: SearchStrategy::default(),
        }
    }

    pub fn with_strategy(mut self, strategy: SearchStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    pub fn strategy(&self) -> SearchStrategy {
        self.strategy
    }

    /// Searches for a nonce that seals `index ∥ previous_hash ∥ data`.
    ///
    /// `cancel` is polled before every hash attempt; once it returns true the
    /// search stops and [`MineOutcome::Cancelled`] is returned.
    pub fn mine<F>(&self, index: u64, previous_hash: &str, data: String, cancel: F) -> MineOutcome
    where
        F: Fn() -> bool + Sync + Send,
    {
        let base = base_text(index, previous_hash, &data);
        let step = match self.strategy {
            SearchStrategy::Sequential => search_sequential(&base, self.difficulty, &cancel),
            SearchStrategy::Parallel => search_parallel(&base, self.difficulty, &cancel),
        };

        match step {
            Some(Step::Found(nonce, hash)) => {
                info!(index, nonce, %hash, "mined block");
                MineOutcome::Mined(Block::sealed(
                    index,
                    previous_hash.to_string(),
                    data,
                    nonce,
                    hash,
                ))
            }
            Some(Step::Cancelled) => {
                debug!(index, "mining cancelled");
                MineOutcome::Cancelled
            }
            None => MineOutcome::Exhausted,
        }
    }

    /// Mines the successor of `prev` with a fresh random payload.
    pub fn mine_next<F>(&self, prev: &Block, cancel: F) -> MineOutcome
    where
        F: Fn() -> bool + Sync + Send,
    {
        match prev.index().checked_add(1) {
            Some(index) => self.mine(index, prev.hash(), random_data(), cancel),
            None => MineOutcome::Exhausted,
        }
    }

    /// Mines block 0 on top of the genesis sentinel. Runs to completion.
    pub fn mine_genesis(&self) -> MineOutcome {
        self.mine(0, GENESIS_PREV_HASH, random_data(), || false)
    }
}

fn search_sequential<F>(base: &str, difficulty: usize, cancel: &F) -> Option<Step>
where
    F: Fn() -> bool,
{
    for nonce in 1u64..u64::MAX {
        if cancel() {
            return Some(Step::Cancelled);
        }
        let hash = digest_hex(&format!("{base}{nonce}"));
        if pow::meets_difficulty(&hash, difficulty) {
            return Some(Step::Found(nonce, hash));
        }
    }
    None
}

fn search_parallel<F>(base: &str, difficulty: usize, cancel: &F) -> Option<Step>
where
    F: Fn() -> bool + Sync + Send,
{
    // Rayon splits the range across threads; each attempt still polls `cancel`.
    (1u64..u64::MAX).into_par_iter().find_map_any(|nonce| {
        if cancel() {
            return Some(Step::Cancelled);
        }
        let hash = digest_hex(&format!("{base}{nonce}"));
        pow::meets_difficulty(&hash, difficulty).then(|| Step::Found(nonce, hash))
    })
}

/// Random alphabetic filler used as block payload.
pub fn random_data() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .map(char::from)
        .filter(char::is_ascii_alphabetic)
        .take(RANDOM_DATA_LEN)
        .collect()
}
