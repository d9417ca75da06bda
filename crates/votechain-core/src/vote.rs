//! Vote counting over one broadcast round.
//!
//! Every peer answers a broadcast block with [`BlockOutcome::Accepted`] or
//! [`BlockOutcome::Rejected`]; peers that could not be reached are recorded as
//! [`BlockOutcome::Failed`] and carry no vote. The round is decided over the
//! remaining responders:
//!
//! * nobody responded: commit (the node is alone, or every peer is down);
//! * every responder rejected: the local chain has diverged, resync;
//! * `accepted >= ceil(responders / 2)`: commit;
//! * anything else is inconclusive and leaves the chain untouched.

use crate::Block;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockOutcome {
    Accepted,
    Rejected,
    Failed,
}

/// One peer's answer to a broadcast block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerResponse {
    pub peer: String,
    pub outcome: BlockOutcome,
    /// The peer's own last block, sent back alongside a rejection.
    pub block: Option<Block>,
}

impl PeerResponse {
    pub fn new(peer: impl Into<String>, outcome: BlockOutcome, block: Option<Block>) -> Self {
        Self {
            peer: peer.into(),
            outcome,
            block,
        }
    }

    pub fn failed(peer: impl Into<String>) -> Self {
        Self::new(peer, BlockOutcome::Failed, None)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Commit,
    Resync,
    Inconclusive,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Tally {
    pub accepted: usize,
    pub rejected: usize,
    pub failed: usize,
}

impl Tally {
    pub fn from_outcomes<I>(outcomes: I) -> Self
    where
        I: IntoIterator<Item = BlockOutcome>,
    {
        outcomes
            .into_iter()
            .fold(Self::default(), |mut tally, outcome| {
                match outcome {
                    BlockOutcome::Accepted => tally.accepted += 1,
                    BlockOutcome::Rejected => tally.rejected += 1,
                    BlockOutcome::Failed => tally.failed += 1,
                }
                tally
            })
    }

    pub fn from_responses(responses: &[PeerResponse]) -> Self {
        Self::from_outcomes(responses.iter().map(|r| r.outcome))
    }

    /// Peers that gave an actual answer.
    pub fn responders(&self) -> usize {
        self.accepted + self.rejected
    }

    pub fn has_majority(&self) -> bool {
        self.accepted >= self.responders().div_ceil(2)
    }

    pub fn decide(&self) -> Decision {
        let responders = self.responders();
        if responders == 0 {
            Decision::Commit
        } else if self.rejected == responders {
            Decision::Resync
        } else if self.has_majority() {
            Decision::Commit
        } else {
            Decision::Inconclusive
        }
    }
}
