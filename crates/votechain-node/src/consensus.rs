//! The mine, broadcast, vote and commit cycle.

use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use votechain_core::{Block, Decision, MineOutcome, Miner, Tally};

use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::peer::PeerNetwork;
use crate::service::ChainService;
use crate::wait_for_shutdown;

/// What a single round did to the local chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOutcome {
    /// The chain was empty; a resync from index 0 appended this many blocks.
    Idle { appended: usize },
    /// Mining stopped early for an inbound block or shutdown.
    Cancelled,
    /// The candidate at this index won the vote and was appended.
    Committed(u64),
    /// The candidate won the vote but the slot had been taken meanwhile.
    Discarded(u64),
    /// Every responder rejected the candidate; the tail from `from` was pulled.
    Resynced { from: u64, appended: usize },
    /// Not enough accepts; nothing changed.
    Inconclusive,
}

pub struct ConsensusLoop {
    chain: Arc<ChainService>,
    peers: Arc<dyn PeerNetwork>,
    miner: Miner,
    delay_ms: RangeInclusive<u64>,
    shutdown: watch::Receiver<bool>,
}

impl ConsensusLoop {
    pub fn new(
        chain: Arc<ChainService>,
        peers: Arc<dyn PeerNetwork>,
        miner: Miner,
        delay_ms: RangeInclusive<u64>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            chain,
            peers,
            miner,
            delay_ms,
            shutdown,
        }
    }

    pub fn from_config(
        config: &NodeConfig,
        chain: Arc<ChainService>,
        peers: Arc<dyn PeerNetwork>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let miner = Miner::new(config.difficulty).with_strategy(config.mining.strategy);
        Self::new(chain, peers, miner, config.delay_range(), shutdown)
    }

    fn shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Runs rounds until shutdown is signalled. A failed round is logged and
    /// the loop carries on.
    pub async fn run(self) {
        info!(difficulty = self.miner.difficulty(), "consensus loop started");
        while self.pause().await {
            match self.run_round().await {
                Ok(outcome) => debug!(?outcome, length = self.chain.heartbeat(), "round finished"),
                Err(err) => error!(%err, "round failed"),
            }
            if self.shutting_down() {
                break;
            }
        }
        info!("consensus loop stopped");
    }

    /// Sleeps a random delay from the configured range. False on shutdown.
    async fn pause(&self) -> bool {
        let delay = Duration::from_millis(rand::thread_rng().gen_range(self.delay_ms.clone()));
        tokio::select! {
            _ = tokio::time::sleep(delay) => !self.shutting_down(),
            _ = wait_for_shutdown(self.shutdown.clone()) => false,
        }
    }

    /// One round: mine on top of the local tip, put the candidate to a vote
    /// and act on the verdict.
    ///
    /// The chain lock is only held to read the tip and to append; mining and
    /// broadcasting run without it so inbound blocks are never blocked.
    pub async fn run_round(&self) -> Result<RoundOutcome, NodeError> {
        let Some(tip) = self.chain.last_block() else {
            let appended = self.chain.resync_from_cluster(self.peers.as_ref(), 0).await;
            return Ok(RoundOutcome::Idle { appended });
        };

        let candidate = match self.mine_on(tip).await? {
            MineOutcome::Mined(block) => block,
            MineOutcome::Cancelled => {
                info!(
                    in_flight = self.chain.inbound_in_flight(),
                    "mining interrupted"
                );
                return Ok(RoundOutcome::Cancelled);
            }
            MineOutcome::Exhausted => {
                warn!("nonce space exhausted without a proof");
                return Ok(RoundOutcome::Cancelled);
            }
        };

        let index = candidate.index();
        info!(index, hash = %candidate.hash(), nonce = candidate.nonce(), "mined candidate block");

        let responses = self.peers.broadcast_block(&candidate).await;
        let tally = Tally::from_responses(&responses);
        info!(
            index,
            accepted = tally.accepted,
            rejected = tally.rejected,
            failed = tally.failed,
            "votes counted"
        );

        let outcome = match tally.decide() {
            Decision::Commit => match self.chain.commit(candidate) {
                Ok(()) => {
                    info!(index, length = self.chain.heartbeat(), "committed block");
                    RoundOutcome::Committed(index)
                }
                Err(err) => {
                    warn!(index, %err, "slot taken while voting, candidate discarded");
                    RoundOutcome::Discarded(index)
                }
            },
            Decision::Resync => {
                let appended = self
                    .chain
                    .resync_from_cluster(self.peers.as_ref(), index)
                    .await;
                RoundOutcome::Resynced {
                    from: index,
                    appended,
                }
            }
            Decision::Inconclusive => {
                info!(index, "no majority, candidate dropped");
                RoundOutcome::Inconclusive
            }
        };
        Ok(outcome)
    }

    /// Mines the successor of `tip` on the blocking pool. The search yields as
    /// soon as an inbound block is in flight or shutdown is signalled.
    async fn mine_on(&self, tip: Block) -> Result<MineOutcome, NodeError> {
        let miner = self.miner;
        let chain = Arc::clone(&self.chain);
        let shutdown = self.shutdown.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            miner.mine_next(&tip, || chain.inbound_in_flight() > 0 || *shutdown.borrow())
        })
        .await?;
        Ok(outcome)
    }
}
