use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, info, warn};
use votechain_core::{Block, BlockOutcome, ChainError, ChainStore, MineOutcome, Miner};

use crate::config::{NodeConfig, StartupMode};
use crate::error::NodeError;
use crate::peer::PeerNetwork;

/// The local chain shared by the consensus loop and the inbound handler.
///
/// Every mutation goes through one fair mutex so blocked callers are served
/// in arrival order. The chain length is mirrored into an atomic so the
/// heartbeat and the stale-index check never wait on the lock.
#[derive(Debug)]
pub struct ChainService {
    store: Mutex<ChainStore>,
    length: AtomicU64,
    inbound: AtomicUsize,
}

/// Marks one inbound block as in flight until dropped.
#[derive(Debug)]
pub struct InboundGuard<'a> {
    counter: &'a AtomicUsize,
}

impl<'a> InboundGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self { counter }
    }
}

impl Drop for InboundGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::AcqRel);
    }
}

impl ChainService {
    pub fn new(store: ChainStore) -> Self {
        let length = store.len() as u64;
        Self {
            store: Mutex::new(store),
            length: AtomicU64::new(length),
            inbound: AtomicUsize::new(0),
        }
    }

    /// Seeds the chain according to `config.startup`: mines a genesis block,
    /// or pulls the whole chain from the best peer.
    pub async fn bootstrap(config: &NodeConfig, peers: &dyn PeerNetwork) -> Result<Self, NodeError> {
        match config.startup {
            StartupMode::Genesis => {
                let miner = Miner::new(config.difficulty).with_strategy(config.mining.strategy);
                let outcome = tokio::task::spawn_blocking(move || miner.mine_genesis()).await?;
                let MineOutcome::Mined(genesis) = outcome else {
                    return Err(NodeError::GenesisNotMined);
                };
                info!(hash = %genesis.hash(), nonce = genesis.nonce(), "genesis block mined");
                Ok(Self::new(ChainStore::with_genesis(genesis, config.difficulty)?))
            }
            StartupMode::FromCluster => {
                let service = Self::new(ChainStore::new(config.difficulty));
                let appended = service.resync_from_cluster(peers, 0).await;
                info!(appended, "initial chain loaded from cluster");
                Ok(service)
            }
        }
    }

    /// Runs `f` with the store locked, then refreshes the length mirror and
    /// hands the lock to the next waiter.
    fn with_store<R>(&self, f: impl FnOnce(&mut ChainStore) -> R) -> R {
        let mut store = self.store.lock();
        let result = f(&mut store);
        self.length.store(store.len() as u64, Ordering::Release);
        MutexGuard::unlock_fair(store);
        result
    }

    /// Current chain length, read without taking the lock.
    pub fn heartbeat(&self) -> u64 {
        self.length.load(Ordering::Acquire)
    }

    pub fn chain_from(&self, from_index: u64) -> Vec<Block> {
        self.with_store(|store| store.snapshot(from_index))
    }

    pub fn last_block(&self) -> Option<Block> {
        self.with_store(|store| store.last_block().ok().cloned())
    }

    /// Number of inbound blocks currently being applied.
    pub fn inbound_in_flight(&self) -> usize {
        self.inbound.load(Ordering::Acquire)
    }

    pub fn begin_inbound(&self) -> InboundGuard<'_> {
        InboundGuard::enter(&self.inbound)
    }

    /// Whether the local index `index` is already taken.
    fn covers(&self, index: u64) -> bool {
        index < self.heartbeat()
    }

    /// Decides a block offered by a peer.
    ///
    /// A block for an index the chain already covers is rejected without
    /// looking at it. Otherwise it is appended under the lock and accepted only
    /// if the chain still validates.
    pub fn on_peer_block(&self, block: Block) -> BlockOutcome {
        let index = block.index();
        if self.covers(index) {
            info!(index, length = self.heartbeat(), "block already mined, rejected");
            return BlockOutcome::Rejected;
        }

        let _inbound = self.begin_inbound();
        match self.with_store(|store| store.append(block)) {
            Ok(()) => {
                info!(index, "accepted block from peer");
                BlockOutcome::Accepted
            }
            Err(err) => {
                warn!(index, %err, "rejected block from peer");
                BlockOutcome::Rejected
            }
        }
    }

    /// Appends a block this node mined and the cluster voted for.
    pub fn commit(&self, block: Block) -> Result<(), ChainError> {
        self.with_store(|store| store.append(block))
    }

    /// Appends `blocks` in order under a single lock, skipping any that do not
    /// extend the chain. Returns how many were appended.
    pub fn append_all(&self, blocks: Vec<Block>) -> usize {
        self.with_store(|store| {
            let mut appended = 0;
            for block in blocks {
                let index = block.index();
                match store.append(block) {
                    Ok(()) => appended += 1,
                    Err(err) => debug!(index, %err, "skipped block during resync"),
                }
            }
            appended
        })
    }

    /// Pulls the chain tail from `from_index` off the peer with the longest
    /// chain and appends what fits. A failed or empty fetch changes nothing.
    pub async fn resync_from_cluster(&self, peers: &dyn PeerNetwork, from_index: u64) -> usize {
        let blocks = peers.fetch_best_chain(from_index).await;
        if blocks.is_empty() {
            debug!(from_index, "nothing to resync");
            return 0;
        }
        let fetched = blocks.len();
        let appended = self.append_all(blocks);
        info!(from_index, fetched, appended, length = self.heartbeat(), "resynced chain");
        appended
    }
}
