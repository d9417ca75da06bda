#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;
use votechain_core::{Block, BlockOutcome, ChainStore, MineOutcome, Miner, PeerResponse};
use votechain_node::constants::UNREACHABLE_LENGTH;
use votechain_node::{ChainService, ConsensusLoop, PeerError, PeerNetwork};

pub const DIFFICULTY: usize = 2;

pub fn miner() -> Miner {
    Miner::new(DIFFICULTY)
}

pub fn mine_genesis() -> Block {
    match miner().mine_genesis() {
        MineOutcome::Mined(block) => block,
        other => panic!("genesis not mined: {other:?}"),
    }
}

pub fn mine_on(prev: &Block) -> Block {
    match miner().mine_next(prev, || false) {
        MineOutcome::Mined(block) => block,
        other => panic!("block {} not mined: {other:?}", prev.index() + 1),
    }
}

/// A valid chain of `len` blocks starting at genesis.
pub fn mined_chain(len: usize) -> Vec<Block> {
    let mut blocks = vec![mine_genesis()];
    while blocks.len() < len {
        let next = mine_on(blocks.last().expect("chain is never empty"));
        blocks.push(next);
    }
    blocks
}

pub fn service_with(blocks: &[Block]) -> Arc<ChainService> {
    let service = ChainService::new(ChainStore::new(DIFFICULTY));
    assert_eq!(service.append_all(blocks.to_vec()), blocks.len());
    Arc::new(service)
}

/// A consensus loop with no pause between rounds, plus the sender that stops it.
pub fn consensus(
    chain: Arc<ChainService>,
    peers: Arc<dyn PeerNetwork>,
) -> (ConsensusLoop, watch::Sender<bool>) {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let consensus = ConsensusLoop::new(chain, peers, miner(), 0..=0, shutdown_rx);
    (consensus, shutdown_tx)
}

type BroadcastHook = Box<dyn Fn(&Block) + Send + Sync>;

/// Scripted cluster: fixed votes for every broadcast, fixed chains per peer,
/// and a record of every call made.
#[derive(Default)]
pub struct FakePeers {
    votes: Vec<BlockOutcome>,
    heartbeats: BTreeMap<String, i64>,
    chains: BTreeMap<String, Vec<Block>>,
    on_broadcast: Option<BroadcastHook>,
    pub broadcasts: Mutex<Vec<Block>>,
    pub fetches: Mutex<Vec<(String, u64)>>,
}

impl FakePeers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn voting(mut self, votes: &[BlockOutcome]) -> Self {
        self.votes = votes.to_vec();
        self
    }

    pub fn holding(mut self, peer: &str, chain: &[Block]) -> Self {
        self.heartbeats.insert(peer.to_string(), chain.len() as i64);
        self.chains.insert(peer.to_string(), chain.to_vec());
        self
    }

    pub fn unreachable(mut self, peer: &str) -> Self {
        self.heartbeats.insert(peer.to_string(), UNREACHABLE_LENGTH);
        self
    }

    /// Reports `length` on heartbeat but fails every chain fetch.
    pub fn failing_fetch(mut self, peer: &str, length: i64) -> Self {
        self.heartbeats.insert(peer.to_string(), length);
        self
    }

    pub fn on_broadcast(mut self, hook: impl Fn(&Block) + Send + Sync + 'static) -> Self {
        self.on_broadcast = Some(Box::new(hook));
        self
    }

    pub fn broadcast_count(&self) -> usize {
        self.broadcasts.lock().len()
    }

    pub fn fetched(&self) -> Vec<(String, u64)> {
        self.fetches.lock().clone()
    }
}

#[async_trait]
impl PeerNetwork for FakePeers {
    async fn broadcast_block(&self, block: &Block) -> Vec<PeerResponse> {
        self.broadcasts.lock().push(block.clone());
        if let Some(hook) = &self.on_broadcast {
            hook(block);
        }
        self.votes
            .iter()
            .enumerate()
            .map(|(i, outcome)| PeerResponse::new(format!("peer_{i}"), *outcome, None))
            .collect()
    }

    async fn fetch_heartbeats(&self) -> BTreeMap<String, i64> {
        self.heartbeats.clone()
    }

    async fn fetch_chain(&self, peer: &str, from_index: u64) -> Result<Vec<Block>, PeerError> {
        self.fetches.lock().push((peer.to_string(), from_index));
        match self.chains.get(peer) {
            Some(chain) => Ok(chain
                .iter()
                .filter(|block| block.index() >= from_index)
                .cloned()
                .collect()),
            None => Err(PeerError::Status {
                peer: peer.to_string(),
                status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
            }),
        }
    }
}
