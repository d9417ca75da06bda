use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use votechain_core::{Block, PeerResponse};

use crate::config::Peer;
use crate::constants::UNREACHABLE_LENGTH;
use crate::error::PeerError;
use crate::wire::{
    ChainResponse, HeartbeatResponse, SubmitBlockResponse, BLOCKS_PATH, CHAIN_PATH,
    HEARTBEAT_PATH,
};

/// Outbound calls the consensus loop makes to the rest of the cluster.
///
/// Implementations isolate failures per peer: one unreachable peer must never
/// prevent the others from being asked.
#[async_trait]
pub trait PeerNetwork: Send + Sync {
    /// Offers `block` to every peer once; unreachable peers come back as `FAILED`.
    async fn broadcast_block(&self, block: &Block) -> Vec<PeerResponse>;

    /// Chain length per peer, [`UNREACHABLE_LENGTH`] for peers that did not answer.
    async fn fetch_heartbeats(&self) -> BTreeMap<String, i64>;

    async fn fetch_chain(&self, peer: &str, from_index: u64) -> Result<Vec<Block>, PeerError>;

    /// The chain tail from `from_index` held by the peer reporting the longest
    /// chain. Empty when no peer has a chain or that peer cannot be reached.
    async fn fetch_best_chain(&self, from_index: u64) -> Vec<Block> {
        let heartbeats = self.fetch_heartbeats().await;
        let Some(peer) = best_peer(&heartbeats) else {
            info!("no peer reported a chain");
            return Vec::new();
        };
        match self.fetch_chain(&peer, from_index).await {
            Ok(blocks) => blocks,
            Err(err) => {
                warn!(%peer, %err, "failed to fetch chain");
                Vec::new()
            }
        }
    }
}

/// Peer with the greatest positive chain length.
pub fn best_peer(heartbeats: &BTreeMap<String, i64>) -> Option<String> {
    heartbeats
        .iter()
        .filter(|(_, length)| **length > 0)
        .max_by_key(|(_, length)| **length)
        .map(|(peer, _)| peer.clone())
}

/// [`PeerNetwork`] over the HTTP API of the other nodes.
#[derive(Clone, Debug)]
pub struct HttpPeers {
    client: reqwest::Client,
    peers: Vec<Peer>,
}

impl HttpPeers {
    pub fn new(peers: Vec<Peer>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        for peer in &peers {
            info!(name = %peer.name, addr = %peer.addr, "added node to cluster");
        }
        Ok(Self { client, peers })
    }

    pub fn peers(&self) -> &[Peer] {
        &self.peers
    }
}

fn url(addr: &str, path: &str) -> String {
    format!("http://{addr}{path}")
}

fn request_error(peer: &str) -> impl FnOnce(reqwest::Error) -> PeerError + '_ {
    move |source| PeerError::Request {
        peer: peer.to_string(),
        source,
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(
    peer: &str,
    response: reqwest::Response,
) -> Result<T, PeerError> {
    let status = response.status();
    if !status.is_success() {
        return Err(PeerError::Status {
            peer: peer.to_string(),
            status,
        });
    }
    response.json().await.map_err(request_error(peer))
}

async fn submit_block(
    client: &reqwest::Client,
    peer: &str,
    block: &Block,
) -> Result<SubmitBlockResponse, PeerError> {
    let response = client
        .post(url(peer, BLOCKS_PATH))
        .json(block)
        .send()
        .await
        .map_err(request_error(peer))?;
    read_json(peer, response).await
}

async fn heartbeat(client: &reqwest::Client, peer: &str) -> Result<u64, PeerError> {
    let response = client
        .get(url(peer, HEARTBEAT_PATH))
        .send()
        .await
        .map_err(request_error(peer))?;
    let body: HeartbeatResponse = read_json(peer, response).await?;
    Ok(body.chain_length)
}

#[async_trait]
impl PeerNetwork for HttpPeers {
    async fn broadcast_block(&self, block: &Block) -> Vec<PeerResponse> {
        let mut tasks = JoinSet::new();
        for peer in &self.peers {
            let client = self.client.clone();
            let addr = peer.addr.clone();
            let block = block.clone();
            tasks.spawn(async move {
                debug!(index = block.index(), peer = %addr, "sending block");
                match submit_block(&client, &addr, &block).await {
                    Ok(body) => PeerResponse::new(addr, body.code, body.block),
                    Err(err) => {
                        warn!(index = block.index(), %err, "failed to send block");
                        PeerResponse::failed(addr)
                    }
                }
            });
        }

        let mut responses = Vec::with_capacity(self.peers.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(response) => responses.push(response),
                Err(err) => warn!(%err, "broadcast task aborted"),
            }
        }
        responses
    }

    async fn fetch_heartbeats(&self) -> BTreeMap<String, i64> {
        let mut tasks = JoinSet::new();
        for peer in &self.peers {
            let client = self.client.clone();
            let addr = peer.addr.clone();
            tasks.spawn(async move {
                let length = match heartbeat(&client, &addr).await {
                    Ok(length) => i64::try_from(length).unwrap_or(i64::MAX),
                    Err(err) => {
                        debug!(%err, "heartbeat failed");
                        UNREACHABLE_LENGTH
                    }
                };
                (addr, length)
            });
        }

        let mut heartbeats = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((addr, length)) => {
                    heartbeats.insert(addr, length);
                }
                Err(err) => warn!(%err, "heartbeat task aborted"),
            }
        }
        heartbeats
    }

    async fn fetch_chain(&self, peer: &str, from_index: u64) -> Result<Vec<Block>, PeerError> {
        debug!(%peer, from_index, "fetching chain");
        let response = self
            .client
            .get(url(peer, CHAIN_PATH))
            .query(&[("from", from_index)])
            .send()
            .await
            .map_err(request_error(peer))?;
        let body: ChainResponse = read_json(peer, response).await?;
        Ok(body.blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heartbeats(entries: &[(&str, i64)]) -> BTreeMap<String, i64> {
        entries.iter().map(|(p, l)| (p.to_string(), *l)).collect()
    }

    #[test]
    fn best_peer_picks_longest_chain() {
        let hb = heartbeats(&[("a:1", 3), ("b:1", 7), ("c:1", UNREACHABLE_LENGTH)]);
        assert_eq!(best_peer(&hb).as_deref(), Some("b:1"));
    }

    #[test]
    fn best_peer_ignores_empty_and_unreachable() {
        let hb = heartbeats(&[("a:1", 0), ("b:1", UNREACHABLE_LENGTH)]);
        assert_eq!(best_peer(&hb), None);
        assert_eq!(best_peer(&BTreeMap::new()), None);
    }

    #[test]
    fn urls() {
        assert_eq!(url("127.0.0.1:8000", BLOCKS_PATH), "http://127.0.0.1:8000/blocks");
    }
}
