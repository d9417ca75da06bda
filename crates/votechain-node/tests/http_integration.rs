mod helpers;

use std::sync::Arc;
use std::time::Duration;

use helpers::{mine_on, mined_chain, service_with};
use tokio::net::TcpListener;
use tokio::sync::watch;
use votechain_core::BlockOutcome;
use votechain_node::constants::UNREACHABLE_LENGTH;
use votechain_node::wire::{Health, HeartbeatResponse, SubmitBlockResponse};
use votechain_node::{api, ChainService, HttpPeers, Peer, PeerNetwork};

struct Node {
    addr: String,
    chain: Arc<ChainService>,
    shutdown: watch::Sender<bool>,
    server: tokio::task::JoinHandle<std::io::Result<()>>,
}

impl Node {
    async fn start(chain: Arc<ChainService>) -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?.to_string();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let server = tokio::spawn(api::serve(listener, Arc::clone(&chain), shutdown_rx));
        Ok(Self {
            addr,
            chain,
            shutdown,
            server,
        })
    }

    fn peer(&self, name: &str) -> Peer {
        Peer {
            name: name.to_string(),
            addr: self.addr.clone(),
        }
    }

    async fn stop(self) -> anyhow::Result<()> {
        self.shutdown.send_replace(true);
        self.server.await??;
        Ok(())
    }
}

/// An address nothing listens on.
async fn dead_peer() -> anyhow::Result<Peer> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?.to_string();
    drop(listener);
    Ok(Peer {
        name: "dead".to_string(),
        addr,
    })
}

fn client(peers: Vec<Peer>) -> anyhow::Result<HttpPeers> {
    Ok(HttpPeers::new(peers, Duration::from_millis(500))?)
}

#[tokio::test]
async fn broadcast_is_decided_by_the_remote_chain() -> anyhow::Result<()> {
    let blocks = mined_chain(1);
    let node = Node::start(service_with(&blocks)).await?;
    let peers = client(vec![node.peer("node_0")])?;

    let next = mine_on(&blocks[0]);
    let responses = peers.broadcast_block(&next).await;
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].peer, node.addr);
    assert_eq!(responses[0].outcome, BlockOutcome::Accepted);
    assert!(responses[0].block.is_none());
    assert_eq!(node.chain.heartbeat(), 2);

    // same index again: rejected, and the peer echoes its own tip
    let rival = mine_on(&blocks[0]);
    let responses = peers.broadcast_block(&rival).await;
    assert_eq!(responses[0].outcome, BlockOutcome::Rejected);
    assert_eq!(responses[0].block.as_ref(), Some(&next));

    node.stop().await
}

#[tokio::test]
async fn unreachable_peers_fail_in_isolation() -> anyhow::Result<()> {
    let blocks = mined_chain(3);
    let node = Node::start(service_with(&blocks)).await?;
    let dead = dead_peer().await?;
    let peers = client(vec![node.peer("node_0"), dead.clone()])?;

    let heartbeats = peers.fetch_heartbeats().await;
    assert_eq!(heartbeats.get(&node.addr), Some(&3));
    assert_eq!(heartbeats.get(&dead.addr), Some(&UNREACHABLE_LENGTH));

    let responses = peers.broadcast_block(&mine_on(&blocks[2])).await;
    assert_eq!(responses.len(), 2);
    for response in &responses {
        let expected = if response.peer == dead.addr {
            BlockOutcome::Failed
        } else {
            BlockOutcome::Accepted
        };
        assert_eq!(response.outcome, expected);
    }

    assert!(peers.fetch_chain(&dead.addr, 0).await.is_err());
    node.stop().await
}

#[tokio::test]
async fn chain_is_pulled_from_the_longest_peer() -> anyhow::Result<()> {
    let remote = mined_chain(4);
    let long = Node::start(service_with(&remote)).await?;
    let short = Node::start(service_with(&remote[..2])).await?;
    let peers = client(vec![short.peer("node_0"), long.peer("node_1")])?;

    assert_eq!(peers.fetch_chain(&long.addr, 2).await?, remote[2..].to_vec());
    assert!(peers.fetch_chain(&long.addr, 10).await?.is_empty());

    let local = service_with(&remote[..1]);
    assert_eq!(local.resync_from_cluster(&peers, 1).await, 3);
    assert_eq!(local.chain_from(0), remote);

    short.stop().await?;
    long.stop().await
}

#[tokio::test]
async fn plain_http_endpoints() -> anyhow::Result<()> {
    let node = Node::start(service_with(&mined_chain(2))).await?;
    let http = reqwest::Client::new();

    let health: Health = http
        .get(format!("http://{}/health", node.addr))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(health.status, "ok");

    let heartbeat: HeartbeatResponse = http
        .get(format!("http://{}/heartbeat", node.addr))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(heartbeat.chain_length, 2);

    // an unknown outcome code from a peer does not parse
    let parsed = serde_json::from_str::<SubmitBlockResponse>(r#"{"code":"UNKNOWN"}"#);
    assert!(parsed.is_err());

    let status = http
        .post(format!("http://{}/blocks", node.addr))
        .header("content-type", "application/json")
        .body("{\"index\":1}")
        .send()
        .await?
        .status();
    assert!(status.is_client_error());
    assert_eq!(node.chain.heartbeat(), 2);

    node.stop().await
}
