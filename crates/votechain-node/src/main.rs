use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;
use votechain_node::{
    api, ChainService, ConsensusLoop, HttpPeers, NodeConfig, PeerNetwork, StartupMode,
};

#[derive(Parser, Debug)]
#[command(name = "votechain-node", about = "Run one peer of a votechain cluster")]
struct Args {
    /// Cluster file listing every node
    #[arg(long, default_value = "cluster.toml")]
    config: PathBuf,

    /// This node's entry in the cluster file, e.g. node_0
    #[arg(long)]
    name: String,

    /// Mine the genesis block locally instead of pulling the chain from peers
    #[arg(long)]
    genesis: bool,

    /// Listen address, overriding the cluster file entry
    #[arg(long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let startup = if args.genesis {
        StartupMode::Genesis
    } else {
        StartupMode::FromCluster
    };
    let mut config = NodeConfig::load(&args.config, &args.name, startup)?;
    if let Some(listen) = args.listen {
        config.listen = listen;
        config.validate()?;
    }
    info!(
        node = %config.name,
        peers = config.peers.len(),
        difficulty = config.difficulty,
        ?startup,
        "starting node"
    );

    let listener = TcpListener::bind(&config.listen).await?;
    let peers: Arc<dyn PeerNetwork> =
        Arc::new(HttpPeers::new(config.peers.clone(), config.peer_timeout)?);
    let chain = Arc::new(ChainService::bootstrap(&config, peers.as_ref()).await?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let consensus = ConsensusLoop::from_config(
        &config,
        Arc::clone(&chain),
        Arc::clone(&peers),
        shutdown_rx.clone(),
    );
    let consensus = tokio::spawn(consensus.run());

    info!("votechain-node listening on http://{}", config.listen);
    let server = tokio::spawn(api::serve(listener, Arc::clone(&chain), shutdown_rx));

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    shutdown_tx.send_replace(true);

    server.await??;
    consensus.await?;
    info!(length = chain.heartbeat(), "node stopped");
    Ok(())
}
