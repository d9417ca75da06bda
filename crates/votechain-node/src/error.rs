use thiserror::Error;

/// Failures talking to a single peer. Never fatal: callers downgrade them to
/// a `FAILED` outcome, an unreachable heartbeat or an empty chain.
#[derive(Error, Debug)]
pub enum PeerError {
    #[error("request to {peer} failed: {source}")]
    Request {
        peer: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{peer} answered with status {status}")]
    Status {
        peer: String,
        status: reqwest::StatusCode,
    },
}

/// Startup and runtime failures of the node process.
#[derive(Error, Debug)]
pub enum NodeError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("node `{0}` is not listed in the cluster table")]
    UnknownNode(String),
    #[error("invalid address `{addr}` for node `{node}`")]
    InvalidAddress { node: String, addr: String },
    #[error("genesis block could not be mined")]
    GenesisNotMined,
    #[error("mining task failed: {0}")]
    MinerTask(#[from] tokio::task::JoinError),
    #[error(transparent)]
    Chain(#[from] votechain_core::ChainError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
