pub mod api;
pub mod config;
pub mod consensus;
pub mod constants;
pub mod error;
pub mod peer;
pub mod service;
pub mod wire;

pub use config::{NodeConfig, Peer, StartupMode};
pub use consensus::{ConsensusLoop, RoundOutcome};
pub use error::{NodeError, PeerError};
pub use peer::{HttpPeers, PeerNetwork};
pub use service::ChainService;

use tokio::sync::watch;

/// Resolves once `shutdown` holds `true` or its sender is gone.
pub async fn wait_for_shutdown(mut shutdown: watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
