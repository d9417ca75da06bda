//! Node configuration.
//!
//! A node is started with a cluster file shared by every member and its own
//! name in that file. The file lists all nodes; the entry matching the name is
//! the local listen address and every other entry is a peer:
//!
//! ```toml
//! difficulty = 4
//! peer_timeout_ms = 3000
//!
//! [mining]
//! min_delay_ms = 4000
//! max_delay_ms = 15000
//! strategy = "sequential"
//!
//! [nodes]
//! node_0 = "127.0.0.1:8000"
//! node_1 = "127.0.0.1:8001"
//! ```
//!
//! Any key may be overridden from the environment, e.g. `VOTECHAIN_DIFFICULTY=5`
//! or `VOTECHAIN_MINING__MAX_DELAY_MS=6000`.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;
use votechain_core::constants::{MAX_DIFFICULTY, POW_TARGET_DIFFICULTY};
use votechain_core::SearchStrategy;

use crate::constants::{
    DEFAULT_MAX_DELAY_MS, DEFAULT_MIN_DELAY_MS, DEFAULT_PEER_TIMEOUT_MS, ENV_PREFIX,
};
use crate::error::NodeError;

/// How the local chain is seeded before the consensus loop starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupMode {
    /// Mine block 0 locally.
    Genesis,
    /// Start empty and pull the whole chain from the best peer.
    FromCluster,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MiningSettings {
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub strategy: SearchStrategy,
}

impl Default for MiningSettings {
    fn default() -> Self {
        Self {
            min_delay_ms: DEFAULT_MIN_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            strategy: SearchStrategy::default(),
        }
    }
}

/// The on-disk cluster description.
#[derive(Debug, Clone, Deserialize)]
pub struct ClusterFile {
    pub nodes: BTreeMap<String, String>,
    #[serde(default = "default_difficulty")]
    pub difficulty: usize,
    #[serde(default)]
    pub mining: MiningSettings,
    #[serde(default = "default_peer_timeout_ms")]
    pub peer_timeout_ms: u64,
}

fn default_difficulty() -> usize {
    POW_TARGET_DIFFICULTY
}

fn default_peer_timeout_ms() -> u64 {
    DEFAULT_PEER_TIMEOUT_MS
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    pub name: String,
    /// `host:port`
    pub addr: String,
}

/// Resolved configuration for one node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub name: String,
    pub listen: String,
    pub peers: Vec<Peer>,
    pub difficulty: usize,
    pub mining: MiningSettings,
    pub peer_timeout: Duration,
    pub startup: StartupMode,
}

impl NodeConfig {
    /// Reads the cluster file at `path` (plus environment overrides) and
    /// resolves it for the node called `name`.
    pub fn load(path: &Path, name: &str, startup: StartupMode) -> Result<Self, NodeError> {
        let cluster: ClusterFile = Config::builder()
            .add_source(File::from(path))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Self::from_cluster(cluster, name, startup)
    }

    pub fn from_cluster(
        cluster: ClusterFile,
        name: &str,
        startup: StartupMode,
    ) -> Result<Self, NodeError> {
        // config keys may come back lowercased, so names match case-insensitively
        let listen = cluster
            .nodes
            .iter()
            .find(|(node, _)| node.eq_ignore_ascii_case(name))
            .map(|(_, addr)| addr.clone())
            .ok_or_else(|| NodeError::UnknownNode(name.to_string()))?;

        let peers = cluster
            .nodes
            .into_iter()
            .filter(|(peer_name, _)| !peer_name.eq_ignore_ascii_case(name))
            .map(|(name, addr)| Peer { name, addr })
            .collect();

        let config = Self {
            name: name.to_string(),
            listen,
            peers,
            difficulty: cluster.difficulty,
            mining: cluster.mining,
            peer_timeout: Duration::from_millis(cluster.peer_timeout_ms),
            startup,
        };
        config.validate()?;
        Ok(config)
    }

    /// A node with no peers, mining its own genesis.
    pub fn standalone(name: &str, listen: &str, difficulty: usize) -> Self {
        Self {
            name: name.to_string(),
            listen: listen.to_string(),
            peers: Vec::new(),
            difficulty,
            mining: MiningSettings::default(),
            peer_timeout: Duration::from_millis(DEFAULT_PEER_TIMEOUT_MS),
            startup: StartupMode::Genesis,
        }
    }

    pub fn validate(&self) -> Result<(), NodeError> {
        if !(1..=MAX_DIFFICULTY).contains(&self.difficulty) {
            return Err(NodeError::InvalidConfig(format!(
                "difficulty must be between 1 and {MAX_DIFFICULTY}, got {}",
                self.difficulty
            )));
        }
        if self.mining.min_delay_ms > self.mining.max_delay_ms {
            return Err(NodeError::InvalidConfig(format!(
                "mining.min_delay_ms ({}) exceeds mining.max_delay_ms ({})",
                self.mining.min_delay_ms, self.mining.max_delay_ms
            )));
        }
        check_addr(&self.name, &self.listen)?;
        for peer in &self.peers {
            check_addr(&peer.name, &peer.addr)?;
        }
        Ok(())
    }

    /// Bounds, in milliseconds, of the randomized wait before each mining attempt.
    pub fn delay_range(&self) -> RangeInclusive<u64> {
        self.mining.min_delay_ms..=self.mining.max_delay_ms
    }
}

fn check_addr(node: &str, addr: &str) -> Result<(), NodeError> {
    let valid = addr
        .rsplit_once(':')
        .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());
    if valid {
        Ok(())
    } else {
        Err(NodeError::InvalidAddress {
            node: node.to_string(),
            addr: addr.to_string(),
        })
    }
}
