//! JSON messages exchanged between nodes over HTTP.

use serde::{Deserialize, Serialize};
use votechain_core::{Block, BlockOutcome};

pub const HEALTH_PATH: &str = "/health";
pub const BLOCKS_PATH: &str = "/blocks";
pub const HEARTBEAT_PATH: &str = "/heartbeat";
pub const CHAIN_PATH: &str = "/chain";

/// Answer to `POST /blocks`. A rejection carries the responder's own last block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitBlockResponse {
    pub code: BlockOutcome,
    #[serde(default)]
    pub block: Option<Block>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    pub chain_length: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainQuery {
    #[serde(default)]
    pub from: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainResponse {
    pub blocks: Vec<Block>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
}
