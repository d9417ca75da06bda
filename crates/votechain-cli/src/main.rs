use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};
use votechain_core::constants::POW_TARGET_DIFFICULTY;
use votechain_core::{Block, ChainError, ChainStore};
use votechain_node::wire::{ChainResponse, HeartbeatResponse, SubmitBlockResponse};

#[derive(Parser, Debug)]
#[command(name = "votechain-cli")]
#[command(about = "CLI client for a votechain node")]
struct Cli {
    /// Node base URL (e.g. http://127.0.0.1:8000)
    #[arg(long, global = true, default_value = "http://127.0.0.1:8000")]
    node: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the node's chain length
    Heartbeat,
    /// Print the node's blocks as JSON
    Chain {
        /// First index to return
        #[arg(long, default_value_t = 0)]
        from: u64,
    },
    /// Fetch the whole chain and check every proof and link
    Verify {
        #[arg(long, default_value_t = POW_TARGET_DIFFICULTY)]
        difficulty: usize,
    },
    /// Offer a block, read as JSON from a file, to the node
    Submit {
        #[arg(long)]
        file: PathBuf,
    },
}

/// Replays `blocks` into an empty store; the store rejects the first bad one.
fn verify_blocks(blocks: Vec<Block>, difficulty: usize) -> Result<usize, ChainError> {
    let mut store = ChainStore::new(difficulty);
    for block in blocks {
        store.append(block)?;
    }
    Ok(store.len())
}

async fn fetch_chain(client: &reqwest::Client, node: &str, from: u64) -> Result<Vec<Block>> {
    let res = client
        .get(format!("{node}/chain"))
        .query(&[("from", from)])
        .send()
        .await?
        .error_for_status()?;
    let body: ChainResponse = res.json().await?;
    debug!(blocks = body.blocks.len(), "fetched chain");
    Ok(body.blocks)
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .pretty()
        .init();

    let cli = Cli::parse();
    let node = cli.node.trim_end_matches('/');
    let client = reqwest::Client::new();
    match cli.cmd {
        Command::Heartbeat => {
            let res = client
                .get(format!("{node}/heartbeat"))
                .send()
                .await?
                .error_for_status()?;
            let body: HeartbeatResponse = res.json().await?;
            println!("chain length: {}", body.chain_length);
        }
        Command::Chain { from } => {
            let blocks = fetch_chain(&client, node, from).await?;
            println!("{}", serde_json::to_string_pretty(&blocks)?);
        }
        Command::Verify { difficulty } => {
            let blocks = fetch_chain(&client, node, 0).await?;
            let length = verify_blocks(blocks, difficulty)
                .with_context(|| format!("chain served by {node} is invalid"))?;
            println!("chain of {length} blocks is valid at difficulty {difficulty}");
        }
        Command::Submit { file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let block: Block = serde_json::from_str(&raw)
                .with_context(|| format!("parsing block from {}", file.display()))?;
            let res = client.post(format!("{node}/blocks")).json(&block).send().await?;
            let status = res.status();
            let body: SubmitBlockResponse = res.error_for_status()?.json().await?;
            println!("status: {status}");
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
    }
    Ok(())
}
