use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::debug;
use votechain_core::{Block, BlockOutcome};

use crate::service::ChainService;
use crate::wait_for_shutdown;
use crate::wire::{
    ChainQuery, ChainResponse, Health, HeartbeatResponse, SubmitBlockResponse, BLOCKS_PATH,
    CHAIN_PATH, HEALTH_PATH, HEARTBEAT_PATH,
};

pub fn router(chain: Arc<ChainService>) -> Router {
    Router::new()
        .route(HEALTH_PATH, get(health))
        .route(BLOCKS_PATH, post(submit_block))
        .route(HEARTBEAT_PATH, get(heartbeat))
        .route(CHAIN_PATH, get(chain_from))
        .layer(TraceLayer::new_for_http())
        .with_state(chain)
}

/// Serves the API on `listener` until `shutdown` flips to true.
pub async fn serve(
    listener: TcpListener,
    chain: Arc<ChainService>,
    shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    axum::serve(listener, router(chain))
        .with_graceful_shutdown(wait_for_shutdown(shutdown))
        .await
}

async fn health() -> Json<Health> {
    Json(Health {
        status: "ok".to_string(),
    })
}

async fn submit_block(
    State(chain): State<Arc<ChainService>>,
    Json(block): Json<Block>,
) -> Json<SubmitBlockResponse> {
    debug!(index = block.index(), hash = %block.hash(), "received block");
    let code = chain.on_peer_block(block);
    let block = match code {
        BlockOutcome::Rejected => chain.last_block(),
        _ => None,
    };
    Json(SubmitBlockResponse { code, block })
}

async fn heartbeat(State(chain): State<Arc<ChainService>>) -> Json<HeartbeatResponse> {
    Json(HeartbeatResponse {
        chain_length: chain.heartbeat(),
    })
}

async fn chain_from(
    State(chain): State<Arc<ChainService>>,
    Query(query): Query<ChainQuery>,
) -> Json<ChainResponse> {
    Json(ChainResponse {
        blocks: chain.chain_from(query.from),
    })
}
