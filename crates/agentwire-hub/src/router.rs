//! Axum router wiring (HTTP -> WS upgrade, ops endpoints).

use axum::{routing::get, Router};

use crate::{app_state::HubState, ops, transport};

pub fn build_router(state: HubState) -> Router {
    Router::new()
        .route("/", get(transport::ws::ws_upgrade))
        .route("/ws", get(transport::ws::ws_upgrade))
        .route("/ws/:agent_id", get(transport::ws::ws_upgrade))
        .route("/healthz", get(ops::healthz))
        .route("/v1/channels", get(ops::channels))
        .route("/metrics", get(ops::metrics))
        .with_state(state)
}
