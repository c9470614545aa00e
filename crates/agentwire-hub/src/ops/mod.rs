//! Operational HTTP endpoints.
//!
//! - `/healthz`     : liveness (503 when draining)
//! - `/v1/channels` : live channel registry as JSON
//! - `/metrics`     : Prometheus text format

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::app_state::HubState;

pub async fn healthz(State(state): State<HubState>) -> impl IntoResponse {
    if state.is_draining() {
        (StatusCode::SERVICE_UNAVAILABLE, "draining")
    } else {
        (StatusCode::OK, "ok")
    }
}

pub async fn channels(State(state): State<HubState>) -> Response {
    Json(state.manager().snapshot()).into_response()
}

pub async fn metrics(State(state): State<HubState>) -> Response {
    let extra = state.metrics_extra();
    let body = state.metrics().render(&extra);

    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
        .into_response()
}
