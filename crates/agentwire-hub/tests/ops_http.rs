#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use agentwire_hub::app_state::HubState;
use agentwire_hub::channel::{ChannelConfig, ConnMeta};
use agentwire_hub::identity::TlsPeer;
use agentwire_hub::router::build_router;
use agentwire_hub::transport::memory::memory_pair;

async fn get(app: &Router, uri: &str) -> (StatusCode, String) {
    let resp = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn healthz_reports_draining() {
    let state = HubState::with_channel_config(ChannelConfig::default());
    let app = build_router(state.clone());

    assert_eq!(get(&app, "/healthz").await, (StatusCode::OK, "ok".to_string()));

    state.set_draining();
    let (status, body) = get(&app, "/healthz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, "draining");
}

#[tokio::test]
async fn channels_and_metrics_reflect_registry() {
    let state = HubState::with_channel_config(ChannelConfig::default());
    let app = build_router(state.clone());

    let (_, body) = get(&app, "/v1/channels").await;
    assert_eq!(body, "[]");

    let (transport, mut peer) = memory_pair(8);
    let meta = ConnMeta::new("10.0.0.5:51000".parse().unwrap(), "/ws/agent-1", TlsPeer::none());
    let _ch = state.manager().accept(transport, meta);
    peer.send_text("hi").await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), peer.recv())
        .await
        .unwrap()
        .unwrap();

    let (status, body) = get(&app, "/v1/channels").await;
    assert_eq!(status, StatusCode::OK);
    let v: serde_json::Value = serde_json::from_str(&body).unwrap();
    let list = v.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["id"], 1);
    assert_eq!(list[0]["path"], "/ws/agent-1");
    assert_eq!(list[0]["remote_address"], "10.0.0.5:51000");
    assert_eq!(list[0]["state"], "OPEN");
    assert_eq!(list[0]["peer_identity"], serde_json::json!({"status": "unknown"}));
    assert!(list[0]["opened_at"].as_str().unwrap().ends_with('Z'));

    let (status, body) = get(&app, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("agentwire_channels_accepted_total 1\n"), "{body}");
    assert!(body.contains("agentwire_channels_active 1\n"), "{body}");
    assert!(body.contains("agentwire_frames_in_total{kind=\"text\"} 1"), "{body}");
    assert!(body.contains("agentwire_registry_channels 1"), "{body}");
}

#[tokio::test]
async fn unknown_route_is_404() {
    let app = build_router(HubState::with_channel_config(ChannelConfig::default()));
    let (status, _) = get(&app, "/v1/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
