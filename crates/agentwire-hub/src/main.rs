//! agentwire hub
//!
//! - mTLS listener (client certificates chained to `tls.client_ca`)
//! - WebSocket channels on `/`, `/ws` and `/ws/<agent_id>`
//! - Ops endpoints: `/healthz`, `/v1/channels`, `/metrics`
//! - Graceful drain on SIGINT/SIGTERM
//!
//! Config path: first argument, else `$AGENTWIRE_CONFIG`, else `agentwire.yaml`.

use std::process::ExitCode;

use tracing_subscriber::{fmt, EnvFilter};

use agentwire_core::error::{AgentWireError, Result};
use agentwire_hub::{app_state::HubState, config, server, tls};

const DEFAULT_CONFIG: &str = "agentwire.yaml";

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(code = e.code().as_str(), error = %e, "agentwire-hub failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("AGENTWIRE_CONFIG").ok())
        .unwrap_or_else(|| DEFAULT_CONFIG.to_string());

    let cfg = config::load_from_file(&path)?;
    let listen = cfg.hub.listen_addr()?;
    let acceptor = tls::acceptor(&cfg.tls)?;

    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| AgentWireError::Config(format!("bind {listen} failed: {e}")))?;

    tracing::info!(
        %listen,
        config = %path,
        mode = ?cfg.channel.mode,
        require_client_cert = cfg.tls.require_client_cert,
        "agentwire-hub starting"
    );

    server::serve(listener, acceptor, HubState::new(cfg), shutdown_signal()).await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("signal received, draining channels");
}
