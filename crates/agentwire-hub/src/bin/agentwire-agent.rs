//! Minimal agent: connect over mTLS, send one message, print the echo.
//!
//! Usage: `agentwire-agent <wss-url> <ca.pem> <cert.pem> <key.pem> [message]`

use std::path::Path;
use std::process::ExitCode;

use tracing_subscriber::{fmt, EnvFilter};

use agentwire_core::error::{AgentWireError, Result};
use agentwire_core::protocol::frame::ECHO_PREFIX;
use agentwire_hub::{client::AgentClient, tls};

const USAGE: &str = "usage: agentwire-agent <wss-url> <ca.pem> <cert.pem> <key.pem> [message]";

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 4 {
        eprintln!("{USAGE}");
        return ExitCode::from(2);
    }

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(code = e.code().as_str(), error = %e, "agent failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &[String]) -> Result<()> {
    let url = &args[0];
    let tls = tls::client_config(Path::new(&args[1]), Path::new(&args[2]), Path::new(&args[3]))?;
    let message = args.get(4).map(String::as_str).unwrap_or("Hello from agentwire-agent");

    let mut client = AgentClient::connect(url, tls).await?;
    tracing::info!(%url, "channel open");

    client.send_text(message).await?;
    let reply = client
        .recv_text()
        .await?
        .ok_or_else(|| AgentWireError::TransportClosed("hub closed before echo".into()))?;

    if reply.strip_prefix(ECHO_PREFIX) == Some(message) {
        tracing::info!(%reply, "echo received");
    } else {
        tracing::warn!(%reply, "unexpected echo");
    }
    println!("{reply}");

    client.close().await
}
