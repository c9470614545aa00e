//! TLS accept loop.
//!
//! Each TCP connection gets its own task: TLS handshake (client certificate
//! verified by rustls), capture of the peer certificate chain, then the axum
//! router served over hyper with upgrades enabled so `/ws` can become a
//! channel. A failed handshake only affects its own connection.

use std::future::Future;
use std::net::SocketAddr;

use axum::extract::Request;
use hyper::body::Incoming;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tower::Service;
use tracing::{debug, info, warn};

use agentwire_core::error::Result;

use crate::app_state::HubState;
use crate::identity::TlsPeer;
use crate::router;

/// Per-connection metadata attached to every request on that connection.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub remote_addr: SocketAddr,
    pub tls: TlsPeer,
}

/// Serve until `shutdown` resolves, then close every live channel.
pub async fn serve<F>(listener: TcpListener, acceptor: TlsAcceptor, state: HubState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    let app = router::build_router(state.clone());
    tokio::pin!(shutdown);

    loop {
        let (tcp, remote_addr) = tokio::select! {
            _ = &mut shutdown => break,
            accepted = listener.accept() => match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(error = %e, "tcp accept failed");
                    continue;
                }
            },
        };

        let acceptor = acceptor.clone();
        let app = app.clone();
        let metrics = state.metrics();

        tokio::spawn(async move {
            let stream = match acceptor.accept(tcp).await {
                Ok(s) => s,
                Err(e) => {
                    metrics.tls_handshake_failures.inc(&[]);
                    warn!(%remote_addr, error = %e, "tls handshake failed");
                    return;
                }
            };

            let conn = ConnectionInfo {
                remote_addr,
                tls: TlsPeer::capture(stream.get_ref().1),
            };
            debug!(%remote_addr, "tls established");

            let hyper_service = hyper::service::service_fn(move |mut req: Request<Incoming>| {
                req.extensions_mut().insert(conn.clone());
                app.clone().call(req)
            });

            if let Err(e) = hyper::server::conn::http1::Builder::new()
                .serve_connection(TokioIo::new(stream), hyper_service)
                .with_upgrades()
                .await
            {
                debug!(%remote_addr, error = %e, "connection ended with error");
            }
        });
    }

    state.set_draining();
    let n = state.manager().shutdown_all();
    info!(channels = n, "stopped accepting; closing live channels");
    Ok(())
}
