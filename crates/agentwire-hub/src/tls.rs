//! rustls configuration from PEM files.
//!
//! The hub requires client certificates chained to `tls.client_ca` (mTLS)
//! unless `require_client_cert` is turned off, in which case unauthenticated
//! peers are admitted and resolve to the `unknown` identity.

use std::path::Path;
use std::sync::Arc;

use rustls::crypto::CryptoProvider;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::{ClientConfig, RootCertStore, ServerConfig};
use tokio_rustls::TlsAcceptor;

use agentwire_core::error::{AgentWireError, Result};

use crate::config::TlsSection;

fn provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

/// All certificates in a PEM file (at least one).
pub fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let certs = CertificateDer::pem_file_iter(path)
        .map_err(|e| AgentWireError::Tls(format!("{}: {e}", path.display())))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| AgentWireError::Tls(format!("{}: {e}", path.display())))?;
    if certs.is_empty() {
        return Err(AgentWireError::Tls(format!(
            "{}: no certificates found",
            path.display()
        )));
    }
    Ok(certs)
}

/// First private key in a PEM file (PKCS#8, PKCS#1 or SEC1).
pub fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    PrivateKeyDer::from_pem_file(path)
        .map_err(|e| AgentWireError::Tls(format!("{}: {e}", path.display())))
}

fn root_store(ca: &Path) -> Result<RootCertStore> {
    let mut roots = RootCertStore::empty();
    for cert in load_certs(ca)? {
        roots
            .add(cert)
            .map_err(|e| AgentWireError::Tls(format!("{}: {e}", ca.display())))?;
    }
    Ok(roots)
}

/// Server config verifying client certificates against `client_ca`.
pub fn server_config(tls: &TlsSection) -> Result<Arc<ServerConfig>> {
    let provider = provider();
    let roots = root_store(&tls.client_ca)?;

    let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), Arc::clone(&provider));
    let verifier = if tls.require_client_cert {
        verifier
    } else {
        verifier.allow_unauthenticated()
    };
    let verifier = verifier
        .build()
        .map_err(|e| AgentWireError::Tls(format!("client verifier: {e}")))?;

    let mut cfg = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| AgentWireError::Tls(e.to_string()))?
        .with_client_cert_verifier(verifier)
        .with_single_cert(load_certs(&tls.cert)?, load_key(&tls.key)?)
        .map_err(|e| AgentWireError::Tls(format!("server certificate: {e}")))?;
    cfg.alpn_protocols = vec![b"http/1.1".to_vec()];

    Ok(Arc::new(cfg))
}

pub fn acceptor(tls: &TlsSection) -> Result<TlsAcceptor> {
    Ok(TlsAcceptor::from(server_config(tls)?))
}

/// Agent-side config: trust `ca`, present `cert`/`key` as client identity.
pub fn client_config(ca: &Path, cert: &Path, key: &Path) -> Result<Arc<ClientConfig>> {
    let cfg = ClientConfig::builder_with_provider(provider())
        .with_safe_default_protocol_versions()
        .map_err(|e| AgentWireError::Tls(e.to_string()))?
        .with_root_certificates(root_store(ca)?)
        .with_client_auth_cert(load_certs(cert)?, load_key(key)?)
        .map_err(|e| AgentWireError::Tls(format!("client certificate: {e}")))?;
    Ok(Arc::new(cfg))
}
