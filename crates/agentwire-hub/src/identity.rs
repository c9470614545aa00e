//! Peer identity resolution from an established mTLS session.
//!
//! Resolution never fails: a missing certificate, a session without client
//! auth, or a subject we cannot read all yield `PeerIdentity::Unknown`.
//! Whether an unknown peer may keep its channel is channel-level policy.

use std::fmt;

use rustls::pki_types::CertificateDer;
use serde::Serialize;
use tracing::{debug, warn};
use x509_parser::parse_x509_certificate;

use agentwire_core::error::{AgentWireError, Result};

/// Sentinel rendered for peers without a resolvable identity.
pub const UNKNOWN_IDENTITY: &str = "unknown";

/// Verified identity of the remote peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PeerIdentity {
    Verified {
        /// Subject common name of the client certificate.
        common_name: String,
        /// Full subject distinguished name (for logs).
        subject: String,
    },
    Unknown,
}

impl PeerIdentity {
    pub fn common_name(&self) -> Option<&str> {
        match self {
            PeerIdentity::Verified { common_name, .. } => Some(common_name),
            PeerIdentity::Unknown => None,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, PeerIdentity::Verified { .. })
    }
}

impl fmt::Display for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.common_name().unwrap_or(UNKNOWN_IDENTITY))
    }
}

/// Session metadata exposing the peer's certificate chain (end-entity first).
pub trait PeerCertificates {
    fn peer_certificates(&self) -> Option<&[CertificateDer<'static>]>;
}

impl PeerCertificates for rustls::ServerConnection {
    fn peer_certificates(&self) -> Option<&[CertificateDer<'static>]> {
        rustls::CommonState::peer_certificates(self)
    }
}

/// Peer certificates captured once the TLS handshake completes, so they can
/// travel with the connection after the TLS stream is handed to HTTP.
#[derive(Debug, Clone, Default)]
pub struct TlsPeer {
    certs: Option<Vec<CertificateDer<'static>>>,
}

impl TlsPeer {
    pub fn new(certs: Option<Vec<CertificateDer<'static>>>) -> Self {
        Self { certs }
    }

    /// A session that presented no client certificate.
    pub fn none() -> Self {
        Self { certs: None }
    }

    /// Copy the chain out of a live session.
    pub fn capture(session: &impl PeerCertificates) -> Self {
        Self {
            certs: session.peer_certificates().map(<[_]>::to_vec),
        }
    }
}

impl PeerCertificates for TlsPeer {
    fn peer_certificates(&self) -> Option<&[CertificateDer<'static>]> {
        self.certs.as_deref()
    }
}

/// Resolve the peer identity from the end-entity certificate's subject CN.
pub fn resolve(session: &impl PeerCertificates) -> PeerIdentity {
    let Some(leaf) = session.peer_certificates().and_then(|chain| chain.first()) else {
        debug!("no client certificate presented");
        return PeerIdentity::Unknown;
    };

    match subject_identity(leaf.as_ref()) {
        Ok(identity) => identity,
        Err(e) => {
            warn!(code = e.code().as_str(), error = %e, "peer identity unresolved");
            PeerIdentity::Unknown
        }
    }
}

fn subject_identity(der: &[u8]) -> Result<PeerIdentity> {
    let (_, cert) = parse_x509_certificate(der)
        .map_err(|e| AgentWireError::IdentityUnresolved(format!("certificate parse failed: {e}")))?;

    let subject = cert.subject();
    let common_name = subject
        .iter_common_name()
        .next()
        .ok_or_else(|| AgentWireError::IdentityUnresolved("subject has no common name".into()))?
        .as_str()
        .map_err(|e| AgentWireError::IdentityUnresolved(format!("common name unreadable: {e}")))?;

    Ok(PeerIdentity::Verified {
        common_name: common_name.to_string(),
        subject: subject.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};

    fn cert_with_cn(cn: Option<&str>) -> CertificateDer<'static> {
        let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
        params.distinguished_name = DistinguishedName::new();
        params.distinguished_name.push(DnType::OrganizationName, "agentwire tests");
        if let Some(cn) = cn {
            params.distinguished_name.push(DnType::CommonName, cn);
        }
        let key = KeyPair::generate().unwrap();
        params.self_signed(&key).unwrap().der().clone()
    }

    #[test]
    fn extracts_common_name() {
        let peer = TlsPeer::new(Some(vec![cert_with_cn(Some("agente_py"))]));
        let id = resolve(&peer);
        assert_eq!(id.common_name(), Some("agente_py"));
        assert_eq!(id.to_string(), "agente_py");
        match id {
            PeerIdentity::Verified { subject, .. } => assert!(subject.contains("CN=agente_py"), "{subject}"),
            PeerIdentity::Unknown => panic!("expected verified identity"),
        }
    }

    #[test]
    fn no_certificate_is_unknown() {
        assert_eq!(resolve(&TlsPeer::none()), PeerIdentity::Unknown);
        assert_eq!(resolve(&TlsPeer::new(Some(Vec::new()))), PeerIdentity::Unknown);
        assert_eq!(PeerIdentity::Unknown.to_string(), UNKNOWN_IDENTITY);
    }

    #[test]
    fn subject_without_cn_is_unknown() {
        let peer = TlsPeer::new(Some(vec![cert_with_cn(None)]));
        assert_eq!(resolve(&peer), PeerIdentity::Unknown);
    }

    #[test]
    fn garbage_der_is_unknown() {
        let peer = TlsPeer::new(Some(vec![CertificateDer::from(vec![0x30, 0x03, 0x01, 0x02])]));
        assert_eq!(resolve(&peer), PeerIdentity::Unknown);
    }

    #[test]
    fn serializes_with_status_tag() {
        let v = serde_json::to_value(PeerIdentity::Unknown).unwrap();
        assert_eq!(v, serde_json::json!({"status": "unknown"}));
    }
}
