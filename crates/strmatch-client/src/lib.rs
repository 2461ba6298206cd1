//! strmatch Client Library
//!
//! Sends one query per connection to a strmatch server, over plain TCP or
//! TLS, and returns the server's answer.

use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, RootCertStore, SignatureScheme};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::debug;

/// Responses are a single short line; anything past this is not read.
const MAX_RESPONSE: u64 = 1024;

/// Client errors.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("TLS needs a trust root: pass --ca-cert <pem> or --insecure")]
    NoTrustRoot,

    #[error("Invalid server name '{0}'")]
    ServerName(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where to send queries.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    /// Bound on connect plus the whole exchange.
    pub timeout: Duration,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn addr(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// Build a TLS connector trusting the CA certificates in `ca_cert`, or, when
/// `insecure` is set and no CA is given, accepting any server certificate.
pub fn tls_connector(ca_cert: Option<&Path>, insecure: bool) -> Result<TlsConnector, ClientError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = rustls::ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_protocol_versions(&[&rustls::version::TLS13, &rustls::version::TLS12])
        .map_err(|e| ClientError::Tls(e.to_string()))?;

    let config = match (ca_cert, insecure) {
        (Some(path), _) => builder
            .with_root_certificates(load_roots(path)?)
            .with_no_client_auth(),
        (None, true) => builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert(provider)))
            .with_no_client_auth(),
        (None, false) => return Err(ClientError::NoTrustRoot),
    };
    Ok(TlsConnector::from(Arc::new(config)))
}

fn load_roots(path: &Path) -> Result<RootCertStore, ClientError> {
    let pem = std::fs::read(path)
        .map_err(|e| ClientError::Tls(format!("Failed to read {}: {e}", path.display())))?;
    let mut roots = RootCertStore::empty();
    for cert in rustls_pemfile::certs(&mut BufReader::new(pem.as_slice())) {
        let cert = cert.map_err(|e| ClientError::Tls(format!("{}: {e}", path.display())))?;
        roots
            .add(cert)
            .map_err(|e| ClientError::Tls(format!("{}: {e}", path.display())))?;
    }
    if roots.is_empty() {
        return Err(ClientError::Tls(format!(
            "{}: no CA certificates found",
            path.display()
        )));
    }
    Ok(roots)
}

/// Send `text` and return the server's response line.
pub async fn query(
    endpoint: &Endpoint,
    tls: Option<&TlsConnector>,
    text: &str,
) -> Result<String, ClientError> {
    tokio::time::timeout(endpoint.timeout, exchange(endpoint, tls, text))
        .await
        .map_err(|_| ClientError::Timeout(endpoint.timeout))?
}

async fn exchange(
    endpoint: &Endpoint,
    tls: Option<&TlsConnector>,
    text: &str,
) -> Result<String, ClientError> {
    let addr = endpoint.addr();
    let tcp = TcpStream::connect(&addr)
        .await
        .map_err(|source| ClientError::Connect {
            addr: addr.clone(),
            source,
        })?;
    debug!(addr = %addr, tls = tls.is_some(), "Connected");

    match tls {
        Some(connector) => {
            let name = server_name(&endpoint.host)?;
            let stream = connector
                .connect(name, tcp)
                .await
                .map_err(|e| ClientError::Tls(e.to_string()))?;
            send_and_receive(stream, text).await
        }
        None => send_and_receive(tcp, text).await,
    }
}

/// TLS server name for `host`; a bracketed IPv6 literal is unwrapped.
fn server_name(host: &str) -> Result<ServerName<'static>, ClientError> {
    let bare = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    ServerName::try_from(bare.to_string()).map_err(|_| ClientError::ServerName(host.to_string()))
}

async fn send_and_receive<S>(mut stream: S, text: &str) -> Result<String, ClientError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream.write_all(text.as_bytes()).await?;
    stream.flush().await?;

    let mut buf = Vec::new();
    (&mut stream).take(MAX_RESPONSE).read_to_end(&mut buf).await?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Certificate verifier for `--insecure`: skips chain and name checks but
/// still verifies handshake signatures.
#[derive(Debug)]
struct AcceptAnyServerCert(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn tls_without_trust_root_is_rejected() {
        assert!(matches!(
            tls_connector(None, false),
            Err(ClientError::NoTrustRoot)
        ));
    }

    #[test]
    fn insecure_connector_builds() {
        assert!(tls_connector(None, true).is_ok());
    }

    #[test]
    fn ca_file_without_certs_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ca.pem");
        std::fs::write(&path, "nothing here\n").unwrap();
        assert!(matches!(
            tls_connector(Some(&path), false),
            Err(ClientError::Tls(_))
        ));
    }

    #[test]
    fn endpoint_addr_brackets_ipv6() {
        assert_eq!(Endpoint::new("127.0.0.1", 8080).addr(), "127.0.0.1:8080");
        assert_eq!(Endpoint::new("::1", 8080).addr(), "[::1]:8080");
        assert_eq!(Endpoint::new("[::1]", 8080).addr(), "[::1]:8080");
    }

    #[test]
    fn bracketed_ipv6_host_is_a_valid_server_name() {
        let expected = ServerName::IpAddress(
            "::1".parse::<std::net::IpAddr>().unwrap().into(),
        );
        assert_eq!(server_name("[::1]").unwrap(), expected);
        assert_eq!(server_name("::1").unwrap(), expected);
        assert!(matches!(
            server_name("localhost").unwrap(),
            ServerName::DnsName(_)
        ));
        assert!(matches!(
            server_name("bad host"),
            Err(ClientError::ServerName(_))
        ));
    }

    #[tokio::test]
    async fn connection_refused_is_connect_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = query(&Endpoint::new("127.0.0.1", port), None, "x")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Connect { .. }), "got: {err}");
    }
}
