//! TLS configuration for the server.

use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::TlsAcceptor;
use tracing::{info, warn};

use strmatch_core::certs;
use strmatch_core::config::TlsConfig;

use super::certs::{CertError, generate_dev_bundle, write_dev_certs};

/// Names the dev certificate is issued for.
const DEV_SERVER_NAMES: &[&str] = &["localhost", "127.0.0.1"];

/// TLS configuration for the server.
#[derive(Debug, Clone)]
pub enum TlsMode {
    /// No TLS (plaintext).
    Disabled,
    /// Auto-generated self-signed certificates for development.
    DevSelfSigned {
        /// Directory to store generated certs.
        cert_dir: PathBuf,
    },
    /// Certificate chain and key from PEM files.
    Files {
        cert_path: PathBuf,
        key_path: PathBuf,
    },
}

impl TlsMode {
    /// Mode described by the `[tls]` config section.
    pub fn from_config(tls: &TlsConfig) -> Self {
        if tls.enabled {
            Self::Files {
                cert_path: tls.cert.clone(),
                key_path: tls.key.clone(),
            }
        } else {
            Self::Disabled
        }
    }

    /// Build an acceptor for this mode. Returns `None` if TLS is disabled.
    pub fn to_acceptor(&self) -> Result<Option<TlsAcceptor>, TlsConfigError> {
        match self {
            Self::Disabled => Ok(None),
            Self::DevSelfSigned { cert_dir } => {
                info!("Generating dev TLS certificates");
                let bundle = generate_dev_bundle(DEV_SERVER_NAMES)?;
                write_dev_certs(cert_dir, &bundle)?;

                let chain = parse_certs(bundle.server_cert_pem.as_bytes(), "dev bundle")?;
                let key = parse_key(bundle.server_key_pem.as_bytes(), "dev bundle")?;
                let acceptor = build_acceptor(chain, key)?;

                info!(
                    ca = %cert_dir.join("ca.pem").display(),
                    "Dev TLS enabled; clients must trust this CA"
                );
                Ok(Some(acceptor))
            }
            Self::Files {
                cert_path,
                key_path,
            } => {
                let chain = parse_certs(
                    &read_file(cert_path, "cert")?,
                    &cert_path.display().to_string(),
                )?;
                let key = parse_key(
                    &read_file(key_path, "key")?,
                    &key_path.display().to_string(),
                )?;
                log_leaf(&chain);
                let acceptor = build_acceptor(chain, key)?;

                info!(
                    cert = %cert_path.display(),
                    key = %key_path.display(),
                    "TLS enabled"
                );
                Ok(Some(acceptor))
            }
        }
    }
}

/// Build a TLS 1.2+ acceptor using the ring provider's default suites.
pub fn build_acceptor(
    chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
) -> Result<TlsAcceptor, TlsConfigError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = rustls::ServerConfig::builder_with_provider(provider)
        .with_protocol_versions(&[&rustls::version::TLS13, &rustls::version::TLS12])
        .map_err(|e| TlsConfigError::Rustls(e.to_string()))?
        .with_no_client_auth()
        .with_single_cert(chain, key)
        .map_err(|e| TlsConfigError::Rustls(e.to_string()))?;
    Ok(TlsAcceptor::from(Arc::new(config)))
}

fn read_file(path: &Path, what: &str) -> Result<Vec<u8>, TlsConfigError> {
    std::fs::read(path).map_err(|e| {
        TlsConfigError::FileRead(format!("Failed to read {what} {}: {e}", path.display()))
    })
}

fn parse_certs(pem: &[u8], origin: &str) -> Result<Vec<CertificateDer<'static>>, TlsConfigError> {
    let chain = rustls_pemfile::certs(&mut BufReader::new(pem))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| TlsConfigError::Pem(format!("{origin}: {e}")))?;
    if chain.is_empty() {
        return Err(TlsConfigError::Pem(format!("{origin}: no certificates found")));
    }
    Ok(chain)
}

fn parse_key(pem: &[u8], origin: &str) -> Result<PrivateKeyDer<'static>, TlsConfigError> {
    rustls_pemfile::private_key(&mut BufReader::new(pem))
        .map_err(|e| TlsConfigError::Pem(format!("{origin}: {e}")))?
        .ok_or_else(|| TlsConfigError::Pem(format!("{origin}: no private key found")))
}

/// Log the leaf certificate's identity and warn about its validity window.
fn log_leaf(chain: &[CertificateDer<'static>]) {
    let Some(leaf) = chain.first() else {
        return;
    };
    match certs::summarize(leaf) {
        Ok(summary) => {
            info!(
                subject = %summary.subject,
                issuer = %summary.issuer,
                expires = %summary.not_after_display,
                key = %summary.key,
                chain_len = chain.len(),
                "Loaded server certificate"
            );
            for finding in certs::validity_findings(&summary, certs::unix_now()) {
                warn!(%finding, "Server certificate");
            }
        }
        Err(e) => warn!(error = %e, "Could not inspect server certificate"),
    }
}

/// TLS configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum TlsConfigError {
    #[error("Certificate generation error: {0}")]
    CertGeneration(String),

    #[error("File read error: {0}")]
    FileRead(String),

    #[error("PEM error: {0}")]
    Pem(String),

    #[error("rustls error: {0}")]
    Rustls(String),
}

impl From<CertError> for TlsConfigError {
    fn from(e: CertError) -> Self {
        Self::CertGeneration(e.to_string())
    }
}
