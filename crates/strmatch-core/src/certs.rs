//! TLS certificate inspection.
//!
//! Checks server certificate material against the deployment requirements:
//! SAN coverage for every access point, RSA-2048 / ECDSA P-256 minimum key
//! strength, the TLS server-auth EKU, a validity window, and a chain that
//! links up to a certificate in the CA bundle.

use std::fmt;
use std::io::BufReader;
use std::net::IpAddr;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use x509_parser::certificate::X509Certificate;
use x509_parser::extensions::GeneralName;
use x509_parser::public_key::PublicKey;

use crate::error::{Error, Result};

/// Minimum accepted RSA modulus size in bits.
pub const MIN_RSA_BITS: usize = 2048;
/// Minimum accepted EC field size in bits (P-256).
pub const MIN_EC_BITS: usize = 256;
/// Certificates expiring within this many days produce a warning.
pub const EXPIRY_WARNING_DAYS: i64 = 30;
const MAX_CHAIN_DEPTH: usize = 8;
const SECS_PER_DAY: i64 = 86_400;

/// Public key algorithm and size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyInfo {
    Rsa { bits: usize },
    Ec { bits: usize },
    /// Anything else, identified by its algorithm OID.
    Other(String),
}

impl fmt::Display for KeyInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rsa { bits } => write!(f, "RSA-{bits}"),
            Self::Ec { bits } => write!(f, "EC-{bits}"),
            Self::Other(oid) => write!(f, "unknown ({oid})"),
        }
    }
}

/// Fields of a certificate relevant to deployment checks.
#[derive(Debug, Clone)]
pub struct CertSummary {
    pub subject: String,
    pub issuer: String,
    /// Unix seconds.
    pub not_before: i64,
    /// Unix seconds.
    pub not_after: i64,
    /// Human-readable expiry, as encoded in the certificate.
    pub not_after_display: String,
    pub dns_names: Vec<String>,
    pub ip_addresses: Vec<IpAddr>,
    pub has_san: bool,
    pub key: KeyInfo,
    /// EKU present and allows TLS server authentication.
    pub server_auth: bool,
    pub is_ca: bool,
}

impl CertSummary {
    /// Whether the SAN entries cover `name` (a DNS name or IP literal).
    pub fn covers(&self, name: &str) -> bool {
        if let Ok(ip) = name.parse::<IpAddr>() {
            return self.ip_addresses.contains(&ip);
        }
        self.dns_names.iter().any(|pattern| dns_matches(pattern, name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

/// One problem found during a certificate check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub severity: Severity,
    pub message: String,
}

impl Finding {
    fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
        }
    }

    fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.severity {
            Severity::Warning => write!(f, "warning: {}", self.message),
            Severity::Error => write!(f, "error: {}", self.message),
        }
    }
}

/// Result of [`check_server_cert`].
#[derive(Debug, Clone)]
pub struct CertReport {
    pub leaf: CertSummary,
    pub chain_len: usize,
    pub findings: Vec<Finding>,
}

impl CertReport {
    /// True when no error-level findings were produced.
    pub fn is_ok(&self) -> bool {
        self.errors().next().is_none()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Warning)
    }
}

/// Read every certificate from a PEM file, in file order, as DER.
pub fn load_pem_certs(path: &Path) -> Result<Vec<Vec<u8>>> {
    let pem = std::fs::read(path).map_err(|e| {
        Error::Certificate(format!("Failed to read {}: {e}", path.display()))
    })?;
    let certs = parse_pem_certs(&pem)?;
    if certs.is_empty() {
        return Err(Error::Certificate(format!(
            "No certificates found in {}",
            path.display()
        )));
    }
    Ok(certs)
}

/// Extract DER certificates from PEM text.
pub fn parse_pem_certs(pem: &[u8]) -> Result<Vec<Vec<u8>>> {
    let mut reader = BufReader::new(pem);
    rustls_pemfile::certs(&mut reader)
        .map(|cert| {
            cert.map(|der| der.to_vec())
                .map_err(|e| Error::Certificate(format!("Invalid PEM: {e}")))
        })
        .collect()
}

fn parse_der(der: &[u8]) -> Result<X509Certificate<'_>> {
    x509_parser::parse_x509_certificate(der)
        .map(|(_, cert)| cert)
        .map_err(|e| Error::Certificate(format!("Invalid X.509 certificate: {e}")))
}

/// Summarise a DER-encoded certificate.
pub fn summarize(der: &[u8]) -> Result<CertSummary> {
    let cert = parse_der(der)?;
    summarize_parsed(&cert)
}

fn summarize_parsed(cert: &X509Certificate<'_>) -> Result<CertSummary> {
    let mut dns_names = Vec::new();
    let mut ip_addresses = Vec::new();
    let san = cert
        .subject_alternative_name()
        .map_err(|e| Error::Certificate(format!("Malformed SAN extension: {e}")))?;
    let has_san = san.is_some();
    if let Some(san) = san {
        for name in &san.value.general_names {
            match name {
                GeneralName::DNSName(dns) => dns_names.push((*dns).to_string()),
                GeneralName::IPAddress(bytes) => {
                    if let Some(ip) = ip_from_bytes(bytes) {
                        ip_addresses.push(ip);
                    }
                }
                _ => {}
            }
        }
    }

    let server_auth = cert
        .extended_key_usage()
        .map_err(|e| Error::Certificate(format!("Malformed EKU extension: {e}")))?
        .is_some_and(|eku| eku.value.server_auth || eku.value.any);

    let key = match cert.public_key().parsed() {
        Ok(PublicKey::RSA(rsa)) => KeyInfo::Rsa {
            bits: rsa.key_size(),
        },
        Ok(PublicKey::EC(point)) => KeyInfo::Ec {
            bits: point.key_size(),
        },
        _ => KeyInfo::Other(cert.public_key().algorithm.algorithm.to_id_string()),
    };

    let validity = cert.validity();
    Ok(CertSummary {
        subject: cert.subject().to_string(),
        issuer: cert.issuer().to_string(),
        not_before: validity.not_before.timestamp(),
        not_after: validity.not_after.timestamp(),
        not_after_display: validity.not_after.to_string(),
        dns_names,
        ip_addresses,
        has_san,
        key,
        server_auth,
        is_ca: cert.is_ca(),
    })
}

fn ip_from_bytes(bytes: &[u8]) -> Option<IpAddr> {
    match bytes.len() {
        4 => <[u8; 4]>::try_from(bytes).ok().map(IpAddr::from),
        16 => <[u8; 16]>::try_from(bytes).ok().map(IpAddr::from),
        _ => None,
    }
}

/// DNS SAN matching with single-label leftmost wildcards.
fn dns_matches(pattern: &str, name: &str) -> bool {
    let pattern = pattern.trim_end_matches('.').to_ascii_lowercase();
    let name = name.trim_end_matches('.').to_ascii_lowercase();
    match pattern.strip_prefix("*.") {
        Some(suffix) => name
            .split_once('.')
            .is_some_and(|(label, rest)| !label.is_empty() && rest == suffix),
        None => pattern == name,
    }
}

/// Key strength check.
pub fn key_strength_finding(key: &KeyInfo) -> Option<Finding> {
    match key {
        KeyInfo::Rsa { bits } if *bits < MIN_RSA_BITS => Some(Finding::error(format!(
            "RSA key is {bits} bits; at least {MIN_RSA_BITS} required"
        ))),
        KeyInfo::Ec { bits } if *bits < MIN_EC_BITS => Some(Finding::error(format!(
            "EC key is {bits} bits; at least P-256 required"
        ))),
        KeyInfo::Other(oid) => Some(Finding::warning(format!(
            "unrecognised key algorithm {oid}; strength not verified"
        ))),
        _ => None,
    }
}

/// Validity window check.
pub fn validity_findings(summary: &CertSummary, now: i64) -> Vec<Finding> {
    let mut findings = Vec::new();
    if now < summary.not_before {
        findings.push(Finding::error("certificate is not yet valid"));
    }
    if now > summary.not_after {
        findings.push(Finding::error(format!(
            "certificate expired at {}",
            summary.not_after_display
        )));
    } else if summary.not_after - now < EXPIRY_WARNING_DAYS * SECS_PER_DAY {
        findings.push(Finding::warning(format!(
            "certificate expires soon ({})",
            summary.not_after_display
        )));
    }
    findings
}

fn issued_by(cert: &X509Certificate<'_>, issuer: &X509Certificate<'_>) -> bool {
    cert.issuer().as_raw() == issuer.subject().as_raw()
        && cert.verify_signature(Some(issuer.public_key())).is_ok()
}

/// Walk from the leaf through the presented intermediates until a
/// certificate issued by (or identical to) a CA bundle entry is reached.
fn verify_chain(
    chain: &[(&[u8], X509Certificate<'_>)],
    roots: &[(&[u8], X509Certificate<'_>)],
) -> std::result::Result<(), String> {
    let mut current = 0;
    for _ in 0..MAX_CHAIN_DEPTH {
        let (der, cert) = &chain[current];
        if roots.iter().any(|(root_der, _)| root_der == der) {
            return Ok(());
        }
        if roots.iter().any(|(_, root)| issued_by(cert, root)) {
            return Ok(());
        }
        if cert.subject().as_raw() == cert.issuer().as_raw() {
            return Err(format!(
                "chain ends at self-signed certificate '{}' which is not in the CA bundle",
                cert.subject()
            ));
        }
        match chain
            .iter()
            .enumerate()
            .find(|(idx, (_, candidate))| *idx != current && issued_by(cert, candidate))
        {
            Some((next, _)) => current = next,
            None => {
                return Err(format!(
                    "no issuer found for '{}' (issuer '{}') in the chain or CA bundle",
                    cert.subject(),
                    cert.issuer()
                ));
            }
        }
    }
    Err(format!("certificate chain longer than {MAX_CHAIN_DEPTH}"))
}

/// Check a server certificate chain (leaf first) against a CA bundle.
///
/// `required_names` are the DNS names or IP literals clients will use to
/// reach the server. `now` is in Unix seconds.
pub fn check_server_cert(
    chain: &[Vec<u8>],
    ca_bundle: &[Vec<u8>],
    required_names: &[String],
    now: i64,
) -> Result<CertReport> {
    let parsed_chain = chain
        .iter()
        .map(|der| parse_der(der).map(|cert| (der.as_slice(), cert)))
        .collect::<Result<Vec<_>>>()?;
    let parsed_roots = ca_bundle
        .iter()
        .map(|der| parse_der(der).map(|cert| (der.as_slice(), cert)))
        .collect::<Result<Vec<_>>>()?;

    let Some((_, leaf_cert)) = parsed_chain.first() else {
        return Err(Error::Certificate("empty certificate chain".into()));
    };
    let leaf = summarize_parsed(leaf_cert)?;
    let mut findings = Vec::new();

    if leaf.has_san {
        for name in required_names {
            if !leaf.covers(name) {
                findings.push(Finding::error(format!(
                    "Subject Alternative Names do not cover '{name}'"
                )));
            }
        }
    } else {
        findings.push(Finding::error(
            "certificate has no Subject Alternative Name extension",
        ));
    }

    findings.extend(key_strength_finding(&leaf.key));

    if !leaf.server_auth {
        findings.push(Finding::error(
            "certificate lacks the TLS server authentication extended key usage",
        ));
    }
    if leaf.is_ca {
        findings.push(Finding::warning("leaf certificate is marked as a CA"));
    }

    findings.extend(validity_findings(&leaf, now));

    if parsed_roots.is_empty() {
        findings.push(Finding::warning("no CA bundle provided; chain not verified"));
    } else if let Err(message) = verify_chain(&parsed_chain, &parsed_roots) {
        findings.push(Finding::error(message));
    }

    Ok(CertReport {
        leaf,
        chain_len: chain.len(),
        findings,
    })
}

/// Current time in Unix seconds.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
}
