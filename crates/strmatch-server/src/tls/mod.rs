//! TLS configuration and dev certificate generation for the server.

pub mod certs;
pub mod config;

pub use certs::{CertBundle, CertError, generate_dev_bundle, write_dev_certs};
pub use config::{TlsConfigError, TlsMode, build_acceptor};
