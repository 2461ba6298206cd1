//! strmatch Core Library
//!
//! Shared functionality for strmatch components:
//! - Server configuration loading and validation
//! - Wire protocol (query decoding, response strings)
//! - Corpus loading and exact-line search algorithms
//! - TLS certificate inspection
//! - Common error types

pub mod certs;
pub mod config;
pub mod corpus;
pub mod error;
pub mod protocol;
pub mod search;
pub mod tracing_init;

pub use config::ServerConfig;
pub use corpus::Corpus;
pub use error::{Error, Result};
pub use protocol::{PayloadError, Response};
pub use search::Algorithm;
