//! strmatch Server Library
//!
//! Answers "is this string a full line of the data file?" over TCP:
//! - Accept loop with a connection cap and graceful shutdown
//! - Optional TLS via rustls (configured certificates or a dev bundle)
//! - Cached or per-query corpus loading
//! - Query statistics

pub mod server;
pub mod tls;

pub use server::{SearchServer, ServerError, ServerStats, StatsSnapshot};
pub use tls::TlsMode;
