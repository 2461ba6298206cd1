//! TCP server for strmatch.
//!
//! One query per connection. Each accepted connection runs in its own task;
//! a semaphore caps how many are served at once.

mod handler;
pub mod source;
mod stats;

pub use source::CorpusSource;
pub use stats::{ConnectionGuard, ServerStats, StatsSnapshot};

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinSet;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, info, warn};

use strmatch_core::{Algorithm, ServerConfig};

use crate::tls::TlsConfigError;

/// How long in-flight queries get to finish after shutdown is signalled.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);
/// Back-off after a failed `accept`, e.g. when out of file descriptors.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Core(#[from] strmatch_core::Error),

    #[error("TLS error: {0}")]
    Tls(#[from] TlsConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// State every connection task needs.
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) source: CorpusSource,
    pub(crate) algorithm: Algorithm,
    pub(crate) max_payload: usize,
    pub(crate) read_timeout: Duration,
    pub(crate) stats: Arc<ServerStats>,
}

/// Exact-line lookup server.
pub struct SearchServer {
    shared: Arc<Shared>,
    tls: Option<TlsAcceptor>,
    max_connections: usize,
}

impl SearchServer {
    /// Load the data file and prepare a plaintext server.
    pub fn new(config: &ServerConfig) -> Result<Self, ServerError> {
        let source = CorpusSource::open(
            config.files.data_path.clone(),
            config.query.reread_on_query,
        )?;
        Ok(Self {
            shared: Arc::new(Shared {
                source,
                algorithm: config.query.algorithm,
                max_payload: config.request.max_payload,
                read_timeout: Duration::from_secs(config.request.read_timeout_secs),
                stats: Arc::new(ServerStats::new()),
            }),
            tls: None,
            max_connections: config.server.max_connections.max(1),
        })
    }

    /// Serve every connection over TLS.
    #[must_use]
    pub fn with_tls(mut self, acceptor: TlsAcceptor) -> Self {
        self.tls = Some(acceptor);
        self
    }

    pub fn stats(&self) -> Arc<ServerStats> {
        Arc::clone(&self.shared.stats)
    }

    /// Accept connections until `shutdown` changes or its sender is dropped,
    /// then wait briefly for in-flight queries.
    pub async fn serve(
        self,
        listener: TcpListener,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        info!(
            addr = %addr,
            tls = self.tls.is_some(),
            algorithm = %self.shared.algorithm,
            max_connections = self.max_connections,
            "Listening"
        );

        let semaphore = Arc::new(Semaphore::new(self.max_connections));
        let mut tasks = JoinSet::new();

        while !*shutdown.borrow() {
            while tasks.try_join_next().is_some() {}

            if semaphore.available_permits() == 0 {
                debug!(
                    max_connections = self.max_connections,
                    "Connection limit reached, waiting for a free slot"
                );
            }
            let permit = tokio::select! {
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
                _ = shutdown.changed() => break,
            };

            let (stream, peer) = tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!(error = %e, "Accept failed");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                        continue;
                    }
                },
                _ = shutdown.changed() => break,
            };
            debug!(peer = %peer, "Connection accepted");

            let shared = Arc::clone(&self.shared);
            let tls = self.tls.clone();
            tasks.spawn(async move {
                let _permit = permit;
                let _guard = shared.stats.connection_opened();
                match tls {
                    Some(acceptor) => {
                        match tokio::time::timeout(shared.read_timeout, acceptor.accept(stream))
                            .await
                        {
                            Ok(Ok(tls_stream)) => {
                                handler::handle_connection(tls_stream, peer, &shared).await;
                            }
                            Ok(Err(e)) => {
                                warn!(peer = %peer, error = %e, "TLS handshake failed");
                            }
                            Err(_) => warn!(peer = %peer, "TLS handshake timed out"),
                        }
                    }
                    None => handler::handle_connection(stream, peer, &shared).await,
                }
            });
        }

        info!(in_flight = tasks.len(), "Shutting down, draining connections");
        if tokio::time::timeout(DRAIN_TIMEOUT, async {
            while tasks.join_next().await.is_some() {}
        })
        .await
        .is_err()
        {
            warn!(remaining = tasks.len(), "Drain timed out, aborting connections");
            tasks.abort_all();
        }

        let snap = self.shared.stats.snapshot();
        info!(
            total_queries = snap.total_queries,
            avg_response_ms = snap.avg_response_ms,
            max_concurrent = snap.max_concurrent,
            "Server stopped"
        );
        Ok(())
    }
}
