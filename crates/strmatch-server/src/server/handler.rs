//! Single-query connection handler.

use std::net::SocketAddr;
use std::time::Instant;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info, warn};

use strmatch_core::Response;
use strmatch_core::protocol::decode_query;

use super::Shared;

/// Read one query, answer it, and close the stream.
pub(crate) async fn handle_connection<S>(mut stream: S, peer: SocketAddr, shared: &Shared)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let started = Instant::now();
    let response = answer(&mut stream, peer, shared).await;

    if let Err(e) = stream.write_all(response.to_string().as_bytes()).await {
        warn!(peer = %peer, error = %e, "Failed to write response");
    } else if let Err(e) = stream.shutdown().await {
        debug!(peer = %peer, error = %e, "Stream shutdown failed");
    }

    let elapsed = started.elapsed();
    info!(
        peer = %peer,
        status = response.status_tag(),
        elapsed_ms = elapsed.as_secs_f64() * 1000.0,
        "Query handled"
    );
}

async fn answer<S>(stream: &mut S, peer: SocketAddr, shared: &Shared) -> Response
where
    S: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; shared.max_payload];
    let n = match tokio::time::timeout(shared.read_timeout, stream.read(&mut buf)).await {
        Ok(Ok(n)) => n,
        Ok(Err(e)) => {
            warn!(peer = %peer, error = %e, "Read failed");
            return Response::ServerError;
        }
        Err(_) => {
            warn!(
                peer = %peer,
                timeout_secs = shared.read_timeout.as_secs(),
                "Read timed out"
            );
            return Response::ServerError;
        }
    };

    let query = match decode_query(&buf[..n]) {
        Ok(query) => query,
        Err(e) => {
            debug!(peer = %peer, bytes = n, reason = %e, "Payload rejected");
            return e.into();
        }
    };

    let corpus = match shared.source.corpus().await {
        Ok(corpus) => corpus,
        Err(e) => {
            error!(error = %e, "Failed to load data file");
            return Response::ServerError;
        }
    };

    let search_started = Instant::now();
    let found = corpus.contains(shared.algorithm, query);
    let search_time = search_started.elapsed();
    shared.stats.record_query(search_time);
    debug!(
        peer = %peer,
        query,
        algorithm = %shared.algorithm,
        found,
        search_ms = search_time.as_secs_f64() * 1000.0,
        "Search complete"
    );
    Response::from_found(found)
}
