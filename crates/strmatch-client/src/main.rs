//! strmatch client
//!
//! Reads queries from stdin, one per line, and prints the server's answer
//! for each. Every query uses a fresh connection.

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use strmatch_client::{Endpoint, query, tls_connector};
use strmatch_core::Response;

#[derive(Parser, Debug)]
#[command(name = "strmatch-client")]
#[command(version, about = "Query a strmatch server interactively")]
struct Args {
    /// Server host name or IP address.
    #[arg(long, env = "STRMATCH_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Server port.
    #[arg(long, env = "STRMATCH_PORT", default_value_t = 8080)]
    port: u16,

    /// Connect over TLS.
    #[arg(long)]
    tls: bool,

    /// CA certificate (PEM) used to verify the server.
    #[arg(long, requires = "tls")]
    ca_cert: Option<PathBuf>,

    /// Accept any server certificate. Testing only.
    #[arg(long, requires = "tls")]
    insecure: bool,

    /// Per-query timeout in seconds.
    #[arg(long, default_value_t = 10)]
    timeout: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "strmatch_client=warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let connector = if args.tls {
        Some(tls_connector(args.ca_cert.as_deref(), args.insecure)?)
    } else {
        None
    };
    let endpoint = Endpoint {
        timeout: Duration::from_secs(args.timeout),
        ..Endpoint::new(args.host, args.port)
    };
    info!(addr = %endpoint.addr(), tls = args.tls, "Starting strmatch-client");

    let interactive = io::stdin().is_terminal();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut out = io::stdout();
    let mut err = io::stderr();

    loop {
        if interactive {
            write!(err, "query> ")?;
            err.flush()?;
        }
        let Some(line) = lines.next_line().await? else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        match query(&endpoint, connector.as_ref(), &line).await {
            Ok(response) => {
                if Response::parse(&response).is_none() {
                    warn!(response = %response, "Unrecognised server response");
                }
                writeln!(out, "{response}")?;
            }
            Err(e) => writeln!(err, "error: {e}")?,
        }
    }
    Ok(())
}
