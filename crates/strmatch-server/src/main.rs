//! strmatch server
//!
//! Answers whether a query string is a full line of the configured data file.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use strmatch_core::ServerConfig;
use strmatch_core::config::DEFAULT_CONFIG_PATH;
use strmatch_core::tracing_init::{default_filter, init_tracing};
use strmatch_server::{SearchServer, TlsMode};

#[derive(Parser, Debug)]
#[command(name = "strmatch-server")]
#[command(version, about = "strmatch server - exact line lookup over TCP/TLS")]
struct Args {
    /// Path to the TOML config file.
    #[arg(long, env = "STRMATCH_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long)]
    log_json: bool,

    /// Serve TLS with a generated self-signed bundle written to DIR.
    /// Overrides the [tls] section. Development only.
    #[arg(long, value_name = "DIR")]
    dev_tls: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = ServerConfig::load(&args.config)
        .with_context(|| format!("Failed to load config {}", args.config.display()))?;
    config.validate().context("Invalid configuration")?;

    init_tracing(
        &default_filter("strmatch_server", config.logging.debug),
        args.log_json || config.logging.json,
        config.logging.log_file.as_deref(),
    )
    .context("Failed to initialise logging")?;

    let addr = config.bind_addr()?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %args.config.display(),
        addr = %addr,
        data = %config.files.data_path.display(),
        algorithm = %config.query.algorithm,
        reread_on_query = config.query.reread_on_query,
        "Starting strmatch-server"
    );

    let tls_mode = match &args.dev_tls {
        Some(dir) => TlsMode::DevSelfSigned {
            cert_dir: dir.clone(),
        },
        None => TlsMode::from_config(&config.tls),
    };
    let acceptor = tls_mode
        .to_acceptor()
        .context("Failed to set up TLS")?;

    let mut server = SearchServer::new(&config)?;
    if let Some(acceptor) = acceptor {
        server = server.with_tls(acceptor);
    }

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut serve = tokio::spawn(server.serve(listener, shutdown_rx));

    #[cfg(unix)]
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    // Notify systemd that the server is ready (unix only).
    #[cfg(unix)]
    sd_notify::notify(false, &[sd_notify::NotifyState::Ready])?;

    #[cfg(unix)]
    let sigterm_future = sigterm.recv();
    #[cfg(not(unix))]
    let sigterm_future = std::future::pending::<Option<()>>();

    tokio::select! {
        result = &mut serve => {
            result??;
            return Ok(());
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C shutdown signal");
        }
        _ = sigterm_future => {
            info!("Received SIGTERM shutdown signal");
        }
    }

    #[cfg(unix)]
    sd_notify::notify(true, &[sd_notify::NotifyState::Stopping])?;

    let _ = shutdown_tx.send(true);
    serve.await??;
    Ok(())
}
