//! `check-certs`: pre-flight inspection of the server's TLS certificate.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Args;

use strmatch_core::ServerConfig;
use strmatch_core::certs::{self, CertReport};

/// Arguments for the `check-certs` subcommand.
#[derive(Debug, Default, Args)]
pub struct CheckCertsArgs {
    /// Server certificate chain (PEM, leaf first); defaults to tls.cert from --config
    #[arg(long)]
    pub cert: Option<PathBuf>,

    /// CA bundle to verify the chain against; defaults to tls.ca from --config
    #[arg(long)]
    pub ca: Option<PathBuf>,

    /// Name clients use to reach the server (repeatable); defaults to server.host from --config
    #[arg(long = "name")]
    pub names: Vec<String>,

    /// Server config to take defaults from
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Inputs after applying config defaults.
#[derive(Debug, PartialEq, Eq)]
struct Targets {
    cert: PathBuf,
    ca: Option<PathBuf>,
    names: Vec<String>,
}

fn resolve(args: &CheckCertsArgs) -> Result<Targets> {
    let config = args
        .config
        .as_deref()
        .map(|path| {
            ServerConfig::load(path)
                .with_context(|| format!("failed to load {}", path.display()))
        })
        .transpose()?;

    let cert = match (&args.cert, &config) {
        (Some(cert), _) => cert.clone(),
        (None, Some(config)) if !config.tls.cert.as_os_str().is_empty() => config.tls.cert.clone(),
        _ => bail!("no certificate given: pass --cert or a --config with tls.cert set"),
    };
    let ca = args
        .ca
        .clone()
        .or_else(|| config.as_ref().and_then(|c| c.tls.ca.clone()));

    let mut names = args.names.clone();
    if names.is_empty()
        && let Some(config) = &config
        && !is_wildcard_host(&config.server.host)
    {
        names.push(config.server.host.clone());
    }

    Ok(Targets { cert, ca, names })
}

fn is_wildcard_host(host: &str) -> bool {
    matches!(host, "" | "0.0.0.0" | "::" | "[::]")
}

/// Inspect the certificate, print a report to `out`, and return whether it
/// passed (no errors; warnings allowed).
pub fn run(args: &CheckCertsArgs, out: &mut impl Write) -> Result<bool> {
    let targets = resolve(args)?;

    let chain = certs::load_pem_certs(&targets.cert)?;
    let ca_bundle = match &targets.ca {
        Some(path) => certs::load_pem_certs(path)?,
        None => Vec::new(),
    };
    let report = certs::check_server_cert(&chain, &ca_bundle, &targets.names, certs::unix_now())?;

    print_report(out, &targets.cert, &report)?;
    Ok(report.is_ok())
}

fn print_report(out: &mut impl Write, path: &Path, report: &CertReport) -> Result<()> {
    let leaf = &report.leaf;
    writeln!(out, "Certificate: {}", path.display())?;
    writeln!(out, "  Subject:     {}", leaf.subject)?;
    writeln!(out, "  Issuer:      {}", leaf.issuer)?;
    writeln!(out, "  Expires:     {}", leaf.not_after_display)?;
    writeln!(out, "  Key:         {}", leaf.key)?;
    let sans: Vec<String> = leaf
        .dns_names
        .iter()
        .cloned()
        .chain(leaf.ip_addresses.iter().map(ToString::to_string))
        .collect();
    writeln!(
        out,
        "  SAN:         {}",
        if sans.is_empty() {
            "(none)".to_string()
        } else {
            sans.join(", ")
        }
    )?;
    writeln!(out, "  Chain:       {} certificate(s)", report.chain_len)?;

    if report.findings.is_empty() {
        writeln!(out, "OK: no problems found")?;
        return Ok(());
    }
    writeln!(out)?;
    for finding in report.errors().chain(report.warnings()) {
        writeln!(out, "  {finding}")?;
    }
    let errors = report.errors().count();
    if errors == 0 {
        writeln!(out, "OK with {} warning(s)", report.warnings().count())?;
    } else {
        writeln!(out, "FAILED: {errors} error(s)")?;
    }
    Ok(())
}
