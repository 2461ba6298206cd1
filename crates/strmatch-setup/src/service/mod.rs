mod systemd;
pub(crate) mod templates;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use dialoguer::Confirm;

use crate::config::{DEFAULT_SERVICE_USER, InstallConfig};

pub use systemd::{SERVICE_NAME, SERVICE_UNIT_PATH, SeedOutcome, seed_config, seed_owned_config};

/// Arguments for the `install` subcommand.
#[derive(Debug, Args)]
pub struct InstallArgs {
    /// Server config file; written from the default template if absent
    #[arg(long, default_value = strmatch_core::config::DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// System user to run the server as
    #[arg(long, default_value = DEFAULT_SERVICE_USER)]
    pub user: String,

    /// Server binary to install to /usr/local/bin (keeps the installed one if omitted)
    #[arg(long)]
    pub server_binary: Option<PathBuf>,

    /// Start the service after enabling it
    #[arg(long)]
    pub start: bool,
}

/// Arguments for the `uninstall` subcommand.
#[derive(Debug, Args)]
pub struct UninstallArgs {
    /// Server config file (reported, never removed)
    #[arg(long, default_value = strmatch_core::config::DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,
}

/// Run the systemd install flow.
pub fn run_install(args: InstallArgs, non_interactive: bool) -> Result<()> {
    let server_binary = args
        .server_binary
        .map(|p| {
            std::fs::canonicalize(&p)
                .with_context(|| format!("server binary not found: {}", p.display()))
        })
        .transpose()?;

    let config = InstallConfig {
        config_path: args.config,
        user: args.user,
        server_binary,
        start: args.start,
    };
    config.validate()?;

    crate::escalate::escalate_if_needed("install", non_interactive)?;
    require_systemd()?;

    if Path::new(SERVICE_UNIT_PATH).exists() {
        tracing::info!("existing installation detected, updating in place");
    }
    tracing::info!(
        "install: config={}, user={}",
        config.config_path.display(),
        config.user
    );

    systemd::deploy(&config)
}

/// Run the systemd uninstall flow.
///
/// Escalation happens before the prompt; the sudo re-run asks once.
pub fn run_uninstall(args: &UninstallArgs, non_interactive: bool) -> Result<()> {
    crate::escalate::escalate_if_needed("uninstall", non_interactive)?;
    require_systemd()?;

    if !confirm_uninstall(non_interactive, || {
        Ok(Confirm::new()
            .with_prompt(format!(
                "Stop and remove the {SERVICE_NAME} service? (the config file is kept)"
            ))
            .default(false)
            .interact()?)
    })? {
        tracing::info!("uninstall cancelled");
        return Ok(());
    }

    systemd::remove(&args.config)
}

/// Whether to go ahead with uninstall; `ask` is only consulted when
/// prompting is allowed.
fn confirm_uninstall(non_interactive: bool, ask: impl FnOnce() -> Result<bool>) -> Result<bool> {
    if non_interactive {
        return Ok(true);
    }
    ask()
}

fn require_systemd() -> Result<()> {
    if !crate::cmd::command_exists("systemctl") {
        anyhow::bail!("systemctl not found; strmatch-setup requires a systemd-based system");
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn non_interactive_uninstall_never_prompts() {
        assert!(confirm_uninstall(true, || panic!("prompted")).unwrap());
    }

    #[test]
    fn interactive_uninstall_follows_answer() {
        assert!(confirm_uninstall(false, || Ok(true)).unwrap());
        assert!(!confirm_uninstall(false, || Ok(false)).unwrap());
    }
}
