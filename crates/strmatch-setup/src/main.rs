use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use strmatch_setup::certcheck::CheckCertsArgs;
use strmatch_setup::lifecycle::{LogsArgs, ServiceAction};
#[cfg(unix)]
use strmatch_setup::service::{InstallArgs, UninstallArgs};
use strmatch_setup::sort_data::SortDataArgs;

/// strmatch deployment tool.
#[derive(Debug, Parser)]
#[command(name = "strmatch-setup", version, about)]
struct Cli {
    /// Run without interactive prompts (use defaults or CLI flags)
    #[arg(long, global = true)]
    non_interactive: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Install strmatch-server as a systemd service
    #[cfg(unix)]
    Install(InstallArgs),
    /// Stop and remove the systemd service (keeps the config)
    #[cfg(unix)]
    Uninstall(UninstallArgs),
    /// Start the service
    Start,
    /// Stop the service
    Stop,
    /// Restart the service
    Restart,
    /// Disable the service at boot
    Disable,
    /// Show service status
    Status,
    /// Reload systemd unit files
    DaemonReload,
    /// Show server logs from the journal
    Logs(LogsArgs),
    /// Inspect the server TLS certificate before deployment
    CheckCerts(CheckCertsArgs),
    /// Sort a data file by its leading numeric field
    SortData(SortDataArgs),
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let action = match cli.command {
        #[cfg(unix)]
        Commands::Install(args) => {
            strmatch_setup::service::run_install(args, cli.non_interactive)?;
            return Ok(ExitCode::SUCCESS);
        }
        #[cfg(unix)]
        Commands::Uninstall(ref args) => {
            strmatch_setup::service::run_uninstall(args, cli.non_interactive)?;
            return Ok(ExitCode::SUCCESS);
        }
        Commands::Logs(ref args) => {
            let status = strmatch_setup::lifecycle::run_logs(args)?;
            return Ok(exit_code(status.success()));
        }
        Commands::CheckCerts(ref args) => {
            let passed = strmatch_setup::certcheck::run(args, &mut std::io::stdout().lock())?;
            return Ok(exit_code(passed));
        }
        Commands::SortData(ref args) => {
            strmatch_setup::sort_data::run(&args.input, &args.output)?;
            return Ok(ExitCode::SUCCESS);
        }
        Commands::Start => ServiceAction::Start,
        Commands::Stop => ServiceAction::Stop,
        Commands::Restart => ServiceAction::Restart,
        Commands::Disable => ServiceAction::Disable,
        Commands::Status => ServiceAction::Status,
        Commands::DaemonReload => ServiceAction::DaemonReload,
    };

    let status = strmatch_setup::lifecycle::run_action(action, cli.non_interactive)?;
    Ok(exit_code(status.success()))
}
