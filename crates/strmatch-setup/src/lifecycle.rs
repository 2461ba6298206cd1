//! Day-to-day service control: systemctl verbs and journal access.

use std::process::ExitStatus;

use anyhow::Result;
use clap::Args;

use crate::cmd::run_interactive;

/// systemd unit managed by these commands.
const UNIT: &str = "strmatch-server";

/// A `systemctl` verb applied to the server unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceAction {
    Start,
    Stop,
    Restart,
    Disable,
    Status,
    DaemonReload,
}

impl ServiceAction {
    fn verb(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
            Self::Disable => "disable",
            Self::Status => "status",
            Self::DaemonReload => "daemon-reload",
        }
    }

    /// Whether the action changes system state and so needs root.
    pub const fn mutates(self) -> bool {
        !matches!(self, Self::Status)
    }

    /// Arguments passed to `systemctl`.
    pub fn systemctl_args(self) -> Vec<&'static str> {
        match self {
            Self::DaemonReload => vec![self.verb()],
            Self::Status => vec![self.verb(), "--no-pager", UNIT],
            _ => vec![self.verb(), UNIT],
        }
    }
}

/// Arguments for the `logs` subcommand.
#[derive(Debug, Default, Args)]
pub struct LogsArgs {
    /// Show entries since this time (journalctl syntax, e.g. "1 hour ago")
    #[arg(long)]
    pub since: Option<String>,

    /// Show entries until this time
    #[arg(long)]
    pub until: Option<String>,

    /// Follow new entries
    #[arg(short, long)]
    pub follow: bool,

    /// Number of most recent entries to show
    #[arg(short = 'n', long)]
    pub lines: Option<u32>,
}

impl LogsArgs {
    /// Arguments passed to `journalctl`.
    pub fn journal_args(&self) -> Vec<String> {
        let mut args = vec!["-u".to_string(), UNIT.to_string(), "--no-pager".to_string()];
        if let Some(since) = &self.since {
            args.extend(["--since".to_string(), since.clone()]);
        }
        if let Some(until) = &self.until {
            args.extend(["--until".to_string(), until.clone()]);
        }
        if let Some(lines) = self.lines {
            args.extend(["-n".to_string(), lines.to_string()]);
        }
        if self.follow {
            args.push("-f".to_string());
        }
        args
    }
}

/// Run a `systemctl` verb, escalating first when it needs root.
pub fn run_action(action: ServiceAction, non_interactive: bool) -> Result<ExitStatus> {
    if action.mutates() {
        crate::escalate::escalate_if_needed(action.verb(), non_interactive)?;
    }
    tracing::debug!("systemctl {}", action.verb());
    run_interactive("systemctl", &action.systemctl_args())
}

/// Show the server's journal.
pub fn run_logs(args: &LogsArgs) -> Result<ExitStatus> {
    run_interactive("journalctl", &args.journal_args())
}
