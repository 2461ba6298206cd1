use std::process::{Command, ExitStatus};

use anyhow::{Context, Result, anyhow, bail};
use nix::unistd::{Gid, Group, Uid, User};

/// Execute a command with logging. Logs the full command line at debug level
/// and a human-friendly description at info level.
pub fn run_cmd(description: &str, program: &str, args: &[&str]) -> Result<()> {
    let cmd_line = format!("{program} {}", args.join(" "));
    tracing::info!("{description}");
    tracing::debug!("exec: {cmd_line}");

    let output = Command::new(program)
        .args(args)
        .output()
        .with_context(|| format!("failed to execute: {cmd_line}"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        tracing::error!("command failed: {cmd_line}\nstderr: {stderr}");
        bail!("{description} failed (exit {}): {stderr}", output.status);
    }
    Ok(())
}

/// Execute a command attached to the current terminal and return its exit
/// status without treating failure as an error (`systemctl status` exits
/// non-zero for stopped units).
pub fn run_interactive<S: AsRef<str>>(program: &str, args: &[S]) -> Result<ExitStatus> {
    let args: Vec<&str> = args.iter().map(AsRef::as_ref).collect();
    let cmd_line = format!("{program} {}", args.join(" "));
    tracing::debug!("exec (interactive): {cmd_line}");

    Command::new(program)
        .args(&args)
        .status()
        .with_context(|| format!("failed to execute: {cmd_line}"))
}

/// Check whether a program exists on PATH.
pub fn command_exists(program: &str) -> bool {
    Command::new("which")
        .arg(program)
        .output()
        .is_ok_and(|o| o.status.success())
}

/// Check whether a local account exists.
pub fn user_exists(user: &str) -> bool {
    matches!(User::from_name(user), Ok(Some(_)))
}

/// A local account and its primary group, as recorded in the user database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceAccount {
    pub user: String,
    /// Primary group name, or the numeric gid when the group has no entry.
    pub group: String,
    pub uid: Uid,
    pub gid: Gid,
}

/// Look up `name` and resolve its primary group. The group name need not
/// match the user name.
pub fn lookup_account(name: &str) -> Result<ServiceAccount> {
    let user = User::from_name(name)
        .with_context(|| format!("failed to look up user '{name}'"))?
        .ok_or_else(|| anyhow!("system user '{name}' does not exist"))?;
    let group = Group::from_gid(user.gid)
        .with_context(|| format!("failed to look up group {}", user.gid))?
        .map_or_else(|| user.gid.to_string(), |g| g.name);
    Ok(ServiceAccount {
        user: user.name,
        group,
        uid: user.uid,
        gid: user.gid,
    })
}

/// Create `user` as a system account with no login shell if it is missing.
pub fn ensure_system_user(user: &str) -> Result<()> {
    if user_exists(user) {
        tracing::debug!("system user '{user}' already exists");
        return Ok(());
    }
    run_cmd(
        &format!("creating system user '{user}'"),
        "useradd",
        &[
            "--system",
            "--no-create-home",
            "--shell",
            "/usr/sbin/nologin",
            "--user-group",
            user,
        ],
    )
}
