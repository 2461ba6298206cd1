use std::env;
use std::ffi::OsString;
use std::process::Command;

use anyhow::{Result, bail};
use dialoguer::Confirm;
use nix::unistd::geteuid;

/// Environment passed through sudo so the re-run sees the same log filter.
const PRESERVED_ENV: &str = "--preserve-env=RUST_LOG";

/// Check if the current process is running as root.
pub fn is_root() -> bool {
    geteuid().is_root()
}

/// If not root, prompt and re-exec the current command line via sudo.
/// On success this exits with sudo's status and does not return.
pub fn escalate_if_needed(action: &str, non_interactive: bool) -> Result<()> {
    if is_root() {
        return Ok(());
    }

    if non_interactive {
        bail!("{action} requires root privileges. Re-run with sudo.");
    }

    let confirmed = Confirm::new()
        .with_prompt(format!("{action} requires root privileges. Re-run with sudo?"))
        .default(true)
        .interact()?;
    if !confirmed {
        bail!("root privileges declined. Re-run manually with sudo.");
    }

    let args = sudo_args(env::current_exe()?.into_os_string(), env::args_os().skip(1));
    tracing::info!("re-executing with sudo");
    tracing::debug!(
        "exec: sudo {}",
        args.iter()
            .map(|a| a.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    );

    let status = Command::new("sudo").args(&args).status()?;
    std::process::exit(status.code().unwrap_or(1));
}

/// Arguments for `sudo` that re-run `exe` with `args`.
fn sudo_args(exe: OsString, args: impl Iterator<Item = OsString>) -> Vec<OsString> {
    let mut out = vec![OsString::from(PRESERVED_ENV), OsString::from("--"), exe];
    out.extend(args);
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn sudo_args_rerun_same_command() {
        let args = sudo_args(
            "/usr/local/bin/strmatch-setup".into(),
            ["install", "--start"].into_iter().map(OsString::from),
        );
        assert_eq!(
            args,
            [
                "--preserve-env=RUST_LOG",
                "--",
                "/usr/local/bin/strmatch-setup",
                "install",
                "--start",
            ]
        );
    }

    #[test]
    fn non_interactive_refuses_without_root() {
        if is_root() {
            return;
        }
        let err = escalate_if_needed("install", true).unwrap_err();
        assert!(err.to_string().contains("install requires root"));
    }
}
