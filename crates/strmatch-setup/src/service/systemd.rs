use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::Path;

use anyhow::{Context, Result};

use nix::unistd::{Uid, chown};

use crate::cmd::{ServiceAccount, ensure_system_user, lookup_account, run_cmd, user_exists};
use crate::config::{DEFAULT_SERVICE_USER, InstallConfig, SERVER_BINARY_PATH};

use super::templates;

/// systemd unit name.
pub const SERVICE_NAME: &str = "strmatch-server";

/// Path to the systemd service unit file.
pub const SERVICE_UNIT_PATH: &str = "/etc/systemd/system/strmatch-server.service";

/// Directory the default data path lives in.
const DATA_DIR: &str = "/var/lib/strmatch";

/// What [`seed_config`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    /// The file was absent and has been written from the template.
    Seeded,
    /// The file already existed; contents and mode untouched.
    Preserved,
}

/// Write `template` to `path` with mode 0600 unless `path` already exists.
///
/// Uses `O_CREAT | O_EXCL`, so an existing file is never opened for writing.
pub fn seed_config(path: &Path, template: &str) -> Result<SeedOutcome> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let mut file = match OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)
    {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(SeedOutcome::Preserved),
        Err(e) => return Err(e).with_context(|| format!("failed to create {}", path.display())),
    };

    file.write_all(template.as_bytes())
        .with_context(|| format!("failed to write {}", path.display()))?;
    // umask may have cleared bits; pin the mode explicitly.
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    Ok(SeedOutcome::Seeded)
}

/// [`seed_config`], then hand a freshly written file to its owner with
/// `set_owner`. If that fails the file is removed again, so a later run seeds
/// it anew instead of preserving a file the service cannot read.
pub fn seed_owned_config(
    path: &Path,
    template: &str,
    set_owner: impl FnOnce(&Path) -> Result<()>,
) -> Result<SeedOutcome> {
    let outcome = seed_config(path, template)?;
    if outcome == SeedOutcome::Seeded
        && let Err(e) = set_owner(path)
    {
        if let Err(rm) = fs::remove_file(path) {
            tracing::warn!("failed to remove {}: {rm}", path.display());
        }
        return Err(e.context(format!(
            "removed {} after failing to set its owner",
            path.display()
        )));
    }
    Ok(outcome)
}

/// Deploy the server as a systemd service.
/// Assumes we are running as root (enforced by escalate).
pub fn deploy(config: &InstallConfig) -> Result<()> {
    ensure_user(config)?;
    let account = lookup_account(&config.user)?;
    tracing::debug!(
        "service account {} (uid {}), primary group {} (gid {})",
        account.user,
        account.uid,
        account.group,
        account.gid
    );
    seed_server_config(config, &account)?;
    create_data_dir(&account)?;

    let was_active = is_server_active();

    // Stop the running service before overwriting the binary to avoid
    // "Text file busy" (ETXTBSY) on Linux.
    if was_active && config.server_binary.is_some() {
        run_cmd(
            "stopping strmatch-server before binary update",
            "systemctl",
            &["stop", SERVICE_NAME],
        )?;
    }

    install_server_binary(config)?;
    write_systemd_unit(config, &account)?;

    run_cmd(
        "enabling strmatch-server",
        "systemctl",
        &enable_args(config.start),
    )?;
    if was_active {
        run_cmd(
            "restarting strmatch-server",
            "systemctl",
            &["restart", SERVICE_NAME],
        )?;
    }

    if config.start || was_active {
        verify_active();
    } else {
        tracing::info!("service enabled but not started; run `strmatch-setup start` to start it");
    }
    Ok(())
}

/// Stop, disable and remove the unit. The server config is left in place.
pub fn remove(config_path: &Path) -> Result<()> {
    if is_server_active() {
        run_cmd("stopping strmatch-server", "systemctl", &["stop", SERVICE_NAME])?;
    }

    if Path::new(SERVICE_UNIT_PATH).exists() {
        if let Err(e) = run_cmd(
            "disabling strmatch-server",
            "systemctl",
            &["disable", SERVICE_NAME],
        ) {
            tracing::warn!("disable failed, removing unit anyway: {e}");
        }
        tracing::info!("removing {SERVICE_UNIT_PATH}");
        fs::remove_file(SERVICE_UNIT_PATH)
            .with_context(|| format!("failed to remove {SERVICE_UNIT_PATH}"))?;
    } else {
        tracing::info!("{SERVICE_UNIT_PATH} not present");
    }

    run_cmd("reloading systemd daemon", "systemctl", &["daemon-reload"])?;
    tracing::info!(
        "config preserved at {}; remove it manually if no longer needed",
        config_path.display()
    );
    Ok(())
}

/// Check whether the strmatch-server unit is active.
pub fn is_server_active() -> bool {
    std::process::Command::new("systemctl")
        .args(["is-active", "--quiet", SERVICE_NAME])
        .status()
        .is_ok_and(|s| s.success())
}

/// `systemctl` arguments for enabling the unit.
pub fn enable_args(start: bool) -> Vec<&'static str> {
    if start {
        vec!["enable", "--now", SERVICE_NAME]
    } else {
        vec!["enable", SERVICE_NAME]
    }
}

fn ensure_user(config: &InstallConfig) -> Result<()> {
    if config.user == DEFAULT_SERVICE_USER {
        return ensure_system_user(&config.user);
    }
    if !user_exists(&config.user) {
        anyhow::bail!(
            "system user '{}' does not exist; create it first or use the default '{DEFAULT_SERVICE_USER}' user",
            config.user
        );
    }
    tracing::debug!("using existing system user '{}'", config.user);
    Ok(())
}

fn seed_server_config(config: &InstallConfig, account: &ServiceAccount) -> Result<()> {
    let path = &config.config_path;
    let outcome = seed_owned_config(
        path,
        strmatch_core::config::DEFAULT_CONFIG_TEMPLATE,
        |p| {
            chown(p, Some(account.uid), Some(account.gid)).with_context(|| {
                format!(
                    "failed to chown {} to {}:{}",
                    p.display(),
                    account.user,
                    account.group
                )
            })
        },
    )?;
    match outcome {
        SeedOutcome::Seeded => {
            tracing::info!(
                "wrote default config: {} ({}:{}, 0600)",
                path.display(),
                account.user,
                account.group
            );
        }
        SeedOutcome::Preserved => {
            tracing::warn!(
                "existing {} preserved; to regenerate, delete it and re-run install",
                path.display()
            );
        }
    }
    Ok(())
}

fn create_data_dir(account: &ServiceAccount) -> Result<()> {
    tracing::info!("creating directory: {DATA_DIR}");
    fs::create_dir_all(DATA_DIR).with_context(|| format!("failed to create {DATA_DIR}"))?;
    fs::set_permissions(DATA_DIR, fs::Permissions::from_mode(0o750))
        .with_context(|| format!("failed to set permissions on {DATA_DIR}"))?;
    chown(DATA_DIR, Some(Uid::from_raw(0)), Some(account.gid))
        .with_context(|| format!("failed to chown {DATA_DIR} to root:{}", account.group))
}

fn install_server_binary(config: &InstallConfig) -> Result<()> {
    let dest = SERVER_BINARY_PATH;

    let Some(src) = config.server_binary.as_ref() else {
        if Path::new(dest).exists() {
            tracing::info!("using existing server binary at {dest}");
            return Ok(());
        }
        anyhow::bail!("server binary not found at {dest} and --server-binary not provided");
    };

    tracing::info!("installing server binary: {} -> {dest}", src.display());
    fs::copy(src, dest).with_context(|| format!("failed to copy {} to {dest}", src.display()))?;
    fs::set_permissions(dest, fs::Permissions::from_mode(0o755))
        .context("failed to set permissions on server binary")?;
    Ok(())
}

fn write_systemd_unit(config: &InstallConfig, account: &ServiceAccount) -> Result<()> {
    tracing::info!("writing systemd unit: {SERVICE_UNIT_PATH}");
    fs::write(
        SERVICE_UNIT_PATH,
        templates::systemd_unit(config, &account.group),
    )
        .context("failed to write systemd unit")?;
    run_cmd("reloading systemd daemon", "systemctl", &["daemon-reload"])
}

fn verify_active() {
    if is_server_active() {
        tracing::info!("strmatch-server is deployed and running");
    } else {
        tracing::warn!(
            "service may not have started correctly; check: strmatch-setup logs --lines 50"
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn service_unit_path_is_systemd_location() {
        assert_eq!(
            SERVICE_UNIT_PATH,
            "/etc/systemd/system/strmatch-server.service"
        );
    }

    #[test]
    fn enable_args_add_now_only_when_starting() {
        assert_eq!(enable_args(false), ["enable", "strmatch-server"]);
        assert_eq!(enable_args(true), ["enable", "--now", "strmatch-server"]);
    }

    #[test]
    fn failed_chown_removes_seeded_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.toml");

        let err = seed_owned_config(&path, "x = 1\n", |_| anyhow::bail!("invalid group"))
            .unwrap_err();
        assert!(format!("{err:#}").contains("invalid group"), "{err:#}");
        assert!(!path.exists());

        // The next run seeds again rather than preserving a root-owned file.
        assert_eq!(
            seed_owned_config(&path, "x = 1\n", |_| Ok(())).unwrap(),
            SeedOutcome::Seeded
        );
    }

    #[test]
    fn preserved_file_skips_ownership_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.toml");
        fs::write(&path, "edited\n").unwrap();

        let outcome = seed_owned_config(&path, "x = 1\n", |_| {
            panic!("owner must not change for a preserved config")
        })
        .unwrap();
        assert_eq!(outcome, SeedOutcome::Preserved);
        assert_eq!(fs::read_to_string(&path).unwrap(), "edited\n");
    }

    #[test]
    fn seed_creates_missing_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("etc/strmatch/server.toml");
        assert_eq!(seed_config(&path, "x = 1\n").unwrap(), SeedOutcome::Seeded);
        assert_eq!(fs::read_to_string(&path).unwrap(), "x = 1\n");
    }
}
