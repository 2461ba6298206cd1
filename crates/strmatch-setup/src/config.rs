use std::path::PathBuf;

use anyhow::{Result, bail};

/// Service user created by `install` when no other is requested.
pub const DEFAULT_SERVICE_USER: &str = "strmatch";

/// Installed server binary location.
pub const SERVER_BINARY_PATH: &str = "/usr/local/bin/strmatch-server";

/// Configuration collected for a systemd install.
#[derive(Debug, Clone)]
pub struct InstallConfig {
    /// Server config file; seeded from the bundled template when absent.
    pub config_path: PathBuf,
    /// Account the service runs as.
    pub user: String,
    /// Binary to copy to [`SERVER_BINARY_PATH`].
    pub server_binary: Option<PathBuf>,
    /// Start the service immediately after enabling it.
    pub start: bool,
}

impl InstallConfig {
    /// Validate the configuration. Returns an error on invalid values.
    pub fn validate(&self) -> Result<()> {
        if !self.config_path.is_absolute() {
            bail!(
                "config path must be absolute (got {})",
                self.config_path.display()
            );
        }
        if self.user.is_empty() || self.user.contains(char::is_whitespace) {
            bail!("invalid service user '{}'", self.user);
        }
        if let Some(binary) = &self.server_binary
            && !binary.is_file()
        {
            bail!("server binary not found: {}", binary.display());
        }
        Ok(())
    }

    /// Directory holding the config file.
    pub fn config_dir(&self) -> PathBuf {
        self.config_path
            .parent()
            .map_or_else(|| PathBuf::from("/"), PathBuf::from)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn config() -> InstallConfig {
        InstallConfig {
            config_path: PathBuf::from("/etc/strmatch/server.toml"),
            user: DEFAULT_SERVICE_USER.into(),
            server_binary: None,
            start: false,
        }
    }

    #[test]
    fn default_config_is_valid() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn relative_config_path_is_rejected() {
        let mut c = config();
        c.config_path = PathBuf::from("server.toml");
        assert!(c.validate().is_err());
    }

    #[test]
    fn missing_binary_is_rejected() {
        let mut c = config();
        c.server_binary = Some(PathBuf::from("/nonexistent/strmatch-server"));
        assert!(c.validate().is_err());
    }

    #[test]
    fn blank_user_is_rejected() {
        let mut c = config();
        c.user = "bad user".into();
        assert!(c.validate().is_err());
    }

    #[test]
    fn config_dir_is_parent() {
        assert_eq!(config().config_dir(), PathBuf::from("/etc/strmatch"));
    }
}
