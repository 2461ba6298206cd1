//! Server configuration.
//!
//! Resolution order:
//! 1. Built-in defaults
//! 2. Config file (TOML)
//! 3. Environment variables (`STRMATCH_*`)
//!
//! Relative paths in the file are resolved against the file's directory.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::protocol::DEFAULT_MAX_PAYLOAD;
use crate::search::Algorithm;

/// Bundled default configuration, used to seed a fresh install.
pub const DEFAULT_CONFIG_TEMPLATE: &str = include_str!("../config/default.toml");

/// Default location of the server configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/strmatch/server.toml";

/// Complete server configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server: ListenConfig,
    pub tls: TlsConfig,
    pub request: RequestConfig,
    pub logging: LoggingConfig,
    pub files: FilesConfig,
    pub query: QueryConfig,
}

/// Listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    pub host: String,
    pub port: u16,
    pub max_connections: usize,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            max_connections: 256,
        }
    }
}

/// TLS settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    pub enabled: bool,
    pub cert: PathBuf,
    pub key: PathBuf,
    pub ca: Option<PathBuf>,
}

/// Per-request limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    pub max_payload: usize,
    pub read_timeout_secs: u64,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            max_payload: DEFAULT_MAX_PAYLOAD,
            read_timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub debug: bool,
    pub json: bool,
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    pub data_path: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub reread_on_query: bool,
    pub algorithm: Algorithm,
}

impl ServerConfig {
    /// Load the config file at `path`, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {e}", path.display()))
        })?;
        let mut config = Self::parse(&content).map_err(|e| {
            Error::Config(format!("Failed to parse config file {}: {e}", path.display()))
        })?;

        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        config.resolve_paths(base_dir);
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse TOML text without touching paths or the environment.
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Make every relative path absolute with respect to `base_dir`.
    pub fn resolve_paths(&mut self, base_dir: &Path) {
        resolve(&mut self.files.data_path, base_dir);
        resolve(&mut self.tls.cert, base_dir);
        resolve(&mut self.tls.key, base_dir);
        if let Some(ca) = self.tls.ca.as_mut() {
            resolve(ca, base_dir);
        }
        if let Some(log_file) = self.logging.log_file.as_mut() {
            resolve(log_file, base_dir);
        }
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply `STRMATCH_*` overrides using `lookup` as the variable source.
    /// Unparsable values are ignored with a warning.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("STRMATCH_HOST") {
            self.server.host = val;
        }
        if let Some(val) = lookup("STRMATCH_PORT") {
            match val.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!(value = %val, "Ignoring invalid STRMATCH_PORT"),
            }
        }
        if let Some(val) = lookup("STRMATCH_DATA_PATH") {
            self.files.data_path = PathBuf::from(val);
        }
        if let Some(val) = lookup("STRMATCH_REREAD_ON_QUERY") {
            match parse_bool(&val) {
                Some(b) => self.query.reread_on_query = b,
                None => {
                    tracing::warn!(value = %val, "Ignoring invalid STRMATCH_REREAD_ON_QUERY");
                }
            }
        }
        if let Some(val) = lookup("STRMATCH_DEBUG") {
            match parse_bool(&val) {
                Some(b) => self.logging.debug = b,
                None => tracing::warn!(value = %val, "Ignoring invalid STRMATCH_DEBUG"),
            }
        }
    }

    /// Check invariants the server relies on.
    pub fn validate(&self) -> Result<()> {
        if self.server.host.trim().is_empty() {
            return Err(Error::Config("server.host must not be empty".into()));
        }
        if self.server.port == 0 {
            return Err(Error::Config("server.port must not be 0".into()));
        }
        if self.server.max_connections == 0 {
            return Err(Error::Config(
                "server.max_connections must be at least 1".into(),
            ));
        }
        if self.request.max_payload == 0 {
            return Err(Error::Config("request.max_payload must be at least 1".into()));
        }
        if self.request.read_timeout_secs == 0 {
            return Err(Error::Config(
                "request.read_timeout_secs must be at least 1".into(),
            ));
        }
        if self.files.data_path.as_os_str().is_empty() {
            return Err(Error::Config("files.data_path must be set".into()));
        }
        if self.tls.enabled
            && (self.tls.cert.as_os_str().is_empty() || self.tls.key.as_os_str().is_empty())
        {
            return Err(Error::Config(
                "tls.cert and tls.key are required when TLS is enabled".into(),
            ));
        }
        Ok(())
    }

    /// Resolve `host:port` to a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        use std::net::ToSocketAddrs;

        (self.server.host.as_str(), self.server.port)
            .to_socket_addrs()
            .map_err(|e| {
                Error::Config(format!(
                    "Invalid bind address {}:{}: {e}",
                    self.server.host, self.server.port
                ))
            })?
            .next()
            .ok_or_else(|| {
                Error::Config(format!(
                    "Bind address {}:{} resolved to nothing",
                    self.server.host, self.server.port
                ))
            })
    }
}

fn resolve(path: &mut PathBuf, base_dir: &Path) {
    if !path.as_os_str().is_empty() && path.is_relative() {
        *path = base_dir.join(&*path);
    }
}

/// Parse a boolean the way INI-style configs spell them.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = ServerConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.request.max_payload, 1024);
        assert!(!config.tls.enabled);
        assert!(!config.query.reread_on_query);
        assert_eq!(config.query.algorithm, Algorithm::Jump);
    }

    #[test]
    fn bundled_template_parses_and_validates() {
        let config = ServerConfig::parse(DEFAULT_CONFIG_TEMPLATE).unwrap();
        config.validate().unwrap();
        assert_eq!(config.files.data_path, PathBuf::from("/var/lib/strmatch/data.txt"));
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let config = ServerConfig::parse("[server]\nport = 9000\n").unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.request.max_payload, 1024);
    }

    #[test]
    fn algorithm_is_read_from_query_section() {
        let config = ServerConfig::parse("[query]\nalgorithm = \"set\"\n").unwrap();
        assert_eq!(config.query.algorithm, Algorithm::Set);
        assert!(ServerConfig::parse("[query]\nalgorithm = \"fuzzy\"\n").is_err());
    }

    #[test]
    fn load_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ServerConfig::load(&dir.path().join("nope.toml")).unwrap_err();
        assert!(err.to_string().contains("Config file not found"), "got: {err}");
    }

    #[test]
    fn load_resolves_relative_paths_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.toml");
        std::fs::write(
            &path,
            "[files]\ndata_path = \"data/200k.txt\"\n[tls]\ncert = \"/abs/server.crt\"\nkey = \"tls/server.key\"\n",
        )
        .unwrap();

        let config = ServerConfig::load(&path).unwrap();
        assert_eq!(config.files.data_path, dir.path().join("data/200k.txt"));
        assert_eq!(config.tls.cert, PathBuf::from("/abs/server.crt"));
        assert_eq!(config.tls.key, dir.path().join("tls/server.key"));
    }

    #[test]
    fn env_overrides_apply() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("STRMATCH_HOST", "0.0.0.0"),
            ("STRMATCH_PORT", "9443"),
            ("STRMATCH_REREAD_ON_QUERY", "True"),
            ("STRMATCH_DATA_PATH", "/srv/data.txt"),
        ]);
        let mut config = ServerConfig::default();
        config.apply_overrides_from(|k| vars.get(k).map(ToString::to_string));

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9443);
        assert!(config.query.reread_on_query);
        assert_eq!(config.files.data_path, PathBuf::from("/srv/data.txt"));
    }

    #[test]
    fn invalid_env_values_are_ignored() {
        let mut config = ServerConfig::default();
        config.apply_overrides_from(|k| match k {
            "STRMATCH_PORT" => Some("not-a-port".into()),
            "STRMATCH_DEBUG" => Some("maybe".into()),
            _ => None,
        });
        assert_eq!(config.server.port, 8080);
        assert!(!config.logging.debug);
    }

    #[test]
    fn validate_rejects_tls_without_material() {
        let mut config = ServerConfig::default();
        config.files.data_path = PathBuf::from("/data.txt");
        config.tls.enabled = true;
        assert!(config.validate().is_err());

        config.tls.cert = PathBuf::from("/c.pem");
        config.tls.key = PathBuf::from("/k.pem");
        config.validate().unwrap();
    }

    #[test]
    fn validate_requires_data_path() {
        let config = ServerConfig::default();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("data_path"));
    }

    #[test]
    fn parse_bool_accepts_ini_spellings() {
        assert_eq!(parse_bool("True"), Some(true));
        assert_eq!(parse_bool("on"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("No"), Some(false));
        assert_eq!(parse_bool("2"), None);
    }

    #[test]
    fn bind_addr_resolves_ip_host() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr().unwrap(), "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
    }
}
