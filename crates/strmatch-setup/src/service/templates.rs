use crate::config::{InstallConfig, SERVER_BINARY_PATH};

/// Generate the systemd unit for the server, running as `config.user` with
/// `group` (the user's primary group).
pub fn systemd_unit(config: &InstallConfig, group: &str) -> String {
    format!(
        r"[Unit]
Description=strmatch exact-line lookup server
After=network-online.target
Wants=network-online.target

[Service]
Type=notify
User={user}
Group={group}
Environment=STRMATCH_CONFIG={config}
ExecStart={binary} --config {config}
Restart=on-failure
RestartSec=5

# Hardening
NoNewPrivileges=true
ProtectSystem=strict
ProtectHome=true
ReadOnlyPaths={config_dir}
LogsDirectory=strmatch
PrivateTmp=true

[Install]
WantedBy=multi-user.target
",
        user = config.user,
        group = group,
        config = config.config_path.display(),
        config_dir = config.config_dir().display(),
        binary = SERVER_BINARY_PATH,
    )
}
