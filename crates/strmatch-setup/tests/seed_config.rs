//! Config seeding must never clobber an operator's edits.

#![cfg(unix)]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::fs;
use std::os::unix::fs::PermissionsExt;

use strmatch_core::ServerConfig;
use strmatch_core::config::DEFAULT_CONFIG_TEMPLATE;
use strmatch_setup::service::{SeedOutcome, seed_config};

fn mode(path: &std::path::Path) -> u32 {
    fs::metadata(path).unwrap().permissions().mode() & 0o777
}

#[test]
fn seeds_template_with_owner_only_mode() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("server.toml");

    assert_eq!(
        seed_config(&path, DEFAULT_CONFIG_TEMPLATE).unwrap(),
        SeedOutcome::Seeded
    );
    assert_eq!(fs::read_to_string(&path).unwrap(), DEFAULT_CONFIG_TEMPLATE);
    assert_eq!(mode(&path), 0o600);

    // The shipped template is itself a loadable, valid config.
    let config = ServerConfig::parse(&fs::read_to_string(&path).unwrap()).unwrap();
    config.validate().unwrap();
}

#[test]
fn second_run_preserves_edits_and_mode() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("server.toml");
    seed_config(&path, DEFAULT_CONFIG_TEMPLATE).unwrap();

    let edited = "[server]\nport = 9000\n";
    fs::write(&path, edited).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o640)).unwrap();

    assert_eq!(
        seed_config(&path, DEFAULT_CONFIG_TEMPLATE).unwrap(),
        SeedOutcome::Preserved
    );
    assert_eq!(fs::read_to_string(&path).unwrap(), edited);
    assert_eq!(mode(&path), 0o640);
}
