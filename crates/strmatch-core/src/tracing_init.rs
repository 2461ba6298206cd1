//! Shared tracing/logging initialization.
//!
//! Both strmatch-server and strmatch-setup use the same pattern for setting
//! up `tracing_subscriber` with an env-filter and optional JSON output.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Arc;

use tracing::Subscriber;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::fmt::format::{DefaultFields, Format};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialise the global tracing subscriber.
///
/// * `default_filter` -- default `RUST_LOG` value when the env-var is not set
///   (e.g. `"strmatch_server=info"`).
/// * `log_json` -- when `true`, emit structured JSON log lines instead of the
///   human-readable format.
/// * `log_file` -- when set, every event is also appended to this file as
///   plain text.
pub fn init_tracing(
    default_filter: &str,
    log_json: bool,
    log_file: Option<&Path>,
) -> std::io::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
    );

    let file = log_file.map(open_log_file).transpose()?.map(Arc::new);

    if log_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .with(file.map(file_layer))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer())
            .with(file.map(file_layer))
            .init();
    }
    Ok(())
}

/// Open `path` for appending, creating it and any missing parent
/// directories. Existing content is kept; the file is never rotated.
pub fn open_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Plain-text layer for the log file.
fn file_layer<S>(file: Arc<File>) -> fmt::Layer<S, DefaultFields, Format, Arc<File>>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer().with_writer(file).with_ansi(false)
}

/// Build the default filter directive for a binary given the `debug` flag.
pub fn default_filter(crate_name: &str, debug: bool) -> String {
    let level = if debug { "debug" } else { "info" };
    format!("{crate_name}={level},strmatch_core={level}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::io::Write;

    use tracing_subscriber::layer::SubscriberExt;

    use super::*;

    #[test]
    fn log_file_parents_are_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("var/log/strmatch/server.log");
        open_log_file(&path).unwrap();
        assert!(path.is_file());
    }

    #[test]
    fn log_file_is_appended_not_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.log");
        std::fs::write(&path, "earlier run\n").unwrap();

        let mut file = open_log_file(&path).unwrap();
        file.write_all(b"this run\n").unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "earlier run\nthis run\n"
        );
    }

    #[test]
    fn file_layer_writes_plain_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.log");
        let file = Arc::new(open_log_file(&path).unwrap());

        let subscriber = tracing_subscriber::registry().with(file_layer(file));
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(peer = "127.0.0.1:4000", "Query handled");
        });

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("Query handled"), "{written}");
        assert!(written.contains("peer=\"127.0.0.1:4000\""), "{written}");
        assert!(!written.contains('\x1b'), "{written:?}");
    }

    #[test]
    fn default_filter_info() {
        assert_eq!(
            default_filter("strmatch_server", false),
            "strmatch_server=info,strmatch_core=info"
        );
    }

    #[test]
    fn default_filter_debug() {
        assert_eq!(
            default_filter("strmatch_server", true),
            "strmatch_server=debug,strmatch_core=debug"
        );
    }
}
