//! Diagnostic tracing.
//!
//! The TUI owns stdout/stderr, so events go to a log file instead. Level comes
//! from `RUST_LOG`, defaulting to `info`:
//!
//! ```bash
//! RUST_LOG=waitris=debug waitris --log-file /tmp/waitris.log
//! tail -f /tmp/waitris.log
//! ```

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Log file used when `--log-file` is not given.
pub fn default_log_path() -> PathBuf {
    std::env::temp_dir().join("waitris.log")
}

fn open_log(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Install the global subscriber writing compact lines to `path`.
/// A subscriber that is already installed is left in place.
pub fn init(path: &Path) -> anyhow::Result<()> {
    let file = open_log(path)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .compact(),
        )
        .try_init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_creates_the_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested.log");
        init(&path).unwrap();
        assert!(path.exists());
        // Second install is a no-op rather than an error.
        init(&path).unwrap();
    }

    #[test]
    fn init_fails_for_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("waitris.log");
        assert!(init(&path).is_err());
    }
}
