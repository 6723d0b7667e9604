//! Log file setup.
//
// The host owns stdout (or has none), so everything goes to a plain-text
// file next to the host executable. The filter is read from FRAMEGEN_LOG
// and defaults to `info`.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;

pub const LOG_FILE: &str = "framegen.log";
pub const FILTER_ENV: &str = "FRAMEGEN_LOG";
const DEFAULT_FILTER: &str = "info";

static INSTALLED: OnceCell<PathBuf> = OnceCell::new();

/// Install the global subscriber writing to `path`, truncating any previous
/// log. Later calls return the path of the first successful call.
pub fn init(path: &Path) -> Result<&'static Path> {
    let installed = INSTALLED.get_or_try_init(|| -> Result<PathBuf> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .with_context(|| format!("opening {}", path.display()))?;

        tracing_subscriber::fmt()
            .with_env_filter(filter(std::env::var(FILTER_ENV).ok().as_deref()))
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(true)
            .try_init()
            .map_err(|e| anyhow::anyhow!("installing subscriber: {e}"))?;

        tracing::info!(
            "framegen {} logging to {}",
            env!("CARGO_PKG_VERSION"),
            path.display()
        );
        Ok(path.to_path_buf())
    })?;
    Ok(installed.as_path())
}

/// `framegen.log` in the directory of `module_path`.
pub fn default_path(module_path: &Path) -> PathBuf {
    module_path
        .parent()
        .map(|dir| dir.join(LOG_FILE))
        .unwrap_or_else(|| PathBuf::from(LOG_FILE))
}

fn filter(directives: Option<&str>) -> EnvFilter {
    match directives {
        Some(directives) if !directives.trim().is_empty() => EnvFilter::try_new(directives)
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
        _ => EnvFilter::new(DEFAULT_FILTER),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_file_sits_beside_the_module() {
        assert_eq!(
            default_path(Path::new("/games/title/game.exe")),
            PathBuf::from("/games/title").join(LOG_FILE)
        );
    }

    #[test]
    fn second_init_keeps_the_first_file() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.log");
        let second = dir.path().join("second.log");

        let installed = init(&first).unwrap();
        assert_eq!(installed, first.as_path());
        assert_eq!(init(&second).unwrap(), first.as_path());
        assert!(!second.exists());

        tracing::info!("written after init");
        assert!(first.exists());
    }

    #[test]
    fn bad_filter_falls_back_to_info() {
        assert_eq!(filter(Some("fg_interop=loud")).to_string(), DEFAULT_FILTER);
        assert_eq!(filter(None).to_string(), DEFAULT_FILTER);
        assert_eq!(filter(Some("  ")).to_string(), DEFAULT_FILTER);
        assert_eq!(filter(Some("fg_interop=debug")).to_string(), "fg_interop=debug");
    }
}
