use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter directives.
pub const LOG_FILTER_ENV: &str = "HUSH_LOG";
const DEFAULT_FILTER: &str = "info";

/// Installs the global subscriber, appending to `path`.
///
/// The terminal belongs to the TUI, so nothing is ever written to stdout or stderr.
pub fn init(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create log directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open log file {}", path.display()))?;

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(build_env_filter(std::env::var(LOG_FILTER_ENV).ok()))
        .with_ansi(false)
        .with_target(true)
        .with_writer(Mutex::new(file))
        .finish();

    tracing::subscriber::set_global_default(subscriber).context("install log subscriber")?;
    Ok(())
}

fn build_env_filter(directives: Option<String>) -> EnvFilter {
    let directives = directives
        .map(|directives| directives.trim().to_string())
        .filter(|directives| !directives.is_empty());
    match directives {
        Some(directives) => EnvFilter::try_new(&directives)
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
        None => EnvFilter::new(DEFAULT_FILTER),
    }
}
