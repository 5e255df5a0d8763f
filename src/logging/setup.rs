use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, Subscriber};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use super::formatter::BracketedFormatter;

/// `RUST_LOG` when set, else debug for this crate and warn for everything else
fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,{}=debug", env!("CARGO_CRATE_NAME"))))
}

/// Install the global subscriber: one timestamped log file under `log_dir`
/// plus stdout, both filtered by [`env_filter`].
///
/// Returns the path of the log file that was created.
pub fn setup_logging(log_dir: &Path) -> std::io::Result<PathBuf> {
    fs::create_dir_all(log_dir)?;

    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let log_path = log_dir.join(format!("breed_prep_{}.log", timestamp));

    let file = fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&log_path)?;

    let file_layer = fmt::layer()
        .event_format(BracketedFormatter::file())
        .with_writer(Mutex::new(file))
        .with_ansi(false);

    let stdout_layer = fmt::layer()
        .event_format(BracketedFormatter::stdout())
        .with_writer(std::io::stdout);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(file_layer)
        .with(stdout_layer)
        .init();

    info!("Log file created at: {:?}", log_path);

    Ok(log_path)
}

/// Subscriber with only the stdout layer
pub fn stdout_subscriber() -> impl Subscriber + Send + Sync + 'static {
    tracing_subscriber::registry().with(env_filter()).with(
        fmt::layer()
            .event_format(BracketedFormatter::stdout())
            .with_writer(std::io::stdout),
    )
}

/// Fallback when the log file cannot be created, so warnings still reach
/// the terminal
pub fn setup_stdout_logging() {
    stdout_subscriber().init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unwritable_log_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("logs");
        fs::write(&blocker, b"not a directory").unwrap();
        assert!(setup_logging(&blocker).is_err());
    }

    #[test]
    fn test_stdout_subscriber_keeps_warnings() {
        tracing::subscriber::with_default(stdout_subscriber(), || {
            assert!(tracing::enabled!(tracing::Level::WARN));
        });
    }
}
