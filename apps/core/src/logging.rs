use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::OnceLock;

use thiserror::Error;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;

pub const LOG_FILE_NAME: &str = "sift.jsonl";

static PANIC_HOOK_INSTALLED: OnceLock<()> = OnceLock::new();

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("log file unavailable: {0}")]
    Io(#[from] std::io::Error),
    #[error("global subscriber already installed: {0}")]
    AlreadyInstalled(#[from] TryInitError),
}

/// Keeps the non-blocking file writer alive. Dropping it flushes the log.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
    pub log_path: PathBuf,
}

pub fn log_path(cfg: &Config) -> PathBuf {
    cfg.logs_dir().join(LOG_FILE_NAME)
}

/// Installs the global subscriber: JSON lines to `<data dir>/logs/sift.jsonl`
/// and compact human output on stderr. `RUST_LOG` overrides `cfg.log_level`.
pub fn init(cfg: &Config) -> Result<LoggingGuard, LoggingError> {
    let log_dir = cfg.logs_dir();
    fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join(LOG_FILE_NAME);

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.log_level));

    let json_layer = fmt::layer()
        .json()
        .with_writer(non_blocking_file)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_target(true)
        .with_level(true)
        .with_thread_names(true);

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(stderr_layer)
        .try_init()?;

    install_panic_hook();
    info!(log_path = %log_path.display(), "logging initialized");

    Ok(LoggingGuard {
        _file_guard: file_guard,
        log_path,
    })
}

fn install_panic_hook() {
    let _ = PANIC_HOOK_INSTALLED.get_or_init(|| {
        let prior = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |panic_info| {
            let location = panic_info
                .location()
                .map(|l| format!("{}:{}", l.file(), l.line()))
                .unwrap_or_else(|| "unknown".to_string());
            let payload = panic_info
                .payload()
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| panic_info.payload().downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "panic payload unavailable".to_string());
            error!(%location, %payload, "panic");
            prior(panic_info);
        }));
    });
}

/// Turns an ignorable failure into a logged `None`.
pub trait ResultExt<T> {
    fn log_err(self) -> Option<T>;
    fn warn_on_err(self) -> Option<T>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    #[track_caller]
    fn log_err(self) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(err) => {
                let caller = std::panic::Location::caller();
                error!(
                    error = %err,
                    file = caller.file(),
                    line = caller.line(),
                    "operation failed"
                );
                None
            }
        }
    }

    #[track_caller]
    fn warn_on_err(self) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(err) => {
                let caller = std::panic::Location::caller();
                warn!(
                    error = %err,
                    file = caller.file(),
                    line = caller.line(),
                    "operation failed"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{log_path, ResultExt};
    use crate::config::Config;

    #[test]
    fn log_file_lives_under_data_dir() {
        let cfg = Config {
            data_dir: "/var/lib/sift".into(),
            ..Config::default()
        };
        assert_eq!(
            log_path(&cfg),
            std::path::Path::new("/var/lib/sift/logs/sift.jsonl")
        );
    }

    #[test]
    fn log_err_keeps_ok_values() {
        let ok: Result<u8, String> = Ok(3);
        assert_eq!(ok.log_err(), Some(3));
        let failed: Result<u8, String> = Err("disk full".into());
        assert_eq!(failed.warn_on_err(), None);
    }
}
