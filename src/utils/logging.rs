use std::{
    env,
    fs::{self, File, OpenOptions},
    io,
    path::Path,
    sync::Mutex,
};

use thiserror::Error;
use tracing::subscriber::{set_global_default, SetGlobalDefaultError};
use tracing_subscriber::{
    filter::{EnvFilter, ParseError},
    fmt::{self, time::ChronoLocal},
    layer::SubscriberExt,
};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter: {0}")]
    InvalidFilter(#[from] ParseError),
    #[error("cannot open log file {path}: {source}")]
    LogFile { path: String, source: io::Error },
    #[error("cannot install tracing subscriber: {0}")]
    Subscriber(#[from] SetGlobalDefaultError),
}

/// Installs the global subscriber: a console layer on stderr and, when
/// `log_file` is given, a second layer appending to that file.
///
/// `CERTMNG_LOG` or `RUST_LOG` overrides the level picked by `debug`.
pub fn init(debug: bool, log_file: Option<&Path>) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_new(filter_directive(debug))?;

    let console = fmt::layer()
        .with_writer(io::stderr)
        .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
        .with_target(debug);

    let file = match log_file {
        Some(path) => Some(
            fmt::layer()
                .with_writer(Mutex::new(open_log_file(path)?))
                .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
                .with_ansi(false),
        ),
        None => None,
    };

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file);
    set_global_default(subscriber)?;
    Ok(())
}

fn filter_directive(debug: bool) -> String {
    env::var("CERTMNG_LOG")
        .or_else(|_| env::var("RUST_LOG"))
        .unwrap_or_else(|_| if debug { "debug" } else { "info" }.to_string())
}

fn open_log_file(path: &Path) -> Result<File, LoggingError> {
    let failed = |source| LoggingError::LogFile {
        path: path.display().to_string(),
        source,
    };

    // Create log directory if it doesn't exist
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(failed)?;
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(failed)
}
