//! Tracing configuration and log routing.
//!
//! Every workflow runs inside a `workflow` span keyed by its document reference. Both layers
//! report that span when it closes, so each document gets one summary line with its busy and
//! idle time alongside the stage events logged inside it.
//!
//! Console output goes to stdout for the server and to stderr for the one-shot CLI, whose
//! stdout carries the JSON outcome. The file layer appends to `WORDCOLLECT_LOG_FILE` when set
//! and otherwise rotates daily under `logs/`.
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const LOG_FILE_ENV: &str = "WORDCOLLECT_LOG_FILE";
const ROTATING_LOG_DIR: &str = "logs";
const ROTATING_LOG_PREFIX: &str = "wordcollect.log";

/// HTTP client internals stay at `warn` unless `RUST_LOG` says otherwise.
const DEFAULT_DIRECTIVES: &str = "info,hyper=warn,hyper_util=warn,reqwest=warn,httpmock=warn";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Where console log lines are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Console {
    /// Long-running server: logs share stdout with nothing else.
    Stdout,
    /// CLI runs: stdout is reserved for the workflow outcome.
    Stderr,
}

/// Destination of the file layer.
#[derive(Debug, Clone, PartialEq, Eq)]
enum FileTarget {
    /// Append to one explicit file.
    Append(PathBuf),
    /// Roll over to a new file every day inside a directory.
    Daily(PathBuf),
}

impl FileTarget {
    fn from_env_value(value: Option<String>) -> Self {
        match value.filter(|path| !path.trim().is_empty()) {
            Some(path) => Self::Append(PathBuf::from(path)),
            None => Self::Daily(PathBuf::from(ROTATING_LOG_DIR)),
        }
    }
}

fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES))
}

/// Install the global subscriber: console plus file, both closing out `workflow` spans.
///
/// `RUST_LOG` overrides the default filter. Calling this twice panics, as with any global
/// subscriber installation.
pub fn init_tracing(console: Console) {
    let console_layer = match console {
        Console::Stdout => fmt::layer()
            .with_target(false)
            .with_span_events(FmtSpan::CLOSE)
            .compact()
            .boxed(),
        Console::Stderr => fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_span_events(FmtSpan::CLOSE)
            .compact()
            .boxed(),
    };

    let file_layer = file_writer(FileTarget::from_env_value(std::env::var(LOG_FILE_ENV).ok()))
        .map(|writer| {
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_span_events(FmtSpan::CLOSE)
                .compact()
        });

    tracing_subscriber::registry()
        .with(default_filter())
        .with(console_layer)
        .with(file_layer)
        .init();
}

/// Returns `None` when the target cannot be opened; console logging still proceeds.
fn file_writer(target: FileTarget) -> Option<NonBlocking> {
    let (non_blocking, guard) = match target {
        FileTarget::Append(path) => {
            let file = match open_append(&path) {
                Ok(file) => file,
                Err(err) => {
                    eprintln!("Failed to open log file {}: {err}", path.display());
                    return None;
                }
            };
            tracing_appender::non_blocking(file)
        }
        FileTarget::Daily(dir) => {
            if let Err(err) = std::fs::create_dir_all(&dir) {
                eprintln!("Failed to create log directory {}: {err}", dir.display());
                return None;
            }
            tracing_appender::non_blocking(tracing_appender::rolling::daily(
                dir,
                ROTATING_LOG_PREFIX,
            ))
        }
    };
    let _ = LOG_GUARD.set(guard);
    Some(non_blocking)
}

fn open_append(path: &Path) -> std::io::Result<std::fs::File> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::OpenOptions::new().create(true).append(true).open(path)
}
