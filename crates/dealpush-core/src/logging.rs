//! Tracing setup for the `dealpush` binary.
//!
//! Events go to `$XDG_STATE_HOME/dealpush/dealpush.log` unless the caller
//! asks for stderr. `RUST_LOG` overrides the default filter.

use anyhow::Result;
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,dealpush=debug,dealpush_core=debug";

/// Destination of one log event. Each event gets its own handle on the log
/// file; if the handle cannot be duplicated the event goes to stderr.
enum EventSink {
    Log(fs::File),
    Stderr,
}

impl io::Write for EventSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            EventSink::Log(f) => f.write(buf),
            EventSink::Stderr => io::stderr().lock().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            EventSink::Log(f) => f.flush(),
            EventSink::Stderr => io::stderr().lock().flush(),
        }
    }
}

/// The append-mode `dealpush.log` handle shared by all events.
struct LogFile(fs::File);

impl<'a> MakeWriter<'a> for LogFile {
    type Writer = EventSink;

    fn make_writer(&'a self) -> Self::Writer {
        match self.0.try_clone() {
            Ok(f) => EventSink::Log(f),
            Err(_) => EventSink::Stderr,
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Path of the log file: `~/.local/state/dealpush/dealpush.log`.
pub fn log_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("dealpush")?;
    Ok(xdg_dirs.get_state_home().join("dealpush.log"))
}

/// Send tracing output to the log file. Errors leave no subscriber installed,
/// so the caller can still choose [`init_logging_stderr`].
pub fn init_logging() -> Result<()> {
    let log_file_path = log_path()?;
    if let Some(dir) = log_file_path.parent() {
        fs::create_dir_all(dir)?;
    }

    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file_path)?;

    let writer = BoxMakeWriter::new(LogFile(file));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("install log subscriber: {}", e))?;

    tracing::info!("dealpush logging initialized at {}", log_file_path.display());

    Ok(())
}

/// Send tracing output to stderr (`-v`, or when the log file is unusable).
pub fn init_logging_stderr() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}
