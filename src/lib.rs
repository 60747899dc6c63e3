pub mod capabilities;
pub mod classifier;
pub mod commands;
pub mod config;
pub mod executor;
pub mod inference;
pub mod ledger;
pub mod privacy;

#[cfg(test)]
mod test_support;

use std::path::{Path, PathBuf};

use config::Settings;

/// Default `EnvFilter` directive when neither `RUST_LOG` nor settings set one.
pub const DEFAULT_LOG_FILTER: &str = "localtriage=info,warn";

/// Return the platform-standard data directory for LocalTriage.
///
/// - macOS: `~/Library/Application Support/com.localtriage.app/`
/// - Windows: `{FOLDERID_RoamingAppData}\com.localtriage.app\`
/// - Linux: `$XDG_DATA_HOME/com.localtriage.app/` (fallback `~/.local/share/...`)
///
/// Falls back to `~/.localtriage/` only if none of the above can be resolved.
pub fn data_dir() -> PathBuf {
    if let Some(dir) = dirs::data_dir() {
        return dir.join("com.localtriage.app");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".localtriage")
}

/// Resolve the ledger database path: the configured one, or `triage.db`
/// in the data directory (created if needed).
pub fn resolve_db_path(settings: &Settings) -> String {
    if let Some(path) = settings.database_path.as_deref().filter(|p| !p.is_empty()) {
        return path.to_string();
    }
    let dir = data_dir();
    if !dir.exists() {
        let _ = std::fs::create_dir_all(&dir);
    }
    dir.join("triage.db").to_string_lossy().into_owned()
}

/// Initialize the tracing subscriber, writing to `triage.log` in the data
/// directory.
///
/// Rotates existing logs (triage.log → .1 → .2 → .3) and opens a fresh,
/// line-flushed file. When the file cannot be opened, logs go to stderr.
/// `RUST_LOG` takes precedence over `filter`.
pub fn init_tracing(filter: Option<&str>) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = data_dir();
    let _ = std::fs::create_dir_all(&log_dir);
    let log_path = log_dir.join("triage.log");

    rotate_log_file(&log_path, 3);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter.unwrap_or(DEFAULT_LOG_FILTER)));

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path);

    let installed = match log_file {
        Ok(file) => fmt::fmt()
            .with_env_filter(filter)
            .with_writer(FlushingWriter::new(file))
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(false)
            .try_init(),
        Err(e) => {
            eprintln!("cannot open {}: {e}; logging to stderr", log_path.display());
            fmt::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init()
        }
    };
    if installed.is_err() {
        // A subscriber is already installed (tests, embedding hosts).
        return;
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        data_dir = %log_dir.display(),
        log_file = %log_path.display(),
        pid = std::process::id(),
        "=== LocalTriage starting ==="
    );
}

/// Rotate log files: `triage.log` → `triage.log.1` → … → `.{keep}`.
///
/// Oldest file beyond `keep` is deleted. Missing files in the chain are skipped.
fn rotate_log_file(base_path: &Path, keep: u32) {
    let oldest = format!("{}.{keep}", base_path.display());
    let _ = std::fs::remove_file(&oldest);

    for i in (1..keep).rev() {
        let from = format!("{}.{i}", base_path.display());
        let to = format!("{}.{}", base_path.display(), i + 1);
        let _ = std::fs::rename(&from, &to);
    }

    if base_path.exists() {
        let to = format!("{}.1", base_path.display());
        let _ = std::fs::rename(base_path, &to);
    }
}

/// A writer that wraps `std::fs::File` and flushes after every write, so
/// each log line is on disk before a crash can lose it.
#[derive(Clone)]
struct FlushingWriter {
    file: std::sync::Arc<std::sync::Mutex<std::fs::File>>,
}

impl FlushingWriter {
    fn new(file: std::fs::File) -> Self {
        Self {
            file: std::sync::Arc::new(std::sync::Mutex::new(file)),
        }
    }
}

impl std::io::Write for FlushingWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut f = self
            .file
            .lock()
            .map_err(|e| std::io::Error::other(format!("lock poisoned: {e}")))?;
        let n = std::io::Write::write(&mut *f, buf)?;
        std::io::Write::flush(&mut *f)?;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut f = self
            .file
            .lock()
            .map_err(|e| std::io::Error::other(format!("lock poisoned: {e}")))?;
        std::io::Write::flush(&mut *f)
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for FlushingWriter {
    type Writer = FlushingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
