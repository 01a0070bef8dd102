//! Dual-sink logger: console via `env_logger`, plus an append-only file.
//!
//! Both sinks share one line format, `[YYYYMMDD_HHMMSS] LEVEL message`, so
//! the file under `logs/` reads the same as the journal.

use anyhow::{Context, Result};
use log::Log;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::config::LOG_FILE_NAME;

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

static INSTALLED: AtomicBool = AtomicBool::new(false);

struct DualLogger {
    console: env_logger::Logger,
    file: Option<Mutex<File>>,
}

impl Log for DualLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.console.enabled(metadata)
    }

    fn log(&self, record: &log::Record) {
        if !self.console.matches(record) {
            return;
        }
        self.console.log(record);
        if let Some(file) = &self.file {
            let mut file = file.lock().unwrap_or_else(|e| e.into_inner());
            // Best effort: a failed write is dropped.
            let _ = writeln!(file, "{}", format_line(record));
        }
    }

    fn flush(&self) {
        self.console.flush();
        if let Some(file) = &self.file {
            let mut file = file.lock().unwrap_or_else(|e| e.into_inner());
            let _ = file.flush();
        }
    }
}

/// Installs the global logger, writing to `<log_dir>/timelapse.log`.
///
/// `RUST_LOG` filters both sinks; the default level is `info`. If the log
/// file cannot be opened the logger falls back to console only.
pub fn init(log_dir: &Path) -> Result<PathBuf> {
    let console = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| writeln!(buf, "{}", format_line(record)))
        .build();
    let max_level = console.filter();

    let path = log_dir.join(LOG_FILE_NAME);
    let file = match open_log_file(&path) {
        Ok(file) => Some(Mutex::new(file)),
        Err(e) => {
            eprintln!("warning: logging to console only: {:#}", e);
            None
        }
    };

    log::set_boxed_logger(Box::new(DualLogger { console, file }))
        .context("a global logger is already installed")?;
    log::set_max_level(max_level);
    INSTALLED.store(true, Ordering::SeqCst);
    Ok(path)
}

/// Whether [`init`] has installed the logger. Until then `log::` macros go
/// nowhere and callers must write to stderr themselves.
pub fn is_installed() -> bool {
    INSTALLED.load(Ordering::SeqCst)
}

/// Reports a fatal message once: through the logger when installed (console
/// and file), otherwise on stderr.
pub fn fatal(message: &str) {
    if is_installed() {
        log::error!("{}", message);
    } else {
        eprintln!("{}", message);
    }
}

fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create log directory {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open log file {}", path.display()))
}

fn format_line(record: &log::Record) -> String {
    format!(
        "[{}] {:<5} {}",
        chrono::Local::now().format(TIMESTAMP_FORMAT),
        record.level(),
        record.args()
    )
}
