//! Error taxonomy for the capture engine.
//!
//! Only `InitializationError` is fatal. Everything else is absorbed by the
//! engine, logged, and counted so a single bad photo, unreadable frame or
//! status hiccup never costs the rest of the day.

use std::path::PathBuf;

/// Fatal setup failure. Aborts the process before any capture.
#[derive(Debug, thiserror::Error)]
pub enum InitializationError {
    #[error("failed to create directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to load configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to load schedule: {0}")]
    Schedule(#[from] ScheduleError),
}

/// Device config and engine settings errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("'{0}' not found in config file")]
    MissingKey(&'static str),

    #[error("invalid value for '{key}': {reason}")]
    InvalidValue { key: &'static str, reason: String },

    #[error("invalid settings file {}: {reason}", .path.display())]
    SettingsFile { path: PathBuf, reason: String },

    #[error("invalid engine settings: {0}")]
    InvalidSettings(String),
}

/// Schedule file errors.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("could not read today's schedule file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("essential schedule field '{0}' missing or empty")]
    MissingField(&'static str),

    #[error("{field} time '{value}' is not HH:MM:SS")]
    InvalidTime { field: &'static str, value: String },

    #[error("date '{0}' is not YYYY-MM-DD")]
    InvalidDate(String),

    #[error("could not parse {field} from '{value}'")]
    InvalidNumber { field: &'static str, value: String },

    #[error("capture window start {start} is not before end {end}")]
    InvalidWindow { start: String, end: String },

    #[error("interval must be greater than zero (got {0})")]
    InvalidInterval(i64),
}

/// Per-attempt capture failure. Recoverable.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("failed to launch capture command '{command}': {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("capture command exited with {}: '{command}'", describe_code(.code))]
    ExitStatus { command: String, code: Option<i32> },

    #[error("capture command timed out after {after_secs}s: '{command}'")]
    TimedOut { command: String, after_secs: u64 },

    #[error("failed waiting on capture command '{command}': {source}")]
    Wait {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

impl CaptureError {
    /// Exit code of the capture process, when it ran to completion.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            CaptureError::ExitStatus { code, .. } => *code,
            _ => None,
        }
    }
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

/// Video assembly failure. Raw frames on disk are never touched.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("could not open video writer for {}: {reason}", .path.display())]
    WriterOpen { path: PathBuf, reason: String },

    #[error("failed writing frame {index} to video: {reason}")]
    Write { index: usize, reason: String },

    #[error("failed to finalize video {}: {reason}", .path.display())]
    Finish { path: PathBuf, reason: String },

    #[error("none of the {0} frames could be decoded")]
    NoDecodableFrames(usize),
}

/// Status snapshot write failure. Non-fatal.
#[derive(Debug, thiserror::Error)]
pub enum StatusWriteError {
    #[error("failed to serialize status snapshot: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write status file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
