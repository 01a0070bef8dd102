use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

const DEFAULT_ROOT: &str = ".";
const DEFAULT_DEVICE_CONFIG: &str = "conf/timelapse.conf";
const DEFAULT_STATUS_PATH: &str = "/tmp/timelapse_status.json";
const DEFAULT_FPS: u32 = 25;
const DEFAULT_PROGRESS_EVERY: usize = 100;
const DEFAULT_FFMPEG: &str = "ffmpeg";
const DEFAULT_WAIT_POLL_SECS: u64 = 30;

pub const LOGS_DIR: &str = "logs";
pub const SCHEDULES_DIR: &str = "schedules";
pub const PICS_DIR: &str = "pics";
pub const VIDEOS_DIR: &str = "videos";
pub const LOG_FILE_NAME: &str = "timelapse.log";

// ----------------------------------------------------------------------------
// Device config (conf/timelapse.conf)
// ----------------------------------------------------------------------------

/// Per-device settings shared with the scheduler and lifecycle manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    pub device_id: String,
    pub capture_command: String,
}

impl DeviceConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg = Self::parse(&raw)?;
        log::info!("Loaded config: capture_command = {}", cfg.capture_command);
        log::info!("Loaded config: device_id = {}", cfg.device_id);
        Ok(cfg)
    }

    /// Parses `key=value` lines. Section headers, comments and any other
    /// line without `=` are ignored, so the INI file shared with the other
    /// device programs is accepted as-is.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let mut capture_command = None;
        let mut device_id = None;

        for line in raw.lines() {
            let line = line.trim();
            if line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            match key.trim() {
                "capture_command" => capture_command = Some(value.trim().to_string()),
                "id" => device_id = Some(value.trim().to_string()),
                _ => {}
            }
        }

        let capture_command = capture_command
            .filter(|cmd| !cmd.is_empty())
            .ok_or(ConfigError::MissingKey("capture_command"))?;
        let device_id = device_id
            .filter(|id| !id.is_empty())
            .ok_or(ConfigError::MissingKey("id"))?;
        validate_device_id(&device_id)?;

        Ok(Self {
            device_id,
            capture_command,
        })
    }
}

fn validate_device_id(id: &str) -> Result<(), ConfigError> {
    if id
        .chars()
        .any(|c| c == '/' || c == '\\' || c.is_whitespace() || c.is_control())
    {
        return Err(ConfigError::InvalidValue {
            key: "id",
            reason: format!("'{}' cannot be used in file names", id),
        });
    }
    Ok(())
}

// ----------------------------------------------------------------------------
// Engine settings (TIMELAPSE_CONFIG + env overrides)
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct EngineSettingsFile {
    root: Option<PathBuf>,
    device_config: Option<PathBuf>,
    status_path: Option<PathBuf>,
    video: Option<VideoSettingsFile>,
    capture: Option<CaptureSettingsFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct VideoSettingsFile {
    fps: Option<u32>,
    progress_every: Option<usize>,
    ffmpeg: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct CaptureSettingsFile {
    wait_poll_secs: Option<u64>,
    timeout_secs: Option<u64>,
}

/// Runtime parameters of the engine itself (not shared with other programs).
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Project root; `logs/`, `pics/`, `videos/` and `schedules/` live here.
    pub root: PathBuf,
    /// Device config, relative to `root` unless absolute.
    pub device_config: PathBuf,
    pub status_path: PathBuf,
    pub video: VideoSettings,
    pub capture: CaptureSettings,
}

#[derive(Debug, Clone)]
pub struct VideoSettings {
    pub fps: u32,
    pub progress_every: usize,
    pub ffmpeg: String,
}

#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub wait_poll: Duration,
    /// `None` keeps a hung capture blocking the loop indefinitely.
    pub timeout: Option<Duration>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_ROOT),
            device_config: PathBuf::from(DEFAULT_DEVICE_CONFIG),
            status_path: PathBuf::from(DEFAULT_STATUS_PATH),
            video: VideoSettings {
                fps: DEFAULT_FPS,
                progress_every: DEFAULT_PROGRESS_EVERY,
                ffmpeg: DEFAULT_FFMPEG.to_string(),
            },
            capture: CaptureSettings {
                wait_poll: Duration::from_secs(DEFAULT_WAIT_POLL_SECS),
                timeout: None,
            },
        }
    }
}

impl EngineSettings {
    /// Defaults, then the TOML file named by `TIMELAPSE_CONFIG`, then
    /// `TIMELAPSE_*` environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = std::env::var("TIMELAPSE_CONFIG").ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    /// Same as [`EngineSettings::load`] with an explicit settings file.
    pub fn load_from(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file_cfg = match path {
            Some(path) => read_settings_file(path)?,
            None => EngineSettingsFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg);
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: EngineSettingsFile) -> Self {
        let defaults = Self::default();
        let video = file.video.unwrap_or_default();
        let capture = file.capture.unwrap_or_default();
        Self {
            root: file.root.unwrap_or(defaults.root),
            device_config: file.device_config.unwrap_or(defaults.device_config),
            status_path: file.status_path.unwrap_or(defaults.status_path),
            video: VideoSettings {
                fps: video.fps.unwrap_or(defaults.video.fps),
                progress_every: video
                    .progress_every
                    .unwrap_or(defaults.video.progress_every),
                ffmpeg: video.ffmpeg.unwrap_or(defaults.video.ffmpeg),
            },
            capture: CaptureSettings {
                wait_poll: capture
                    .wait_poll_secs
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.capture.wait_poll),
                timeout: capture.timeout_secs.map(Duration::from_secs),
            },
        }
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Some(root) = non_empty_env("TIMELAPSE_ROOT") {
            self.root = PathBuf::from(root);
        }
        if let Some(path) = non_empty_env("TIMELAPSE_DEVICE_CONFIG") {
            self.device_config = PathBuf::from(path);
        }
        if let Some(path) = non_empty_env("TIMELAPSE_STATUS_PATH") {
            self.status_path = PathBuf::from(path);
        }
        if let Some(ffmpeg) = non_empty_env("TIMELAPSE_FFMPEG") {
            self.video.ffmpeg = ffmpeg;
        }
        if let Some(fps) = non_empty_env("TIMELAPSE_FPS") {
            self.video.fps = fps.parse().map_err(|_| {
                ConfigError::InvalidSettings("TIMELAPSE_FPS must be an integer".to_string())
            })?;
        }
        if let Some(timeout) = non_empty_env("TIMELAPSE_CAPTURE_TIMEOUT_SECS") {
            let seconds: u64 = timeout.parse().map_err(|_| {
                ConfigError::InvalidSettings(
                    "TIMELAPSE_CAPTURE_TIMEOUT_SECS must be an integer number of seconds"
                        .to_string(),
                )
            })?;
            self.capture.timeout = Some(Duration::from_secs(seconds));
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.video.fps == 0 {
            return Err(ConfigError::InvalidSettings(
                "video fps must be greater than zero".to_string(),
            ));
        }
        if self.video.progress_every == 0 {
            return Err(ConfigError::InvalidSettings(
                "video progress_every must be greater than zero".to_string(),
            ));
        }
        if self.video.ffmpeg.trim().is_empty() {
            return Err(ConfigError::InvalidSettings(
                "ffmpeg program cannot be empty".to_string(),
            ));
        }
        if self.capture.wait_poll.is_zero() {
            return Err(ConfigError::InvalidSettings(
                "wait poll interval must be greater than zero".to_string(),
            ));
        }
        if matches!(self.capture.timeout, Some(timeout) if timeout.is_zero()) {
            return Err(ConfigError::InvalidSettings(
                "capture timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn device_config_path(&self) -> PathBuf {
        self.root.join(&self.device_config)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join(LOGS_DIR)
    }

    pub fn schedules_dir(&self) -> PathBuf {
        self.root.join(SCHEDULES_DIR)
    }

    pub fn pics_dir(&self) -> PathBuf {
        self.root.join(PICS_DIR)
    }

    pub fn videos_dir(&self) -> PathBuf {
        self.root.join(VIDEOS_DIR)
    }
}

fn read_settings_file(path: &Path) -> Result<EngineSettingsFile, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&raw).map_err(|e| ConfigError::SettingsFile {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ini_style_device_config() {
        let raw = "\
[DEVICE]
id = pi0cam

[CAMERA]
; rotate 180 for the balcony mount
capture_command = rpicam-still -n --rotation 180

[SCHEDULER]
latitude = 60.17
";
        let cfg = DeviceConfig::parse(raw).expect("parse config");
        assert_eq!(cfg.device_id, "pi0cam");
        assert_eq!(cfg.capture_command, "rpicam-still -n --rotation 180");
    }

    #[test]
    fn missing_capture_command_is_named() {
        let err = DeviceConfig::parse("id=pi0cam\n").unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey("capture_command")));
    }

    #[test]
    fn empty_id_counts_as_missing() {
        let err = DeviceConfig::parse("capture_command=rpicam-still\nid=   \n").unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey("id")));
    }

    #[test]
    fn rejects_id_with_path_separator() {
        let err = DeviceConfig::parse("capture_command=rpicam-still\nid=../etc\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "id", .. }));
    }

    #[test]
    fn value_may_contain_equals_sign() {
        let cfg =
            DeviceConfig::parse("id=cam\ncapture_command=rpicam-still --awb=daylight\n").unwrap();
        assert_eq!(cfg.capture_command, "rpicam-still --awb=daylight");
    }
}
