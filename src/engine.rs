//! Capture loop engine.
//!
//! Drives one day: WAITING → CAPTURING → ENCODING → FINISHED.
//!
//! The engine is responsible for:
//! - Gating capture on the schedule's wall-clock window
//! - Pacing captures at the schedule interval, subtracting each iteration's
//!   cost from the sleep (missed slots are never made up)
//! - Counting and logging failed captures without stopping the loop
//! - Publishing a status snapshot after every transition and capture
//! - Handing the frame list to the video assembler once capture ends
//!
//! Only [`Engine::initialize`] can fail. Once `run` starts, every error is
//! absorbed and logged.

use chrono::NaiveTime;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::capture::{CaptureCapability, CommandCapture};
use crate::clock::{sleep_interruptible, Clock, Shutdown};
use crate::config::{DeviceConfig, EngineSettings};
use crate::error::{ConfigError, InitializationError};
use crate::schedule::{file_prefix, Schedule};
use crate::session::CaptureSession;
use crate::status::{LifecycleState, StatusPublisher, StatusSnapshot};
use crate::video::{format_duration, AssemblyReport, FfmpegEncoder, VideoAssembler, VideoEncoder};

/// Attempt 1, 11, 21, ... get a full "Capturing photo" line.
const PROGRESS_LOG_EVERY: u64 = 10;

/// What happened during one call to [`Engine::run`].
#[derive(Debug)]
pub struct RunSummary {
    pub attempts: u64,
    pub errors: u64,
    pub expected: u32,
    pub frames: Vec<PathBuf>,
    pub video: Option<AssemblyReport>,
    /// A stop request cut the day short.
    pub interrupted: bool,
}

pub struct Engine {
    settings: EngineSettings,
    device: DeviceConfig,
    schedule: Schedule,
    session: CaptureSession,
    status: StatusPublisher,
    capture: Box<dyn CaptureCapability>,
    assembler: VideoAssembler,
    clock: Box<dyn Clock>,
    shutdown: Shutdown,
    video_path: PathBuf,
    state: LifecycleState,
}

impl Engine {
    /// Prepares directories, loads the device config and today's schedule.
    pub fn initialize(
        settings: EngineSettings,
        clock: Box<dyn Clock>,
    ) -> Result<Self, InitializationError> {
        for dir in [settings.logs_dir(), settings.pics_dir(), settings.videos_dir()] {
            create_dir(&dir)?;
        }

        let device = DeviceConfig::load(&settings.device_config_path())?;
        let capture = CommandCapture::from_template(&device.capture_command, settings.capture.timeout)
            .ok_or(ConfigError::MissingKey("capture_command"))?;

        let today = clock.now().date_naive();
        let schedule_path = Schedule::path_for(&settings.schedules_dir(), today, &device.device_id);
        let schedule = Schedule::load(&schedule_path)?;
        if schedule.date != today {
            log::warn!(
                "Schedule {} is dated {}, today is {}",
                schedule_path.display(),
                schedule.date,
                today
            );
        }

        let prefix = file_prefix(schedule.date, &device.device_id);
        let frame_dir = settings.pics_dir().join(format!("{}_pics", prefix));
        create_dir(&frame_dir)?;
        let video_path = settings
            .videos_dir()
            .join(format!("{}_timelapse.mp4", prefix));

        let status = StatusPublisher::new(
            settings.status_path.clone(),
            StatusSnapshot {
                status: LifecycleState::Waiting,
                device_id: device.device_id.clone(),
                date: schedule.date.format("%Y-%m-%d").to_string(),
                expected_photos: schedule.expected_photos,
                schedule_start: format_time(schedule.start),
                schedule_end: format_time(schedule.end),
                interval_seconds: schedule.interval.as_secs(),
                updated_at: clock.now().timestamp(),
                ..StatusSnapshot::default()
            },
        );
        let assembler = VideoAssembler::new(
            Box::new(FfmpegEncoder::new(settings.video.ffmpeg.clone())),
            settings.video.progress_every,
        );

        log::info!("TimeLapse initialized - Output: {}", frame_dir.display());
        log::info!("Today's schedule:");
        log::info!("  Date: {}", schedule.date);
        log::info!(
            "  Capture: {} to {}",
            format_time(schedule.start),
            format_time(schedule.end)
        );
        log::info!("  Window: {}", format_duration(schedule.window()));
        log::info!("  Interval: {} seconds", schedule.interval.as_secs());
        log::info!("  Expected photos: {}", schedule.expected_photos);

        Ok(Self {
            session: CaptureSession::new(frame_dir, prefix),
            settings,
            device,
            schedule,
            status,
            capture: Box::new(capture),
            assembler,
            clock,
            shutdown: Shutdown::new(),
            video_path,
            state: LifecycleState::Waiting,
        })
    }

    /// Replaces the subprocess capture with another capability.
    pub fn with_capture(mut self, capture: Box<dyn CaptureCapability>) -> Self {
        self.capture = capture;
        self
    }

    pub fn with_encoder(mut self, encoder: Box<dyn VideoEncoder>) -> Self {
        self.assembler = VideoAssembler::new(encoder, self.settings.video.progress_every);
        self
    }

    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn device(&self) -> &DeviceConfig {
        &self.device
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn frame_dir(&self) -> &Path {
        self.session.frame_dir()
    }

    pub fn video_path(&self) -> &Path {
        &self.video_path
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Runs the whole day. Blocks until FINISHED.
    pub fn run(mut self) -> RunSummary {
        self.transition(LifecycleState::Waiting);

        let mut interrupted = !self.wait_for_start();
        let mut video = None;
        if !interrupted {
            self.transition(LifecycleState::Capturing);
            log::info!("Starting automated timelapse capture!");
            interrupted = !self.capture_until_end();

            log::info!(
                "Scheduled capture complete! Captured {} photos.",
                self.session.captured()
            );
            log::info!(
                "Expected: {} photos ({} attempts, {} errors)",
                self.schedule.expected_photos,
                self.session.attempts(),
                self.session.errors()
            );

            self.transition(LifecycleState::Encoding);
            video = self.encode();
        }

        self.transition(LifecycleState::Finished);
        log::info!("Automated timelapse finished.");

        RunSummary {
            attempts: self.session.attempts(),
            errors: self.session.errors(),
            expected: self.schedule.expected_photos,
            video,
            interrupted,
            frames: self.session.into_frames(),
        }
    }

    /// Returns `false` if stopped before the window opened.
    fn wait_for_start(&self) -> bool {
        log::info!("Waiting for start time: {}", format_time(self.schedule.start));
        loop {
            let now = self.clock.now().time();
            if now >= self.schedule.start {
                return true;
            }
            let until_start = (self.schedule.start - now).to_std().unwrap_or(Duration::ZERO);
            let pause = until_start.min(self.settings.capture.wait_poll);
            if !sleep_interruptible(self.clock.as_ref(), pause, &self.shutdown) {
                log::warn!("Stop requested while waiting for the capture window");
                return false;
            }
        }
    }

    /// Returns `false` if stopped before the window closed.
    fn capture_until_end(&mut self) -> bool {
        if self.clock.now().time() >= self.schedule.end {
            log::warn!(
                "Capture window already closed at {}; nothing to capture",
                format_time(self.schedule.end)
            );
        }
        while self.clock.now().time() < self.schedule.end {
            if self.shutdown.is_requested() {
                log::warn!("Stop requested, ending capture early");
                return false;
            }
            let iteration_start = self.clock.monotonic();

            self.capture_once();
            self.publish_status();

            let elapsed = self.clock.monotonic().saturating_sub(iteration_start);
            match self.schedule.interval.checked_sub(elapsed) {
                Some(rest) if !rest.is_zero() => {
                    if !sleep_interruptible(self.clock.as_ref(), rest, &self.shutdown) {
                        log::warn!("Stop requested, ending capture early");
                        return false;
                    }
                }
                _ => log::warn!(
                    "Warning: Capture took longer than interval! ({:.1}s > {}s)",
                    elapsed.as_secs_f64(),
                    self.schedule.interval.as_secs()
                ),
            }
        }
        true
    }

    fn capture_once(&mut self) {
        let (sequence, path) = self.session.next_attempt();
        let announced = sequence % PROGRESS_LOG_EVERY == 1;
        if announced {
            log::info!(
                "Capturing photo {}/{} -> {}",
                sequence,
                self.schedule.expected_photos,
                path.display()
            );
        }

        let started = self.clock.monotonic();
        let result = self.capture.capture(&path);
        let duration = self.clock.monotonic().saturating_sub(started);
        let at = self.clock.now();

        match result {
            Ok(()) => {
                if !announced {
                    log::info!("Photo captured successfully: {}", path.display());
                }
                self.session.record_success(path, duration, at);
            }
            Err(e) => {
                log::error!(
                    "Capture attempt {} failed (exit code: {}): {}. Continuing...",
                    sequence,
                    e.exit_code()
                        .map(|code| code.to_string())
                        .unwrap_or_else(|| "none".to_string()),
                    e
                );
                self.session.record_failure(duration, at);
            }
        }
    }

    fn encode(&mut self) -> Option<AssemblyReport> {
        let fps = self.settings.video.fps;
        match self
            .assembler
            .assemble(self.session.frames(), fps, &self.video_path)
        {
            Ok(report) => report,
            Err(e) => {
                log::error!(
                    "Video creation failed: {}. Raw frames kept in {}",
                    e,
                    self.session.frame_dir().display()
                );
                None
            }
        }
    }

    fn transition(&mut self, state: LifecycleState) {
        self.state = state;
        log::info!("State: {}", state.as_str());
        self.publish_status();
    }

    fn publish_status(&mut self) {
        let state = self.state;
        let captured = self.session.captured();
        let attempts = self.session.attempts();
        let errors = self.session.errors();
        let last_success = self.session.last_capture().map(|last| last.success);
        let last_good = self
            .session
            .last_success()
            .map(|last| (last.at.timestamp(), last.duration.as_millis() as u64));
        let updated_at = self.clock.now().timestamp();

        let result = self.status.update(|s| {
            s.status = state;
            s.photos_captured = captured;
            s.photo_attempts = attempts;
            s.capture_errors = errors;
            if let Some(success) = last_success {
                s.last_capture_success = success;
            }
            if let Some((timestamp, duration_ms)) = last_good {
                s.last_capture_timestamp = timestamp;
                s.last_capture_duration_ms = duration_ms;
            }
            s.updated_at = updated_at;
        });
        if let Err(e) = result {
            log::warn!(
                "Status update to {} failed, continuing without live status: {}",
                self.status.path().display(),
                e
            );
        }
    }
}

fn create_dir(path: &Path) -> Result<(), InitializationError> {
    std::fs::create_dir_all(path).map_err(|source| InitializationError::CreateDir {
        path: path.to_path_buf(),
        source,
    })
}

fn format_time(time: NaiveTime) -> String {
    time.format("%H:%M:%S").to_string()
}
