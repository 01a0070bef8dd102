#![allow(dead_code)]

use chrono::{DateTime, Local, TimeZone};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use image::RgbImage;
use timelapse_engine::{
    CaptureCapability, CaptureError, EngineSettings, FrameWriter, ManualClock, Shutdown,
    VideoEncoder,
};

pub const DEVICE_ID: &str = "pi0cam";

pub fn local(h: u32, m: u32, s: u32) -> DateTime<Local> {
    Local
        .with_ymd_and_hms(2025, 6, 14, h, m, s)
        .single()
        .expect("unambiguous local time")
}

/// Project root with `conf/timelapse.conf` and today's schedule in place.
pub struct Fixture {
    pub dir: tempfile::TempDir,
}

impl Fixture {
    pub fn new(start: &str, end: &str, interval_secs: i64) -> Self {
        let fixture = Self::without_schedule();
        fixture.write_schedule(&format!(
            "DAILY TIMELAPSE SCHEDULE ({DEVICE_ID})\n\
             Date: 2025-06-14\n\
             Start: {start}\n\
             End: {end}\n\
             Interval: {interval_secs} seconds\n\
             Expected photos: 3\n"
        ));
        fixture
    }

    pub fn without_schedule() -> Self {
        let dir = tempfile::tempdir().expect("temp root");
        std::fs::create_dir_all(dir.path().join("conf")).unwrap();
        std::fs::create_dir_all(dir.path().join("schedules")).unwrap();
        std::fs::write(
            dir.path().join("conf/timelapse.conf"),
            format!("[DEVICE]\nid = {DEVICE_ID}\n\n[CAMERA]\ncapture_command = rpicam-still -n\n"),
        )
        .unwrap();
        Self { dir }
    }

    pub fn write_schedule(&self, body: &str) {
        std::fs::write(
            self.root().join("schedules/20250614_pi0cam_schedule.txt"),
            body,
        )
        .unwrap();
    }

    pub fn write_config(&self, body: &str) {
        std::fs::write(self.root().join("conf/timelapse.conf"), body).unwrap();
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn status_path(&self) -> PathBuf {
        self.root().join("status.json")
    }

    pub fn settings(&self) -> EngineSettings {
        let mut settings = EngineSettings::default();
        settings.root = self.root().to_path_buf();
        settings.status_path = self.status_path();
        settings
    }
}

/// One recorded capture attempt.
#[derive(Clone, Debug)]
pub struct Attempt {
    pub at: Duration,
    pub path: PathBuf,
}

/// Capture double that charges `cost` of virtual time per photo and fails
/// the attempts listed in `fail_on` (1-based). With `stop_after` set, it
/// requests shutdown once that many attempts have run.
pub struct ScriptedCapture {
    pub clock: ManualClock,
    pub cost: Duration,
    pub fail_on: Vec<usize>,
    pub fail_all: bool,
    pub stop_after: Option<(usize, Shutdown)>,
    pub attempts: Arc<Mutex<Vec<Attempt>>>,
}

impl ScriptedCapture {
    pub fn new(clock: &ManualClock) -> Self {
        Self {
            clock: clock.clone(),
            cost: Duration::ZERO,
            fail_on: Vec::new(),
            fail_all: false,
            stop_after: None,
            attempts: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl CaptureCapability for ScriptedCapture {
    fn capture(&mut self, output_path: &Path) -> Result<(), CaptureError> {
        let number = {
            let mut attempts = self.attempts.lock().unwrap();
            attempts.push(Attempt {
                at: self.clock.elapsed(),
                path: output_path.to_path_buf(),
            });
            attempts.len()
        };
        self.clock.advance(self.cost);
        if let Some((limit, shutdown)) = &self.stop_after {
            if number >= *limit {
                shutdown.request();
            }
        }
        if self.fail_all || self.fail_on.contains(&number) {
            return Err(CaptureError::ExitStatus {
                command: format!("rpicam-still -n -o {}", output_path.display()),
                code: Some(255),
            });
        }
        RgbImage::from_pixel(8, 6, image::Rgb([200, 180, 40]))
            .save(output_path)
            .map_err(|e| CaptureError::Launch {
                command: "test capture".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
            })
    }
}

/// Encoder double that counts frames and creates the output file on finish.
#[derive(Clone, Default)]
pub struct CountingEncoder {
    pub frames: Arc<Mutex<usize>>,
    pub opened: Arc<Mutex<Option<(u32, u32, u32)>>>,
}

struct CountingWriter {
    frames: Arc<Mutex<usize>>,
    output: PathBuf,
}

impl VideoEncoder for CountingEncoder {
    fn open(
        &mut self,
        output: &Path,
        width: u32,
        height: u32,
        fps: u32,
    ) -> anyhow::Result<Box<dyn FrameWriter>> {
        *self.opened.lock().unwrap() = Some((width, height, fps));
        Ok(Box::new(CountingWriter {
            frames: Arc::clone(&self.frames),
            output: output.to_path_buf(),
        }))
    }
}

impl FrameWriter for CountingWriter {
    fn write_frame(&mut self, _frame: &RgbImage) -> anyhow::Result<()> {
        *self.frames.lock().unwrap() += 1;
        Ok(())
    }

    fn finish(self: Box<Self>) -> anyhow::Result<()> {
        std::fs::write(&self.output, b"video")?;
        Ok(())
    }
}
