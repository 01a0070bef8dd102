use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Outcome of the most recent capture attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LastCapture {
    pub success: bool,
    pub duration: Duration,
    pub at: DateTime<Local>,
}

/// Mutable state of one daily run. Owned by exactly one engine.
#[derive(Debug)]
pub struct CaptureSession {
    frame_dir: PathBuf,
    prefix: String,
    frames: Vec<PathBuf>,
    attempts: u64,
    errors: u64,
    last_capture: Option<LastCapture>,
}

impl CaptureSession {
    pub fn new(frame_dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            frame_dir: frame_dir.into(),
            prefix: prefix.into(),
            frames: Vec::new(),
            attempts: 0,
            errors: 0,
            last_capture: None,
        }
    }

    /// Starts a new attempt and returns its output path.
    ///
    /// The counter advances on every attempt, success or failure, so paths
    /// never repeat even if every capture fails.
    pub fn next_attempt(&mut self) -> (u64, PathBuf) {
        self.attempts += 1;
        (self.attempts, self.frame_path(self.attempts))
    }

    pub fn frame_path(&self, sequence: u64) -> PathBuf {
        self.frame_dir
            .join(format!("{}_{:04}.jpg", self.prefix, sequence))
    }

    pub fn record_success(&mut self, path: PathBuf, duration: Duration, at: DateTime<Local>) {
        self.frames.push(path);
        self.last_capture = Some(LastCapture {
            success: true,
            duration,
            at,
        });
    }

    pub fn record_failure(&mut self, duration: Duration, at: DateTime<Local>) {
        self.errors += 1;
        self.last_capture = Some(LastCapture {
            success: false,
            duration,
            at,
        });
    }

    pub fn frame_dir(&self) -> &Path {
        &self.frame_dir
    }

    pub fn frames(&self) -> &[PathBuf] {
        &self.frames
    }

    pub fn into_frames(self) -> Vec<PathBuf> {
        self.frames
    }

    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    pub fn errors(&self) -> u64 {
        self.errors
    }

    pub fn captured(&self) -> u64 {
        self.frames.len() as u64
    }

    pub fn last_capture(&self) -> Option<&LastCapture> {
        self.last_capture.as_ref()
    }

    /// Most recent successful capture, if any.
    pub fn last_success(&self) -> Option<&LastCapture> {
        self.last_capture.as_ref().filter(|last| last.success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempt_paths_are_unique_under_failures() {
        let mut session = CaptureSession::new("pics/20251114_pi0cam_pics", "20251114_pi0cam");
        let now = Local::now();
        let mut seen = Vec::new();
        for _ in 0..25 {
            let (_, path) = session.next_attempt();
            session.record_failure(Duration::from_millis(5), now);
            seen.push(path);
        }
        let mut deduped = seen.clone();
        deduped.dedup();
        assert_eq!(deduped.len(), 25);
        assert!(seen.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(session.frames().is_empty());
        assert_eq!(session.errors(), 25);
        assert_eq!(
            seen[0],
            Path::new("pics/20251114_pi0cam_pics/20251114_pi0cam_0001.jpg")
        );
    }

    #[test]
    fn success_appends_in_order() {
        let mut session = CaptureSession::new("frames", "d");
        let now = Local::now();
        let (_, first) = session.next_attempt();
        session.record_success(first.clone(), Duration::from_millis(900), now);
        let (_, _failed) = session.next_attempt();
        session.record_failure(Duration::from_millis(10), now);
        let (seq, third) = session.next_attempt();
        session.record_success(third.clone(), Duration::from_millis(800), now);

        assert_eq!(seq, 3);
        assert_eq!(session.frames(), &[first, third]);
        assert_eq!(session.captured(), 2);
        assert_eq!(session.attempts(), 3);
        assert_eq!(session.errors(), 1);
        assert!(session.last_success().is_some());
    }
}
