//! Live status snapshot for external observers.
//!
//! The engine is the only writer. Readers (the metrics server, operators
//! with `cat`) may poll at any moment, so every write goes to a temporary
//! file in the target directory and is renamed over the snapshot.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::StatusWriteError;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    #[default]
    Waiting,
    Capturing,
    #[serde(rename = "creating_video")]
    Encoding,
    Finished,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Waiting => "waiting",
            LifecycleState::Capturing => "capturing",
            LifecycleState::Encoding => "creating_video",
            LifecycleState::Finished => "finished",
        }
    }
}

/// Field names are consumed verbatim by the metrics exporter.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StatusSnapshot {
    pub status: LifecycleState,
    pub device_id: String,
    pub date: String,
    pub photos_captured: u64,
    pub photo_attempts: u64,
    pub expected_photos: u32,
    pub capture_errors: u64,
    pub last_capture_success: bool,
    /// Unix seconds; 0 until the first successful capture.
    pub last_capture_timestamp: i64,
    pub last_capture_duration_ms: u64,
    pub schedule_start: String,
    pub schedule_end: String,
    pub interval_seconds: u64,
    /// Unix seconds.
    pub updated_at: i64,
}

pub struct StatusPublisher {
    path: PathBuf,
    current: StatusSnapshot,
}

impl StatusPublisher {
    pub fn new(path: impl Into<PathBuf>, initial: StatusSnapshot) -> Self {
        Self {
            path: path.into(),
            current: initial,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn current(&self) -> &StatusSnapshot {
        &self.current
    }

    /// Applies `merge` to the in-memory snapshot, then republishes it.
    ///
    /// The in-memory snapshot is updated even when the write fails, so the
    /// next successful write carries every field merged so far.
    pub fn update<F>(&mut self, merge: F) -> Result<(), StatusWriteError>
    where
        F: FnOnce(&mut StatusSnapshot),
    {
        merge(&mut self.current);
        self.publish()
    }

    pub fn publish(&self) -> Result<(), StatusWriteError> {
        let json = serde_json::to_vec_pretty(&self.current)?;
        write_atomic(&self.path, &json).map_err(|source| StatusWriteError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

/// Reads a published snapshot.
pub fn read_snapshot(path: &Path) -> anyhow::Result<StatusSnapshot> {
    let raw = std::fs::read(path)?;
    Ok(serde_json::from_slice(&raw)?)
}

fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::Builder::new()
        .prefix(".timelapse_status")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn update_merges_and_publishes() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("status.json");
        let mut publisher = StatusPublisher::new(
            &path,
            StatusSnapshot {
                device_id: "pi0cam".to_string(),
                expected_photos: 752,
                ..StatusSnapshot::default()
            },
        );

        publisher.update(|s| s.status = LifecycleState::Capturing)?;
        publisher.update(|s| {
            s.photos_captured = 3;
            s.photo_attempts = 4;
            s.capture_errors = 1;
        })?;

        let snapshot = read_snapshot(&path)?;
        assert_eq!(snapshot.status, LifecycleState::Capturing);
        assert_eq!(snapshot.device_id, "pi0cam");
        assert_eq!(snapshot.expected_photos, 752);
        assert_eq!(snapshot.photos_captured, 3);
        assert_eq!(snapshot.capture_errors, 1);
        Ok(())
    }

    #[test]
    fn encoding_state_uses_exporter_name() -> Result<()> {
        let json = serde_json::to_value(StatusSnapshot {
            status: LifecycleState::Encoding,
            ..StatusSnapshot::default()
        })?;
        assert_eq!(json["status"], "creating_video");
        assert_eq!(LifecycleState::Encoding.as_str(), "creating_video");
        Ok(())
    }

    #[test]
    fn write_failure_keeps_merged_fields() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("missing").join("status.json");
        let mut publisher = StatusPublisher::new(&path, StatusSnapshot::default());

        let err = publisher.update(|s| s.photos_captured = 7).unwrap_err();
        assert!(matches!(err, StatusWriteError::Io { .. }));
        assert!(err.to_string().contains(&publisher.path().display().to_string()));
        assert_eq!(publisher.current().photos_captured, 7);
        Ok(())
    }

    #[test]
    fn leaves_no_temporary_files_behind() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("status.json");
        let mut publisher = StatusPublisher::new(&path, StatusSnapshot::default());
        for n in 0..5 {
            publisher.update(|s| s.photo_attempts = n)?;
        }
        let entries: Vec<_> = std::fs::read_dir(dir.path())?.collect::<Result<_, _>>()?;
        assert_eq!(entries.len(), 1);
        assert!(entries[0].path().ends_with("status.json"));
        Ok(())
    }
}
