//! End-of-day video assembly.
//!
//! The assembler is responsible for:
//! - Decoding frames in capture order
//! - Fixing the output size from the first frame that decodes
//! - Skipping frames that fail to decode (logged, never fatal)
//! - Writing frames through a [`VideoEncoder`] at a fixed frame rate
//! - Reporting nominal playback length and wall-clock encode time
//!
//! The assembler MUST NOT:
//! - Delete, move or rewrite captured frames
//! - Abort the run on a single bad frame

use anyhow::Result;
use image::imageops::FilterType;
use image::RgbImage;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::error::EncodeError;

pub mod ffmpeg;
pub mod thermal;

pub use ffmpeg::FfmpegEncoder;

/// Opens a sequential frame sink for one output file.
pub trait VideoEncoder {
    fn open(
        &mut self,
        output: &Path,
        width: u32,
        height: u32,
        fps: u32,
    ) -> Result<Box<dyn FrameWriter>>;
}

pub trait FrameWriter {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()>;

    /// Flushes and closes the container.
    fn finish(self: Box<Self>) -> Result<()>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct AssemblyReport {
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub frames_written: usize,
    pub frames_skipped: usize,
    /// Wall-clock time spent decoding and encoding.
    pub encode_time: Duration,
}

impl AssemblyReport {
    /// Playback length of the artifact: frames ÷ fps.
    pub fn nominal_seconds(&self) -> f64 {
        self.frames_written as f64 / self.fps as f64
    }
}

pub struct VideoAssembler {
    encoder: Box<dyn VideoEncoder>,
    progress_every: usize,
    thermal_zone: PathBuf,
}

impl VideoAssembler {
    pub fn new(encoder: Box<dyn VideoEncoder>, progress_every: usize) -> Self {
        Self {
            encoder,
            progress_every: progress_every.max(1),
            thermal_zone: PathBuf::from(thermal::CPU_THERMAL_ZONE),
        }
    }

    /// Reads the ambient temperature for progress lines from `path`.
    pub fn with_thermal_zone(mut self, path: impl Into<PathBuf>) -> Self {
        self.thermal_zone = path.into();
        self
    }

    /// Encodes `frames` into `output`.
    ///
    /// Returns `Ok(None)` without touching the filesystem when there is
    /// nothing to encode.
    pub fn assemble(
        &mut self,
        frames: &[PathBuf],
        fps: u32,
        output: &Path,
    ) -> Result<Option<AssemblyReport>, EncodeError> {
        if frames.is_empty() {
            log::warn!("No photos to create video from! Skipping.");
            return Ok(None);
        }
        log::info!("Creating video from {} photos...", frames.len());
        let started = Instant::now();

        let mut writer: Option<(Box<dyn FrameWriter>, u32, u32)> = None;
        let mut written = 0usize;
        let mut skipped = 0usize;

        for (index, path) in frames.iter().enumerate() {
            let frame = match decode_frame(path) {
                Ok(frame) => frame,
                Err(e) => {
                    log::warn!("Skipping unreadable frame {}: {:#}", path.display(), e);
                    skipped += 1;
                    continue;
                }
            };

            if writer.is_none() {
                let (width, height) = frame.dimensions();
                let sink = self.encoder.open(output, width, height, fps).map_err(|e| {
                    EncodeError::WriterOpen {
                        path: output.to_path_buf(),
                        reason: format!("{:#}", e),
                    }
                })?;
                log::info!("Video frame size {}x{} at {} fps", width, height, fps);
                writer = Some((sink, width, height));
            }
            let Some((sink, width, height)) = writer.as_mut() else {
                continue;
            };

            let frame = if frame.dimensions() != (*width, *height) {
                log::warn!(
                    "Frame {} is {}x{}, resizing to {}x{}",
                    path.display(),
                    frame.width(),
                    frame.height(),
                    width,
                    height
                );
                image::imageops::resize(&frame, *width, *height, FilterType::Triangle)
            } else {
                frame
            };

            if let Err(e) = sink.write_frame(&frame) {
                discard_partial(output);
                return Err(EncodeError::Write {
                    index,
                    reason: format!("{:#}", e),
                });
            }
            written += 1;

            if let Some(position) = progress_position(index, self.progress_every) {
                log::info!(
                    "Video progress: {}/{}   ||   CPU: {}",
                    position,
                    frames.len(),
                    thermal::read_temperature(&self.thermal_zone)
                );
            }
        }

        let Some((sink, width, height)) = writer else {
            return Err(EncodeError::NoDecodableFrames(frames.len()));
        };
        if let Err(e) = sink.finish() {
            discard_partial(output);
            return Err(EncodeError::Finish {
                path: output.to_path_buf(),
                reason: format!("{:#}", e),
            });
        }

        let report = AssemblyReport {
            output: output.to_path_buf(),
            width,
            height,
            fps,
            frames_written: written,
            frames_skipped: skipped,
            encode_time: started.elapsed(),
        };
        log::info!("Video saved as {}", report.output.display());
        if skipped > 0 {
            log::warn!("{} frames could not be decoded and were skipped", skipped);
        }
        log::info!("Actual video length: {:.1} seconds", report.nominal_seconds());
        log::info!(
            "Video compilation finished! Time to encode: {}",
            format_duration(report.encode_time)
        );
        Ok(Some(report))
    }
}

/// 1-based position in the frame list when a progress line is due.
///
/// Keyed on the list position, so skipped frames do not shift the cadence.
fn progress_position(index: usize, every: usize) -> Option<usize> {
    let position = index + 1;
    (position % every == 0).then_some(position)
}

fn decode_frame(path: &Path) -> Result<RgbImage> {
    Ok(image::open(path)?.into_rgb8())
}

fn discard_partial(output: &Path) {
    match std::fs::remove_file(output) {
        Ok(()) => log::warn!("Removed incomplete video {}", output.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Could not remove incomplete video {}: {}", output.display(), e),
    }
}

/// `HH:MM:SS`, rounded to the nearest second.
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs_f64().round() as u64;
    format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}
