//! MP4 encoding through an `ffmpeg` child process.
//!
//! Frames are streamed as raw RGB24 over stdin, so no intermediate files are
//! written and the encoder never reads the frame directory itself.

use anyhow::{anyhow, Context, Result};
use image::RgbImage;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use super::{FrameWriter, VideoEncoder};

#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    program: String,
}

impl FfmpegEncoder {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn args(output: &Path, width: u32, height: u32, fps: u32) -> Vec<String> {
        let mut args: Vec<String> = [
            "-hide_banner",
            "-loglevel",
            "error",
            "-y",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgb24",
            "-s",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        args.push(format!("{}x{}", width, height));
        args.push("-r".to_string());
        args.push(fps.to_string());
        args.extend(
            [
                "-i",
                "-",
                "-an",
                "-c:v",
                "libx264",
                "-preset",
                "veryfast",
                "-pix_fmt",
                "yuv420p",
                // yuv420p needs even dimensions.
                "-vf",
                "scale=trunc(iw/2)*2:trunc(ih/2)*2",
                "-movflags",
                "+faststart",
            ]
            .iter()
            .map(|s| s.to_string()),
        );
        args.push(output.to_string_lossy().into_owned());
        args
    }
}

impl VideoEncoder for FfmpegEncoder {
    fn open(
        &mut self,
        output: &Path,
        width: u32,
        height: u32,
        fps: u32,
    ) -> Result<Box<dyn FrameWriter>> {
        let mut child = Command::new(&self.program)
            .args(Self::args(output, width, height, fps))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to start '{}'", self.program))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("ffmpeg stdin was not captured"))?;
        Ok(Box::new(FfmpegWriter {
            child,
            stdin: Some(stdin),
            output: output.to_path_buf(),
            frame_bytes: width as usize * height as usize * 3,
        }))
    }
}

struct FfmpegWriter {
    child: Child,
    stdin: Option<ChildStdin>,
    output: PathBuf,
    frame_bytes: usize,
}

impl FrameWriter for FfmpegWriter {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        let raw = frame.as_raw();
        if raw.len() != self.frame_bytes {
            return Err(anyhow!(
                "frame is {} bytes, encoder expects {}",
                raw.len(),
                self.frame_bytes
            ));
        }
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| anyhow!("encoder input already closed"))?;
        stdin
            .write_all(raw)
            .context("ffmpeg stopped accepting frames")
    }

    fn finish(mut self: Box<Self>) -> Result<()> {
        // Closing stdin signals end of stream.
        drop(self.stdin.take());
        let status = self.child.wait().context("wait for ffmpeg")?;
        if !status.success() {
            return Err(anyhow!(
                "ffmpeg exited with {} while writing {}",
                status,
                self.output.display()
            ));
        }
        Ok(())
    }
}

impl Drop for FfmpegWriter {
    fn drop(&mut self) {
        // Only reached with stdin still open when encoding was abandoned.
        if self.stdin.take().is_some() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}
