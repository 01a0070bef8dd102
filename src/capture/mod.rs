//! Capture capability.
//!
//! The engine only needs one thing from the camera side: "produce a photo at
//! this path, or tell me it failed". Everything about how that happens
//! (libcamera, a USB webcam wrapper, a test double) sits behind
//! [`CaptureCapability`].

use std::path::Path;

use crate::error::CaptureError;

pub mod command;

pub use command::CommandCapture;

pub trait CaptureCapability {
    /// Produces one photo at `output_path`. `Ok` means the file is a valid photo.
    fn capture(&mut self, output_path: &Path) -> Result<(), CaptureError>;
}

impl<F> CaptureCapability for F
where
    F: FnMut(&Path) -> Result<(), CaptureError>,
{
    fn capture(&mut self, output_path: &Path) -> Result<(), CaptureError> {
        self(output_path)
    }
}
