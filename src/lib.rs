//! Daily timelapse capture-and-encode engine.
//!
//! One process per day: wait for the scheduled window, capture a photo every
//! interval through an external command, then assemble the frames into a
//! single video.
//!
//! # Module Structure
//!
//! - `config`: device config (`conf/timelapse.conf`) and engine settings
//! - `schedule`: today's schedule written by the external scheduler
//! - `capture`: the capture capability and its subprocess implementation
//! - `clock`: wall-clock/monotonic time and interruptible waits
//! - `session`: per-run counters and the ordered frame list
//! - `status`: atomically published status snapshot
//! - `engine`: the WAITING → CAPTURING → ENCODING → FINISHED lifecycle
//! - `video`: end-of-day assembly
//! - `logging`: console + file logger

pub mod capture;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod schedule;
pub mod session;
pub mod status;
pub mod video;

pub use capture::{CaptureCapability, CommandCapture};
pub use clock::{Clock, ManualClock, Shutdown, SystemClock};
pub use config::{DeviceConfig, EngineSettings};
pub use engine::{Engine, RunSummary};
pub use error::{
    CaptureError, ConfigError, EncodeError, InitializationError, ScheduleError, StatusWriteError,
};
pub use schedule::Schedule;
pub use session::CaptureSession;
pub use status::{LifecycleState, StatusPublisher, StatusSnapshot};
pub use video::{AssemblyReport, FfmpegEncoder, FrameWriter, VideoAssembler, VideoEncoder};
