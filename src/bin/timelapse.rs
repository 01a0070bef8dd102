//! timelapse - daily capture-and-encode daemon
//!
//! Started once per day (cron or systemd) before the capture window opens:
//! 1. Loads the device config and today's schedule
//! 2. Waits for the window, capturing one photo per interval
//! 3. Assembles the day's frames into `videos/<date>_<id>_timelapse.mp4`
//! 4. Publishes live status for the metrics exporter throughout

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use timelapse_engine::{logging, Engine, EngineSettings, Shutdown, SystemClock};

#[derive(Parser, Debug)]
#[command(author, version, about = "Daily timelapse capture-and-encode engine")]
struct Args {
    /// Engine settings file (TOML).
    #[arg(long, env = "TIMELAPSE_CONFIG")]
    settings: Option<PathBuf>,

    /// Project root holding conf/, schedules/, pics/, videos/ and logs/.
    #[arg(long)]
    root: Option<PathBuf>,

    /// Where to publish the status snapshot.
    #[arg(long)]
    status_path: Option<PathBuf>,
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            logging::fatal(&format!("Fatal error during setup: {:#}", e));
            logging::fatal("Action required: check the scheduler output, config file and permissions.");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let args = Args::parse();

    let mut settings =
        EngineSettings::load_from(args.settings.as_deref()).context("load engine settings")?;
    if let Some(root) = args.root {
        settings.root = root;
    }
    if let Some(status_path) = args.status_path {
        settings.status_path = status_path;
    }

    let log_path = logging::init(&settings.logs_dir())?;
    log::info!(
        "timelapse {} starting, logging to {}",
        env!("CARGO_PKG_VERSION"),
        log_path.display()
    );

    let shutdown = Shutdown::new();
    let handler_flag = shutdown.clone();
    ctrlc::set_handler(move || handler_flag.request())
        .context("install shutdown signal handler")?;

    let engine = Engine::initialize(settings, Box::new(SystemClock::new()))?.with_shutdown(shutdown);
    let summary = engine.run();

    if summary.interrupted {
        log::warn!(
            "Run stopped early after {} attempts ({} errors)",
            summary.attempts,
            summary.errors
        );
    }
    if let Some(video) = &summary.video {
        log::info!(
            "Day complete: {} frames -> {} ({:.1}s)",
            video.frames_written,
            video.output.display(),
            video.nominal_seconds()
        );
    }
    Ok(())
}
