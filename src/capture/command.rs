//! Subprocess-backed capture.
//!
//! The configured template (e.g. `rpicam-still -n --immediate`) is run by
//! `/bin/sh -c` with `-o <path>` appended, so quoting and redirects in the
//! template work as they do on the command line. The output path reaches the
//! shell as `$1` and is never parsed as shell syntax. The loop blocks until
//! the shell exits.

use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use super::CaptureCapability;
use crate::error::CaptureError;

const SHELL: &str = "/bin/sh";
const TIMEOUT_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct CommandCapture {
    template: String,
    timeout: Option<Duration>,
}

impl CommandCapture {
    /// Returns `None` for a blank template.
    pub fn from_template(template: &str, timeout: Option<Duration>) -> Option<Self> {
        let template = template.trim();
        if template.is_empty() {
            return None;
        }
        Some(Self {
            template: template.to_string(),
            timeout,
        })
    }

    /// Full command line for `output_path`, as logged on failure.
    pub fn command_line(&self, output_path: &Path) -> String {
        format!("{} -o {}", self.template, output_path.display())
    }

    fn script(&self) -> String {
        format!("{} -o \"$1\"", self.template)
    }

    fn wait(&self, child: &mut Child, command: &str) -> Result<ExitStatus, CaptureError> {
        let wait_err = |source| CaptureError::Wait {
            command: command.to_string(),
            source,
        };
        let Some(timeout) = self.timeout else {
            return child.wait().map_err(wait_err);
        };

        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = child.try_wait().map_err(wait_err)? {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                if let Err(e) = child.kill() {
                    log::warn!("failed to kill hung capture process: {}", e);
                }
                // Reap so the child does not linger as a zombie.
                let _ = child.wait();
                return Err(CaptureError::TimedOut {
                    command: command.to_string(),
                    after_secs: timeout.as_secs(),
                });
            }
            std::thread::sleep(TIMEOUT_POLL);
        }
    }
}

impl CaptureCapability for CommandCapture {
    fn capture(&mut self, output_path: &Path) -> Result<(), CaptureError> {
        let command = self.command_line(output_path);
        // `sh -c <script> sh <path>`: the second "sh" becomes $0.
        let mut child = Command::new(SHELL)
            .arg("-c")
            .arg(self.script())
            .arg("sh")
            .arg(output_path)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|source| CaptureError::Launch {
                command: command.clone(),
                source,
            })?;

        let status = self.wait(&mut child, &command)?;
        if !status.success() {
            return Err(CaptureError::ExitStatus {
                command,
                code: status.code(),
            });
        }
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn blank_template_is_rejected() {
        assert!(CommandCapture::from_template("   ", None).is_none());
    }

    #[test]
    fn command_line_appends_output_flag() {
        let capture = CommandCapture::from_template("  rpicam-still -n --immediate ", None).unwrap();
        assert_eq!(
            capture.command_line(Path::new("pics/a_0001.jpg")),
            "rpicam-still -n --immediate -o pics/a_0001.jpg"
        );
    }

    #[test]
    fn quoted_arguments_and_redirects_reach_the_shell() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let output = dir.path().join("20250614_pi0cam_0001.jpg");
        // Writes its last argument, like `-o <path>` on a real camera tool.
        let template = r#"sh -c 'for last; do :; done; printf "%s" "$0" > "$last"' "%Y-%m-%d %X" 2>/dev/null"#;
        let mut capture = CommandCapture::from_template(template, None).unwrap();

        capture.capture(&output)?;
        assert_eq!(std::fs::read_to_string(&output)?, "%Y-%m-%d %X");
        Ok(())
    }

    #[test]
    fn output_path_is_not_interpreted_by_the_shell() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let output = dir.path().join("frame $(touch pwned) 'q'.jpg");
        let template = r#"sh -c 'touch "$2"' touch"#;
        let mut capture = CommandCapture::from_template(template, None).unwrap();

        capture.capture(&output)?;
        assert!(output.exists());
        assert!(!dir.path().join("pwned").exists());
        Ok(())
    }

    #[test]
    fn zero_exit_is_success() {
        let mut capture = CommandCapture::from_template("true", None).unwrap();
        assert!(capture.capture(Path::new("unused.jpg")).is_ok());
    }

    #[test]
    fn non_zero_exit_reports_code() {
        let mut capture = CommandCapture::from_template("false", None).unwrap();
        let err = capture.capture(Path::new("unused.jpg")).unwrap_err();
        assert!(matches!(err, CaptureError::ExitStatus { .. }));
        assert_eq!(err.exit_code(), Some(1));
        assert!(err.to_string().contains("false -o unused.jpg"));
    }

    #[test]
    fn missing_program_is_reported_by_the_shell() {
        let mut capture =
            CommandCapture::from_template("/nonexistent/timelapse-camera", None).unwrap();
        let err = capture.capture(Path::new("unused.jpg")).unwrap_err();
        assert!(matches!(err, CaptureError::ExitStatus { .. }));
        assert_eq!(err.exit_code(), Some(127));
    }

    #[test]
    fn hung_capture_is_killed_after_timeout() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let script = dir.path().join("hang.sh");
        std::fs::write(&script, "sleep 5\n")?;
        let template = format!("sh {}", script.display());
        let mut capture =
            CommandCapture::from_template(&template, Some(Duration::from_millis(300))).unwrap();

        let started = Instant::now();
        let err = capture.capture(Path::new("unused.jpg")).unwrap_err();
        assert!(matches!(err, CaptureError::TimedOut { .. }), "got {err}");
        assert!(started.elapsed() < Duration::from_secs(4));
        Ok(())
    }
}
