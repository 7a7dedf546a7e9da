use std::ffi::OsStr;
use std::io;
use std::process::Command;

/// Output captured from an external tool.
pub struct CaptureOutput {
    pub stdout: String,
    pub stderr: String,
    /// The process exit code, or 1 if the process was killed by a signal.
    pub status: i32,
}

impl CaptureOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Run `prog` with `args`, capturing stdout and stderr.
///
/// `Err` means the process could not be spawned at all (e.g. the tool is not
/// installed). A non-zero exit code is not an error; callers inspect
/// `status`/`stderr` and decide.
pub fn run_capture<S: AsRef<OsStr>>(prog: &str, args: &[S]) -> io::Result<CaptureOutput> {
    let output = Command::new(prog).args(args).output()?;
    Ok(CaptureOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        status: output.status.code().unwrap_or(1),
    })
}
