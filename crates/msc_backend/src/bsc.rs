//! Synchronous invocation of the backend compiler.

use std::io;
use std::path::Path;
use std::process::{Command, Stdio};

/// The captured result of one backend invocation.
pub struct RunResult {
    /// The backend's diagnostic text (its stderr; stdout is progress
    /// chatter and is discarded).
    pub output: String,
    /// Whether the backend exited successfully.
    pub success: bool,
}

/// Runs `bsc` with the given arguments, with `dir` (the temp directory
/// holding the translated file) as working directory.
pub fn run_bsc(dir: &Path, args: &[String]) -> io::Result<RunResult> {
    let out = Command::new("bsc")
        .args(args)
        .current_dir(dir)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()?;
    Ok(RunResult {
        output: String::from_utf8_lossy(&out.stderr).into_owned(),
        success: out.status.success(),
    })
}
