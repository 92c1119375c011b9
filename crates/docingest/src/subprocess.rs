//! Blocking subprocess execution with a hard deadline.
//!
//! Callers are synchronous, so each invocation drives a small current-thread
//! runtime. The child is spawned with `kill_on_drop`, so hitting the deadline
//! drops the wait future and kills the process.

use std::ffi::OsStr;
use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;

use tokio::process::Command;

use crate::error::ConvertError;

/// Runs `program` with `args`, waiting at most `timeout`.
///
/// Returns the captured output only when the process exits with status zero.
pub fn run_with_timeout<I, S>(
    program: &str,
    args: I,
    working_dir: Option<&Path>,
    timeout: Duration,
) -> Result<Output, ConvertError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_io()
        .enable_time()
        .build()
        .map_err(|e| ConvertError::Runtime(e.to_string()))?;

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = working_dir {
        cmd.current_dir(dir);
    }

    let output = runtime.block_on(async {
        let child = cmd.spawn().map_err(|e| ConvertError::Spawn {
            command: program.to_string(),
            source: e,
        })?;

        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| ConvertError::Spawn {
                command: program.to_string(),
                source: e,
            }),
            Err(_) => Err(ConvertError::Timeout {
                command: program.to_string(),
                timeout_secs: timeout.as_secs(),
            }),
        }
    })?;

    if !output.status.success() {
        return Err(ConvertError::Failed {
            command: program.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(output)
}
