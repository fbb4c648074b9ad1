use std::io::Read;
use std::path::Path;
use std::process::{ChildStderr, Command, Stdio};
use std::thread::JoinHandle;

use crate::foundation::error::{FramefxError, FramefxResult};

/// Return `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    tool_runs("ffmpeg")
}

/// Return `true` when `ffprobe` can be invoked from `PATH`.
pub fn is_ffprobe_on_path() -> bool {
    tool_runs("ffprobe")
}

fn tool_runs(name: &str) -> bool {
    Command::new(name)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> FramefxResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

pub(crate) type StderrDrain = JoinHandle<std::io::Result<Vec<u8>>>;

/// Drain a child's stderr on a helper thread so the child never blocks on a full pipe.
pub(crate) fn spawn_stderr_drain(mut stderr: ChildStderr) -> StderrDrain {
    std::thread::spawn(move || {
        let mut bytes = Vec::new();
        stderr.read_to_end(&mut bytes)?;
        Ok(bytes)
    })
}

pub(crate) fn join_stderr_drain(drain: Option<StderrDrain>) -> FramefxResult<String> {
    let Some(handle) = drain else {
        return Ok(String::new());
    };
    let bytes = handle
        .join()
        .map_err(|_| FramefxError::Other(anyhow::anyhow!("ffmpeg stderr drain thread panicked")))?
        .map_err(|e| FramefxError::Other(anyhow::anyhow!("ffmpeg stderr read failed: {e}")))?;
    Ok(String::from_utf8_lossy(&bytes).trim().to_owned())
}
