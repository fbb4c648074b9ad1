use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use crate::foundation::core::VideoDescriptor;
use crate::foundation::error::{FramefxError, FramefxResult, SetupError};
use crate::media::frame::RawFrame;
use crate::media::probe::probe_video;
use crate::media::source::{FrameSource, SourceStatus};
use crate::media::tools::{StderrDrain, is_ffmpeg_on_path, join_stderr_drain, spawn_stderr_drain};

/// Frame source that decodes the first video track with the system `ffmpeg` binary.
///
/// Frames are streamed as NV12 rawvideo over stdout in stored orientation (`-noautorotate`);
/// the display rotation is carried in the descriptor instead. Timestamps assume a constant
/// frame duration.
pub struct FfmpegSource {
    path: PathBuf,
    desc: VideoDescriptor,

    child: Option<Child>,
    stdout: Option<ChildStdout>,
    stderr_drain: Option<StderrDrain>,

    scratch: Vec<u8>,
    next_index: u64,
    status: SourceStatus,
}

impl FfmpegSource {
    /// Probe `path` and prepare a source. Decoding starts in [`FrameSource::start_reading`].
    pub fn open(path: impl AsRef<Path>) -> FramefxResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.is_file() {
            return Err(SetupError::FailedToOpenReader(format!(
                "input '{}' is not a readable file",
                path.display()
            ))
            .into());
        }
        let desc = probe_video(&path)?;
        Ok(Self {
            path,
            desc,
            child: None,
            stdout: None,
            stderr_drain: None,
            scratch: Vec::new(),
            next_index: 0,
            status: SourceStatus::Unknown,
        })
    }

    /// Input path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn finish_child(&mut self) {
        drop(self.stdout.take());
        let Some(mut child) = self.child.take() else {
            return;
        };
        let status = child.wait();
        let stderr = join_stderr_drain(self.stderr_drain.take()).unwrap_or_default();
        self.status = match status {
            Ok(s) if s.success() => SourceStatus::Completed,
            Ok(s) => SourceStatus::Failed(format!("ffmpeg decoder exited with {s}: {stderr}")),
            Err(e) => SourceStatus::Failed(format!("failed to wait for ffmpeg decoder: {e}")),
        };
        tracing::debug!(frames = self.next_index, status = ?self.status, "decoder finished");
    }
}

impl FrameSource for FfmpegSource {
    fn descriptor(&self) -> VideoDescriptor {
        self.desc
    }

    fn start_reading(&mut self) -> FramefxResult<()> {
        if self.status != SourceStatus::Unknown {
            return Err(FramefxError::validation("source already started"));
        }
        if !is_ffmpeg_on_path() {
            return Err(SetupError::FailedToOpenReader(
                "ffmpeg is required for decoding, but was not found on PATH".to_owned(),
            )
            .into());
        }

        // Constant-rate output keeps the decoded frame count and synthesized pts in step with
        // the descriptor; variable-rate input is retimed by duplicating or dropping frames.
        let (num, den) = self.desc.frame_rate();
        let mut child = Command::new("ffmpeg")
            .args(["-v", "error", "-nostdin", "-noautorotate", "-i"])
            .arg(&self.path)
            .args(["-map", "0:v:0", "-an", "-sn", "-fps_mode", "cfr", "-r"])
            .arg(format!("{num}/{den}"))
            .args([
                "-f",
                "rawvideo",
                "-pix_fmt",
                "nv12",
                "pipe:1",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SetupError::FailedToOpenReader(format!("failed to spawn ffmpeg: {e}")))?;

        let stdout = child.stdout.take().ok_or_else(|| {
            SetupError::FailedToOpenReader("failed to open ffmpeg stdout".to_owned())
        })?;
        let stderr = child.stderr.take().ok_or_else(|| {
            SetupError::FailedToOpenReader("failed to open ffmpeg stderr".to_owned())
        })?;

        self.scratch = vec![0u8; RawFrame::nv12_len(self.desc.width, self.desc.height)];
        self.stderr_drain = Some(spawn_stderr_drain(stderr));
        self.stdout = Some(stdout);
        self.child = Some(child);
        self.status = SourceStatus::Reading;
        Ok(())
    }

    fn read_next(&mut self, frame: &mut RawFrame) -> bool {
        if self.status != SourceStatus::Reading {
            return false;
        }
        let Some(stdout) = self.stdout.as_mut() else {
            return false;
        };

        match stdout.read_exact(&mut self.scratch) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                self.finish_child();
                return false;
            }
            Err(e) => {
                self.finish_child();
                self.status = SourceStatus::Failed(format!("failed to read decoded frame: {e}"));
                return false;
            }
        }

        frame.ensure_size(self.desc.width, self.desc.height);
        if let Err(e) = frame.copy_from_nv12(&self.scratch) {
            self.status = SourceStatus::Failed(e.to_string());
            return false;
        }
        frame.pts = self.desc.frame_duration.saturating_mul(self.next_index);
        frame.duration = self.desc.frame_duration;
        self.next_index += 1;
        true
    }

    fn status(&self) -> SourceStatus {
        self.status.clone()
    }

    fn cancel(&mut self) {
        if let Some(child) = self.child.as_mut() {
            let _ = child.kill();
        }
        drop(self.stdout.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.wait();
        }
        let _ = join_stderr_drain(self.stderr_drain.take());
        self.status = SourceStatus::Cancelled;
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}
