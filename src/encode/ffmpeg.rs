use std::collections::VecDeque;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

use crate::encode::annexb::{AccessUnit, AccessUnitSplitter};
use crate::encode::encoder::{EncodeFailure, EncodedSample, Encoder, EncoderEvent};
use crate::encode::sink::{SampleSink, SinkGate, SinkState};
use crate::foundation::core::{MediaTime, VideoDescriptor};
use crate::foundation::error::{FramefxError, FramefxResult, SetupError};
use crate::media::tools::{
    StderrDrain, ensure_parent_dir, is_ffmpeg_on_path, join_stderr_drain, spawn_stderr_drain,
};
use crate::render::frame_pool::CompositeFrame;

/// Options for [`FfmpegEncoder`].
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct FfmpegEncoderOpts {
    /// libx264 preset.
    pub preset: String,
    /// Constant rate factor (0-51).
    pub crf: u8,
}

impl Default for FfmpegEncoderOpts {
    fn default() -> Self {
        Self {
            preset: "medium".to_owned(),
            crf: 18,
        }
    }
}

struct Submission {
    seq: u64,
    frame: CompositeFrame,
    pts: MediaTime,
    duration: MediaTime,
}

struct PendingFrame {
    seq: u64,
    pts: MediaTime,
    duration: MediaTime,
}

#[derive(Default)]
struct Pending {
    queue: VecDeque<PendingFrame>,
    closed: bool,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// H.264 encoder backed by the system `ffmpeg` binary (libx264).
///
/// Frames go to ffmpeg as RGB24 rawvideo over stdin from a writer thread, so [`Encoder::submit`]
/// only queues. A reader thread splits the Annex-B output at access unit delimiters and pairs
/// units with submissions in FIFO order; B-frames are disabled so decode order equals
/// presentation order. If ffmpeg exits early, every unanswered frame fails with its exit status.
pub struct FfmpegEncoder {
    opts: FfmpegEncoderOpts,
    expected_len: usize,

    tx: Option<Sender<Submission>>,
    child: Arc<Mutex<Option<Child>>>,
    invalidated: Arc<AtomicBool>,
    writer: Option<JoinHandle<()>>,
    reader: Option<JoinHandle<()>>,
}

impl FfmpegEncoder {
    /// Create an encoder; the ffmpeg process starts in [`Encoder::begin`].
    pub fn new(opts: FfmpegEncoderOpts) -> Self {
        Self {
            opts,
            expected_len: 0,
            tx: None,
            child: Arc::new(Mutex::new(None)),
            invalidated: Arc::new(AtomicBool::new(false)),
            writer: None,
            reader: None,
        }
    }

    fn command(&self, desc: &VideoDescriptor) -> Command {
        let (num, den) = desc.frame_rate();
        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd.args([
            "-loglevel",
            "error",
            "-nostdin",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgb24",
            "-s",
            &format!("{}x{}", desc.width, desc.height),
            "-r",
            &format!("{num}/{den}"),
            "-i",
            "pipe:0",
            "-an",
            "-vf",
            "scale=out_color_matrix=bt709:out_range=tv,format=yuv420p",
            "-c:v",
            "libx264",
            "-preset",
            &self.opts.preset,
            "-crf",
            &self.opts.crf.to_string(),
            "-bf",
            "0",
            "-color_primaries",
            "bt709",
            "-color_trc",
            "bt709",
            "-colorspace",
            "bt709",
            "-fps_mode",
            "passthrough",
            "-bsf:v",
            "h264_metadata=aud=insert",
            "-f",
            "h264",
            "pipe:1",
        ]);
        cmd
    }
}

impl Encoder for FfmpegEncoder {
    #[tracing::instrument(skip_all, fields(width = desc.width, height = desc.height))]
    fn begin(
        &mut self,
        desc: &VideoDescriptor,
        events: Sender<EncoderEvent>,
    ) -> FramefxResult<()> {
        if self.tx.is_some() {
            return Err(FramefxError::encode("encoder session already started"));
        }
        desc.validate()?;
        if self.opts.crf > 51 {
            return Err(FramefxError::validation("crf must be in 0..=51"));
        }
        if !is_ffmpeg_on_path() {
            return Err(SetupError::ResourceAllocation(
                "ffmpeg is required for H.264 encoding, but was not found on PATH".to_owned(),
            )
            .into());
        }

        let mut child = self.command(desc).spawn().map_err(|e| {
            SetupError::ResourceAllocation(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;
        let (Some(stdin), Some(stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(SetupError::ResourceAllocation(
                "failed to open ffmpeg pipes (unexpected)".to_owned(),
            )
            .into());
        };
        let stderr_drain = spawn_stderr_drain(stderr);

        *lock(&self.child) = Some(child);
        self.invalidated.store(false, Ordering::SeqCst);
        self.expected_len = desc.rgb_len();

        let pending = Arc::new(Mutex::new(Pending::default()));
        let (tx, rx) = mpsc::channel();

        let writer = {
            let pending = Arc::clone(&pending);
            let events = events.clone();
            std::thread::spawn(move || run_writer(stdin, rx, &pending, &events))
        };
        let reader = {
            let child = Arc::clone(&self.child);
            let invalidated = Arc::clone(&self.invalidated);
            std::thread::spawn(move || {
                run_reader(
                    stdout,
                    Some(stderr_drain),
                    &child,
                    &pending,
                    &events,
                    &invalidated,
                )
            })
        };

        self.tx = Some(tx);
        self.writer = Some(writer);
        self.reader = Some(reader);
        tracing::debug!("ffmpeg encoder started");
        Ok(())
    }

    fn submit(
        &mut self,
        seq: u64,
        frame: CompositeFrame,
        pts: MediaTime,
        duration: MediaTime,
    ) -> FramefxResult<()> {
        if frame.data.len() != self.expected_len {
            return Err(FramefxError::encode(format!(
                "frame has {} bytes, expected {}",
                frame.data.len(),
                self.expected_len
            )));
        }
        let Some(tx) = self.tx.as_ref() else {
            return Err(FramefxError::encode("encoder is not accepting frames"));
        };
        tx.send(Submission {
            seq,
            frame,
            pts,
            duration,
        })
        .map_err(|_| FramefxError::encode("encoder writer thread has stopped"))
    }

    fn flush(&mut self) -> FramefxResult<()> {
        // Closing the queue lets the writer drain and then close ffmpeg's stdin.
        drop(self.tx.take());
        Ok(())
    }

    fn invalidate(&mut self) {
        self.invalidated.store(true, Ordering::SeqCst);
        drop(self.tx.take());
        if let Some(mut child) = lock(&self.child).take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        for handle in [self.writer.take(), self.reader.take()].into_iter().flatten() {
            if handle.join().is_err() {
                tracing::warn!("ffmpeg encoder thread panicked");
            }
        }
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        if self.writer.is_some() || self.reader.is_some() {
            self.invalidate();
        }
    }
}

fn run_writer(
    mut stdin: ChildStdin,
    rx: Receiver<Submission>,
    pending: &Mutex<Pending>,
    events: &Sender<EncoderEvent>,
) {
    let mut broken = false;
    for sub in rx {
        let accepted = {
            let mut p = lock(pending);
            if p.closed {
                false
            } else {
                p.queue.push_back(PendingFrame {
                    seq: sub.seq,
                    pts: sub.pts,
                    duration: sub.duration,
                });
                true
            }
        };
        if accepted
            && !broken
            && let Err(e) = stdin.write_all(&sub.frame.data)
        {
            tracing::warn!(seq = sub.seq, "failed to write frame to ffmpeg: {e}");
            broken = true;
        }
        let _ = events.send(EncoderEvent::FrameReleased(sub.frame));
        if !accepted {
            let _ = events.send(EncoderEvent::Encoded {
                seq: sub.seq,
                result: Err(EncodeFailure {
                    status: -1,
                    detail: "encoder output already closed".to_owned(),
                }),
            });
        }
    }
}

fn run_reader(
    mut stdout: ChildStdout,
    stderr_drain: Option<StderrDrain>,
    child: &Mutex<Option<Child>>,
    pending: &Mutex<Pending>,
    events: &Sender<EncoderEvent>,
    invalidated: &AtomicBool,
) {
    let emit = |unit: AccessUnit| {
        let Some(frame) = lock(pending).queue.pop_front() else {
            tracing::warn!("ffmpeg produced an access unit with no matching frame");
            return;
        };
        if invalidated.load(Ordering::SeqCst) {
            return;
        }
        let _ = events.send(EncoderEvent::Encoded {
            seq: frame.seq,
            result: Ok(EncodedSample {
                data: unit.data,
                pts: frame.pts,
                duration: frame.duration,
                is_keyframe: unit.is_keyframe,
            }),
        });
    };

    let mut splitter = AccessUnitSplitter::new();
    let mut units = Vec::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        match stdout.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                splitter.push(&buf[..n], &mut units);
                units.drain(..).for_each(&emit);
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::warn!("failed to read ffmpeg output: {e}");
                break;
            }
        }
    }
    if let Some(unit) = splitter.finish() {
        emit(unit);
    }

    let reaped = lock(child).take();
    let (status, mut detail) = match reaped {
        Some(mut c) => match c.wait() {
            Ok(s) if s.success() => (0, "encoder produced fewer samples than frames".to_owned()),
            Ok(s) => (s.code().unwrap_or(-1), format!("ffmpeg exited with {s}")),
            Err(e) => (-1, format!("failed to wait for ffmpeg: {e}")),
        },
        None => (-1, "encoder was terminated".to_owned()),
    };
    if let Ok(stderr) = join_stderr_drain(stderr_drain)
        && !stderr.is_empty()
    {
        detail = format!("{detail}: {stderr}");
    }

    let unanswered: Vec<PendingFrame> = {
        let mut p = lock(pending);
        p.closed = true;
        p.queue.drain(..).collect()
    };
    if invalidated.load(Ordering::SeqCst) {
        return;
    }
    for frame in unanswered {
        let _ = events.send(EncoderEvent::Encoded {
            seq: frame.seq,
            result: Err(EncodeFailure {
                status,
                detail: detail.clone(),
            }),
        });
    }
}

/// Options for [`FfmpegMp4Sink`].
#[derive(Clone, Debug)]
pub struct FfmpegMp4SinkOpts {
    /// Output MP4 file path.
    pub out_path: PathBuf,
    /// Overwrite output file if it already exists.
    pub overwrite: bool,
}

impl FfmpegMp4SinkOpts {
    /// Create options for outputting an MP4 to `out_path`.
    pub fn new(out_path: impl Into<PathBuf>) -> Self {
        Self {
            out_path: out_path.into(),
            overwrite: true,
        }
    }
}

/// MP4 writer that remuxes an H.264 elementary stream with the system `ffmpeg` (`-c copy`).
///
/// The input's display rotation and flip are tagged on the output track.
pub struct FfmpegMp4Sink {
    opts: FfmpegMp4SinkOpts,
    gate: SinkGate,

    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<StderrDrain>,
}

impl FfmpegMp4Sink {
    /// Create a new sink writing to `opts.out_path`.
    pub fn new(opts: FfmpegMp4SinkOpts) -> Self {
        Self {
            opts,
            gate: SinkGate::new(),
            child: None,
            stdin: None,
            stderr_drain: None,
        }
    }

    /// Check the output location without starting ffmpeg.
    pub fn check_writable(&self) -> FramefxResult<()> {
        let out = &self.opts.out_path;
        if !self.opts.overwrite && out.exists() {
            return Err(SetupError::FailedToOpenWriter(format!(
                "output file '{}' already exists",
                out.display()
            ))
            .into());
        }
        ensure_parent_dir(out)
            .map_err(|e| SetupError::FailedToOpenWriter(format!("{}: {e}", out.display())))?;
        Ok(())
    }

    fn command(&self, desc: &VideoDescriptor) -> Command {
        let (num, den) = desc.frame_rate();
        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd.args(["-loglevel", "error", "-nostdin"]);
        cmd.arg(if self.opts.overwrite { "-y" } else { "-n" });
        if desc.transform.rotation_degrees != 0 {
            cmd.args([
                "-display_rotation",
                &desc.transform.rotation_degrees.to_string(),
            ]);
        }
        if desc.transform.flip_horizontal {
            cmd.args(["-display_hflip"]);
        }
        cmd.args([
            "-f",
            "h264",
            "-framerate",
            &format!("{num}/{den}"),
            "-i",
            "pipe:0",
            "-c",
            "copy",
            "-movflags",
            "+faststart",
        ]);
        cmd.arg(&self.opts.out_path);
        cmd
    }

    fn close_child(&mut self) -> FramefxResult<()> {
        drop(self.stdin.take());
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = child
            .wait()
            .map_err(|e| FramefxError::sink(format!("failed to wait for ffmpeg to finish: {e}")))?;
        let stderr = join_stderr_drain(self.stderr_drain.take())?;
        if !status.success() {
            return Err(FramefxError::sink(format!(
                "ffmpeg exited with status {status}: {stderr}"
            )));
        }
        Ok(())
    }
}

impl SampleSink for FfmpegMp4Sink {
    #[tracing::instrument(skip_all, fields(out = %self.opts.out_path.display()))]
    fn begin(&mut self, desc: &VideoDescriptor) -> FramefxResult<()> {
        desc.validate()?;
        self.check_writable()?;
        if !is_ffmpeg_on_path() {
            return Err(SetupError::FailedToOpenWriter(
                "ffmpeg is required for MP4 output, but was not found on PATH".to_owned(),
            )
            .into());
        }
        self.gate.begin()?;

        let mut child = match self.command(desc).spawn() {
            Ok(child) => child,
            Err(e) => {
                self.gate.set(SinkState::Failed);
                return Err(
                    SetupError::FailedToOpenWriter(format!("failed to spawn ffmpeg: {e}")).into(),
                );
            }
        };
        let (Some(stdin), Some(stderr)) = (child.stdin.take(), child.stderr.take()) else {
            let _ = child.kill();
            let _ = child.wait();
            self.gate.set(SinkState::Failed);
            return Err(SetupError::FailedToOpenWriter(
                "failed to open ffmpeg pipes (unexpected)".to_owned(),
            )
            .into());
        };
        self.stderr_drain = Some(spawn_stderr_drain(stderr));
        self.stdin = Some(stdin);
        self.child = Some(child);
        Ok(())
    }

    fn state(&self) -> SinkState {
        self.gate.state()
    }

    fn append(&mut self, sample: EncodedSample) -> FramefxResult<()> {
        self.gate.check_append(sample.pts)?;
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(FramefxError::sink("mp4 writer input is closed"));
        };
        if let Err(e) = stdin.write_all(&sample.data) {
            self.gate.set(SinkState::Failed);
            return Err(FramefxError::sink(format!(
                "failed to write sample to ffmpeg: {e}"
            )));
        }
        Ok(())
    }

    fn mark_finished(&mut self) -> FramefxResult<()> {
        self.gate.mark_finished()?;
        drop(self.stdin.take());
        Ok(())
    }

    fn finalize(&mut self) -> FramefxResult<()> {
        self.gate.check_finalize()?;
        match self.close_child() {
            Ok(()) => {
                self.gate.set(SinkState::Completed);
                tracing::info!(out = %self.opts.out_path.display(), "mp4 finalized");
                Ok(())
            }
            Err(e) => {
                self.gate.set(SinkState::Failed);
                Err(e)
            }
        }
    }

    fn abort(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        let _ = join_stderr_drain(self.stderr_drain.take());
        let state = self.gate.state();
        if matches!(
            state,
            SinkState::Writing | SinkState::Finished | SinkState::Failed
        ) {
            let _ = std::fs::remove_file(&self.opts.out_path);
        }
        if !state.is_terminal() {
            self.gate.set(SinkState::Cancelled);
        }
    }

    fn output_path(&self) -> Option<&Path> {
        Some(&self.opts.out_path)
    }
}

impl Drop for FfmpegMp4Sink {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/ffmpeg.rs"]
mod tests;
