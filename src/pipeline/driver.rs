use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender, TryRecvError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::analysis::analyzer::FrameAnalyzer;
use crate::encode::encoder::{EncodedSample, Encoder, EncoderEvent};
use crate::encode::sink::{SampleSink, SinkState};
use crate::foundation::core::VideoDescriptor;
use crate::foundation::error::{FailureReason, FramefxError, FramefxResult};
use crate::media::frame::RawFrame;
use crate::media::source::{FrameSource, SourceStatus};
use crate::pipeline::events::{PipelineEvent, ProgressReport, RunReport, RunStats};
use crate::pipeline::opts::{EncoderFailurePolicy, PipelineOpts};
use crate::pipeline::reorder::ReorderBuffer;
use crate::pipeline::state::PipelineState;
use crate::render::compositor::CompositeBackend;
use crate::render::frame_pool::{CompositeFrame, FramePool};

const COMPLETION_POLL: Duration = Duration::from_millis(20);

struct Parts {
    source: Box<dyn FrameSource>,
    analyzer: Box<dyn FrameAnalyzer>,
    compositor: Box<dyn CompositeBackend>,
    encoder: Box<dyn Encoder>,
    sink: Box<dyn SampleSink>,
}

/// Frame pipeline: decode, analyze, composite, encode, write.
///
/// Collaborators are injected at construction. [`PipelineDriver::start`] moves them onto a
/// dedicated driver thread, which is the only place pipeline state changes. Encoder completions
/// arrive on a channel that the same thread drains, so "submit the next frame" and "handle a
/// completion" never race.
pub struct PipelineDriver {
    desc: VideoDescriptor,
    opts: PipelineOpts,
    parts: Option<Parts>,
}

impl PipelineDriver {
    /// Assemble a pipeline. The analyzer and compositor must agree on the analysis variant.
    pub fn new(
        source: impl FrameSource + 'static,
        analyzer: impl FrameAnalyzer + 'static,
        compositor: impl CompositeBackend + 'static,
        encoder: impl Encoder + 'static,
        sink: impl SampleSink + 'static,
        opts: PipelineOpts,
    ) -> FramefxResult<Self> {
        opts.validate()?;
        let desc = source.descriptor();
        desc.validate()?;
        if analyzer.kind() != compositor.expects() {
            return Err(FramefxError::validation(format!(
                "analyzer produces {:?} results but the compositor expects {:?}",
                analyzer.kind(),
                compositor.expects()
            )));
        }
        Ok(Self {
            desc,
            opts,
            parts: Some(Parts {
                source: Box::new(source),
                analyzer: Box::new(analyzer),
                compositor: Box::new(compositor),
                encoder: Box::new(encoder),
                sink: Box::new(sink),
            }),
        })
    }

    /// Input track description.
    pub fn descriptor(&self) -> VideoDescriptor {
        self.desc
    }

    /// Options in effect.
    pub fn opts(&self) -> &PipelineOpts {
        &self.opts
    }

    /// Return `true` once [`PipelineDriver::start`] has been called.
    pub fn is_started(&self) -> bool {
        self.parts.is_none()
    }

    /// Start the run on a driver thread.
    ///
    /// Returns `None` when the pipeline was already started; a pipeline runs at most once.
    /// Setup failures (reader or writer cannot start) are reported as the run's terminal
    /// `Failed` event.
    pub fn start(&mut self) -> Option<PipelineHandle> {
        let Some(parts) = self.parts.take() else {
            tracing::debug!("pipeline already started");
            return None;
        };
        let (event_tx, event_rx) = mpsc::sync_channel(self.opts.event_capacity);
        let cancel = CancelToken::default();
        let desc = self.desc;
        let opts = self.opts;
        let token = cancel.clone();
        let thread = std::thread::spawn(move || {
            let mut run = DriverLoop::new(parts, desc, opts, event_tx, token);
            run.run()
        });
        Some(PipelineHandle {
            events: event_rx,
            cancel,
            thread,
        })
    }
}

/// Shared cancellation flag for a running pipeline.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Request cancellation. The driver stops pumping, tears the encoder down and aborts the
    /// sink without finalizing.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Return `true` once cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Caller's side of a running pipeline.
pub struct PipelineHandle {
    events: Receiver<PipelineEvent>,
    cancel: CancelToken,
    thread: JoinHandle<RunReport>,
}

impl PipelineHandle {
    /// Event stream. The channel is bounded, so a caller that wants events must keep draining
    /// it; callers that do not can go straight to [`PipelineHandle::join`].
    pub fn events(&self) -> &Receiver<PipelineEvent> {
        &self.events
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token that cancels this run from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Deliver every event to `on_event` until the terminal one, then join.
    pub fn wait_with(self, mut on_event: impl FnMut(&PipelineEvent)) -> RunReport {
        for event in self.events.iter() {
            on_event(&event);
            if event.is_terminal() {
                break;
            }
        }
        self.join()
    }

    /// Wait for the driver thread. Events not yet received are discarded.
    pub fn join(self) -> RunReport {
        let Self { events, thread, .. } = self;
        drop(events);
        thread.join().unwrap_or_else(|_| RunReport {
            stats: RunStats::default(),
            outcome: Err(FailureReason::Internal(
                "pipeline driver thread panicked".to_owned(),
            )),
        })
    }
}

/// Encoder, sink and source for one run. Released exactly once, on every exit path.
struct RunResources {
    source: Box<dyn FrameSource>,
    encoder: Box<dyn Encoder>,
    sink: Box<dyn SampleSink>,
    released: bool,
}

impl RunResources {
    /// Tear down without finalizing.
    fn abort(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.encoder.invalidate();
        self.sink.abort();
        if self.source.status() == SourceStatus::Reading {
            self.source.cancel();
        }
        tracing::debug!("run resources aborted");
    }

    /// Mark a successful teardown done by the finish path.
    fn mark_released(&mut self) {
        self.released = true;
    }
}

impl Drop for RunResources {
    fn drop(&mut self) {
        self.abort();
    }
}

struct DriverLoop {
    res: RunResources,
    analyzer: Box<dyn FrameAnalyzer>,
    compositor: Box<dyn CompositeBackend>,

    desc: VideoDescriptor,
    opts: PipelineOpts,

    frame: RawFrame,
    pool: FramePool,
    reorder: ReorderBuffer<Option<EncodedSample>>,
    completions: Receiver<EncoderEvent>,
    completion_tx: Option<Sender<EncoderEvent>>,

    events: SyncSender<PipelineEvent>,
    cancel: CancelToken,

    state: PipelineState,
    stats: RunStats,
    next_seq: u64,
    progress: f64,
}

impl DriverLoop {
    fn new(
        parts: Parts,
        desc: VideoDescriptor,
        opts: PipelineOpts,
        events: SyncSender<PipelineEvent>,
        cancel: CancelToken,
    ) -> Self {
        let (completion_tx, completions) = mpsc::channel();
        Self {
            res: RunResources {
                source: parts.source,
                encoder: parts.encoder,
                sink: parts.sink,
                released: false,
            },
            analyzer: parts.analyzer,
            compositor: parts.compositor,
            desc,
            opts,
            frame: RawFrame::empty(),
            pool: FramePool::new(desc.width, desc.height, opts.max_in_flight),
            reorder: ReorderBuffer::new(),
            completions,
            completion_tx: Some(completion_tx),
            events,
            cancel,
            state: PipelineState::Idle,
            stats: RunStats::default(),
            next_seq: 0,
            progress: 0.0,
        }
    }

    #[tracing::instrument(name = "pipeline", skip_all, fields(width = self.desc.width, height = self.desc.height))]
    fn run(&mut self) -> RunReport {
        let outcome = self.execute();
        match &outcome {
            Ok(output) => {
                let _ = self.state.transition(PipelineState::Completed);
                tracing::info!(
                    frames = self.stats.frames_submitted,
                    samples = self.stats.samples_written,
                    dropped = self.stats.samples_dropped,
                    "pipeline completed"
                );
                self.emit(PipelineEvent::Completed {
                    output: output.clone(),
                    stats: self.stats,
                });
            }
            Err(reason) => {
                let next = if *reason == FailureReason::ReadingCancelled {
                    PipelineState::Cancelled
                } else {
                    PipelineState::Failed
                };
                let _ = self.state.transition(next);
                self.res.abort();
                tracing::warn!(state = ?self.state, "pipeline ended: {reason}");
                self.emit(PipelineEvent::Failed(reason.clone()));
            }
        }
        RunReport {
            stats: self.stats,
            outcome,
        }
    }

    fn execute(&mut self) -> Result<Option<PathBuf>, FailureReason> {
        self.setup()?;
        while self.process_next()? {}
        self.finish()
    }

    fn setup(&mut self) -> Result<(), FailureReason> {
        let desc = self.desc;
        self.compositor
            .prepare(desc.width, desc.height)
            .map_err(|e| FailureReason::Internal(format!("compositor setup failed: {e}")))?;
        self.res.source.start_reading().map_err(|e| {
            tracing::error!("failed to start reading: {e}");
            FailureReason::FailedToStartReading
        })?;
        let completion_tx = self
            .completion_tx
            .take()
            .ok_or_else(|| FailureReason::Internal("pipeline set up twice".to_owned()))?;
        self.res.encoder.begin(&desc, completion_tx).map_err(|e| {
            tracing::error!("failed to start encoder: {e}");
            FailureReason::FailedToStartWriting
        })?;
        self.res.sink.begin(&desc).map_err(|e| {
            tracing::error!("failed to start writer: {e}");
            FailureReason::FailedToStartWriting
        })?;

        self.state.transition(PipelineState::Reading)?;
        tracing::info!(
            frames = desc.frame_count_hint(),
            fps = desc.frame_duration.as_secs_f64().recip(),
            "pipeline started"
        );
        self.emit(PipelineEvent::Started { descriptor: desc });
        Ok(())
    }

    /// One pump step. Returns `false` once the source has no more frames.
    fn process_next(&mut self) -> Result<bool, FailureReason> {
        self.check_cancelled()?;
        self.pump_completions()?;

        if !self.res.source.read_next(&mut self.frame) {
            return Ok(false);
        }
        let index = self.stats.frames_read;
        self.stats.frames_read += 1;
        if !self.frame.has_pixels() {
            return Err(FailureReason::MissingFrameImageBuffer);
        }

        // Lease before analysis: the analysis result borrows the analyzer until compositing ends.
        let mut target = self.acquire_target()?;
        let composited = match self.analyzer.analyze(&self.frame) {
            Ok(analysis) => self
                .compositor
                .composite(&self.frame, analysis, &mut target),
            Err(reason) => Err(reason),
        };
        if let Err(reason) = composited {
            self.pool.release(target)?;
            return Err(reason);
        }

        let preview = if self.opts.preview.enabled {
            target.thumbnail(self.opts.preview.max_dim)
        } else {
            None
        };

        let seq = self.next_seq;
        let pts = self.frame.pts;
        let duration = self.desc.frame_duration;
        self.res
            .encoder
            .submit(seq, target, pts, duration)
            .map_err(|e| FailureReason::EncoderFailed {
                status: -1,
                detail: e.to_string(),
            })?;
        self.next_seq += 1;
        self.stats.frames_submitted += 1;
        tracing::trace!(frame = index, seq, pts = pts.as_secs_f64(), "frame submitted");

        let end = pts.checked_add(duration).unwrap_or(pts);
        self.progress = end.fraction_of(self.desc.duration).max(self.progress);
        self.emit(PipelineEvent::Progress(ProgressReport {
            frame_index: index,
            pts,
            progress: self.progress,
            preview,
        }));
        Ok(true)
    }

    fn finish(&mut self) -> Result<Option<PathBuf>, FailureReason> {
        self.state.transition(PipelineState::Finishing)?;
        match self.res.source.status() {
            SourceStatus::Completed => {}
            SourceStatus::Failed(msg) => return Err(FailureReason::FailedToRead(msg)),
            SourceStatus::Cancelled => return Err(FailureReason::ReadingCancelled),
            SourceStatus::Unknown | SourceStatus::Reading => {
                return Err(FailureReason::InconsistentState);
            }
        }

        self.res
            .encoder
            .flush()
            .map_err(|e| FailureReason::EncoderFailed {
                status: -1,
                detail: e.to_string(),
            })?;
        while self.reorder.next_seq() < self.next_seq {
            self.wait_for_completion()?;
        }
        self.res.encoder.invalidate();

        let sink = &mut self.res.sink;
        sink.mark_finished()
            .map_err(|e| FailureReason::FailedToWrite(e.to_string()))?;
        sink.finalize()
            .map_err(|e| FailureReason::FailedToWrite(e.to_string()))?;
        let output = sink.output_path().map(Path::to_path_buf);
        self.res.mark_released();
        Ok(output)
    }

    fn check_cancelled(&self) -> Result<(), FailureReason> {
        if self.cancel.is_cancelled() {
            return Err(FailureReason::ReadingCancelled);
        }
        Ok(())
    }

    fn acquire_target(&mut self) -> Result<CompositeFrame, FailureReason> {
        loop {
            if let Some(target) = self.pool.try_acquire() {
                return Ok(target);
            }
            self.wait_for_completion()?;
        }
    }

    /// Handle every completion already queued, without blocking.
    fn pump_completions(&mut self) -> Result<(), FailureReason> {
        loop {
            match self.completions.try_recv() {
                Ok(event) => self.on_encoder_event(event)?,
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return Ok(()),
            }
        }
    }

    /// Block until one completion arrives or the run is cancelled.
    fn wait_for_completion(&mut self) -> Result<(), FailureReason> {
        loop {
            self.check_cancelled()?;
            match self.completions.recv_timeout(COMPLETION_POLL) {
                Ok(event) => return self.on_encoder_event(event),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(FailureReason::Internal(
                        "encoder stopped before delivering every result".to_owned(),
                    ));
                }
            }
        }
    }

    fn on_encoder_event(&mut self, event: EncoderEvent) -> Result<(), FailureReason> {
        match event {
            EncoderEvent::FrameReleased(frame) => self.pool.release(frame),
            EncoderEvent::Encoded { seq, result } => {
                let item = match result {
                    Ok(sample) => Some(sample),
                    Err(failure) => {
                        let reason = FailureReason::EncoderFailed {
                            status: failure.status,
                            detail: failure.detail,
                        };
                        self.drop_or_fail(seq, reason)?;
                        None
                    }
                };
                self.reorder.insert(seq, item)?;
                self.write_ready()
            }
        }
    }

    /// Append every in-order sample to the sink.
    fn write_ready(&mut self) -> Result<(), FailureReason> {
        while let Some((seq, item)) = self.reorder.pop_ready() {
            let Some(sample) = item else { continue };
            let state = self.res.sink.state();
            if state != SinkState::Writing {
                self.drop_or_fail(
                    seq,
                    FailureReason::FailedToWrite(format!("writer is not writing (state {state:?})")),
                )?;
                continue;
            }
            match self.res.sink.append(sample) {
                Ok(()) => self.stats.samples_written += 1,
                Err(e) => self.drop_or_fail(seq, FailureReason::FailedToWrite(e.to_string()))?,
            }
        }
        Ok(())
    }

    fn drop_or_fail(&mut self, seq: u64, reason: FailureReason) -> Result<(), FailureReason> {
        match self.opts.encoder_failure {
            EncoderFailurePolicy::Fail => Err(reason),
            EncoderFailurePolicy::DropSample => {
                tracing::warn!(seq, "sample dropped: {reason}");
                self.stats.samples_dropped += 1;
                self.emit(PipelineEvent::SampleDropped { seq, reason });
                Ok(())
            }
        }
    }

    fn emit(&self, event: PipelineEvent) {
        // A dropped receiver means nobody is listening; the run continues regardless.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/driver.rs"]
mod tests;
