use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::encode::encoder::EncodedSample;
use crate::foundation::core::{MediaTime, VideoDescriptor};
use crate::foundation::error::{FramefxError, FramefxResult};

/// Lifecycle of a sample sink.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SinkState {
    /// Not started.
    Idle,
    /// Accepting samples.
    Writing,
    /// Input marked finished; waiting for `finalize`.
    Finished,
    /// Output finalized.
    Completed,
    /// Writing failed.
    Failed,
    /// Torn down without finalizing.
    Cancelled,
}

impl SinkState {
    /// Return `true` once no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Append-only consumer of compressed samples.
///
/// Ordering contract: `append` is called with strictly increasing presentation timestamps.
/// `finalize` is terminal and must succeed at most once.
pub trait SampleSink: Send {
    /// Open the output for a track described by `desc`. `Idle -> Writing`.
    fn begin(&mut self, desc: &VideoDescriptor) -> FramefxResult<()>;

    /// Current state.
    fn state(&self) -> SinkState;

    /// Append one sample. Rejected unless the sink is `Writing`.
    fn append(&mut self, sample: EncodedSample) -> FramefxResult<()>;

    /// No more samples will follow. `Writing -> Finished`.
    fn mark_finished(&mut self) -> FramefxResult<()>;

    /// Complete the output. `Finished -> Completed`.
    fn finalize(&mut self) -> FramefxResult<()>;

    /// Tear down without finalizing and discard partial output.
    fn abort(&mut self);

    /// Location of the finished output, if the sink writes one.
    fn output_path(&self) -> Option<&Path> {
        None
    }
}

impl<S: SampleSink + ?Sized> SampleSink for Box<S> {
    fn begin(&mut self, desc: &VideoDescriptor) -> FramefxResult<()> {
        (**self).begin(desc)
    }

    fn state(&self) -> SinkState {
        (**self).state()
    }

    fn append(&mut self, sample: EncodedSample) -> FramefxResult<()> {
        (**self).append(sample)
    }

    fn mark_finished(&mut self) -> FramefxResult<()> {
        (**self).mark_finished()
    }

    fn finalize(&mut self) -> FramefxResult<()> {
        (**self).finalize()
    }

    fn abort(&mut self) {
        (**self).abort()
    }

    fn output_path(&self) -> Option<&Path> {
        (**self).output_path()
    }
}

/// Tracks state transitions and timestamp order for sink implementations.
#[derive(Debug)]
pub(crate) struct SinkGate {
    state: SinkState,
    last_pts: Option<MediaTime>,
}

impl SinkGate {
    pub(crate) fn new() -> Self {
        Self {
            state: SinkState::Idle,
            last_pts: None,
        }
    }

    pub(crate) fn state(&self) -> SinkState {
        self.state
    }

    pub(crate) fn set(&mut self, state: SinkState) {
        self.state = state;
    }

    pub(crate) fn begin(&mut self) -> FramefxResult<()> {
        if self.state != SinkState::Idle {
            return Err(FramefxError::sink(format!(
                "cannot begin a sink in state {:?}",
                self.state
            )));
        }
        self.state = SinkState::Writing;
        self.last_pts = None;
        Ok(())
    }

    pub(crate) fn check_append(&mut self, pts: MediaTime) -> FramefxResult<()> {
        if self.state != SinkState::Writing {
            return Err(FramefxError::sink(format!(
                "sink is not writing (state {:?})",
                self.state
            )));
        }
        if let Some(last) = self.last_pts
            && pts <= last
        {
            return Err(FramefxError::sink(format!(
                "out-of-order sample: pts {:.6}s after {:.6}s",
                pts.as_secs_f64(),
                last.as_secs_f64()
            )));
        }
        self.last_pts = Some(pts);
        Ok(())
    }

    pub(crate) fn mark_finished(&mut self) -> FramefxResult<()> {
        match self.state {
            SinkState::Writing => {
                self.state = SinkState::Finished;
                Ok(())
            }
            SinkState::Finished => Ok(()),
            other => Err(FramefxError::sink(format!(
                "cannot finish input in state {other:?}"
            ))),
        }
    }

    pub(crate) fn check_finalize(&self) -> FramefxResult<()> {
        match self.state {
            SinkState::Finished => Ok(()),
            SinkState::Completed => Err(FramefxError::sink("sink already finalized")),
            other => Err(FramefxError::sink(format!(
                "cannot finalize in state {other:?}"
            ))),
        }
    }
}

#[derive(Debug)]
struct Recorded {
    desc: Option<VideoDescriptor>,
    samples: Vec<EncodedSample>,
    gate: SinkGate,
    finalize_calls: u32,
    aborted: bool,
}

/// In-memory sink for tests and debugging.
///
/// Clones share storage, so a clone kept by the caller observes what the pipeline wrote.
#[derive(Clone, Debug)]
pub struct InMemorySink {
    inner: Arc<Mutex<Recorded>>,
}

impl Default for InMemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySink {
    /// Create a new in-memory sink.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Recorded {
                desc: None,
                samples: Vec::new(),
                gate: SinkGate::new(),
                finalize_calls: 0,
                aborted: false,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Descriptor captured in `begin`, if any.
    pub fn descriptor(&self) -> Option<VideoDescriptor> {
        self.lock().desc
    }

    /// Copies of the appended samples, in append order.
    pub fn samples(&self) -> Vec<EncodedSample> {
        self.lock().samples.clone()
    }

    /// Number of `finalize` calls, successful or not.
    pub fn finalize_calls(&self) -> u32 {
        self.lock().finalize_calls
    }

    /// Return `true` when the sink was aborted.
    pub fn was_aborted(&self) -> bool {
        self.lock().aborted
    }
}

impl SampleSink for InMemorySink {
    fn begin(&mut self, desc: &VideoDescriptor) -> FramefxResult<()> {
        let mut r = self.lock();
        r.gate.begin()?;
        r.desc = Some(*desc);
        r.samples.clear();
        Ok(())
    }

    fn state(&self) -> SinkState {
        self.lock().gate.state()
    }

    fn append(&mut self, sample: EncodedSample) -> FramefxResult<()> {
        let mut r = self.lock();
        r.gate.check_append(sample.pts)?;
        r.samples.push(sample);
        Ok(())
    }

    fn mark_finished(&mut self) -> FramefxResult<()> {
        self.lock().gate.mark_finished()
    }

    fn finalize(&mut self) -> FramefxResult<()> {
        let mut r = self.lock();
        r.finalize_calls += 1;
        r.gate.check_finalize()?;
        r.gate.set(SinkState::Completed);
        Ok(())
    }

    fn abort(&mut self) {
        let mut r = self.lock();
        if !r.gate.state().is_terminal() {
            r.gate.set(SinkState::Cancelled);
        }
        r.aborted = true;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/sink.rs"]
mod tests;
