use std::path::PathBuf;

use crate::foundation::core::{MediaTime, VideoDescriptor};
use crate::foundation::error::FailureReason;

/// Counters for one run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct RunStats {
    /// Frames pulled from the source.
    pub frames_read: u64,
    /// Frames handed to the encoder.
    pub frames_submitted: u64,
    /// Samples appended to the sink.
    pub samples_written: u64,
    /// Samples dropped under [`crate::EncoderFailurePolicy::DropSample`].
    pub samples_dropped: u64,
}

/// Per-frame progress.
#[derive(Clone, Debug)]
pub struct ProgressReport {
    /// Zero-based index of the processed frame.
    pub frame_index: u64,
    /// Presentation timestamp of the frame.
    pub pts: MediaTime,
    /// Fraction of the input processed, in `[0, 1]` and non-decreasing over a run.
    pub progress: f64,
    /// Downscaled composite, when previews are enabled.
    pub preview: Option<image::RgbImage>,
}

/// Events reported by a running pipeline.
///
/// Every run ends with exactly one terminal event: `Failed` or `Completed`.
#[derive(Clone, Debug)]
pub enum PipelineEvent {
    /// Setup succeeded and frames are flowing.
    Started {
        /// Input track description.
        descriptor: VideoDescriptor,
    },
    /// One frame was composited and submitted.
    Progress(ProgressReport),
    /// A frame's sample was discarded and the run continues.
    SampleDropped {
        /// Submission sequence number of the frame.
        seq: u64,
        /// Why it was dropped.
        reason: FailureReason,
    },
    /// Terminal failure (including cancellation).
    Failed(FailureReason),
    /// Terminal success.
    Completed {
        /// Output location, for sinks that write one.
        output: Option<PathBuf>,
        /// Final counters.
        stats: RunStats,
    },
}

impl PipelineEvent {
    /// Return `true` for `Failed` and `Completed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed(_) | Self::Completed { .. })
    }
}

/// Final result of a run, returned by [`crate::PipelineHandle::join`].
#[derive(Clone, Debug)]
pub struct RunReport {
    /// Final counters.
    pub stats: RunStats,
    /// Output location on success, typed reason on failure.
    pub outcome: Result<Option<PathBuf>, FailureReason>,
}
