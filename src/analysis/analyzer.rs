use crate::analysis::result::{AnalysisKind, AnalysisResult};
use crate::foundation::error::FailureReason;
use crate::media::frame::RawFrame;

/// Variant-specific analysis strategy injected into the driver.
///
/// `analyze` runs synchronously on the driver thread, one frame at a time. A returned error
/// aborts the run with that reason.
pub trait FrameAnalyzer: Send {
    /// The result variant this analyzer produces.
    fn kind(&self) -> AnalysisKind;

    /// Analyze one decoded frame.
    fn analyze(&mut self, frame: &RawFrame) -> Result<AnalysisResult<'_>, FailureReason>;
}

impl<A: FrameAnalyzer + ?Sized> FrameAnalyzer for Box<A> {
    fn kind(&self) -> AnalysisKind {
        (**self).kind()
    }

    fn analyze(&mut self, frame: &RawFrame) -> Result<AnalysisResult<'_>, FailureReason> {
        (**self).analyze(frame)
    }
}
