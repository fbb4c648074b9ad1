use crate::analysis::analyzer::FrameAnalyzer;
use crate::analysis::result::{AnalysisKind, AnalysisResult, Regions};
use crate::foundation::error::{FailureReason, FramefxResult};
use crate::media::frame::RawFrame;

/// Inference collaborator producing subject bounding boxes.
pub trait DetectionEngine: Send {
    /// Append the regions detected in `frame` to `out` (cleared by the caller).
    ///
    /// Finding nothing is a valid outcome, not an error.
    fn detect(&mut self, frame: &RawFrame, out: &mut Regions) -> FramefxResult<()>;
}

/// Detection variant of [`FrameAnalyzer`]: wraps an engine and owns the reused region list.
pub struct DetectionAnalyzer<E> {
    engine: E,
    regions: Regions,
}

impl<E: DetectionEngine> DetectionAnalyzer<E> {
    /// Wrap `engine`.
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            regions: Regions::new(),
        }
    }
}

impl<E: DetectionEngine> FrameAnalyzer for DetectionAnalyzer<E> {
    fn kind(&self) -> AnalysisKind {
        AnalysisKind::Regions
    }

    fn analyze(&mut self, frame: &RawFrame) -> Result<AnalysisResult<'_>, FailureReason> {
        self.regions.clear();
        self.engine
            .detect(frame, &mut self.regions)
            .map_err(|e| FailureReason::Analysis(e.to_string()))?;
        if let Some(bad) = self.regions.iter().find(|r| !r.is_finite()) {
            return Err(FailureReason::Analysis(format!(
                "detector returned a non-finite region: {bad:?}"
            )));
        }
        Ok(AnalysisResult::Regions(&self.regions))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/analysis/detection.rs"]
mod tests;
