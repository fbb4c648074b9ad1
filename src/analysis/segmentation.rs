use std::fmt;
use std::str::FromStr;

use crate::analysis::analyzer::FrameAnalyzer;
use crate::analysis::result::{AnalysisKind, AnalysisResult, Mask};
use crate::foundation::core::Rgb8;
use crate::foundation::error::{FailureReason, FramefxError, FramefxResult};
use crate::media::frame::RawFrame;

/// Segmentation quality, trading latency for precision. Fixed for a whole run.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum QualityLevel {
    /// Highest precision, slowest.
    Accurate,
    /// Default trade-off.
    #[default]
    Balanced,
    /// Lowest latency.
    Fast,
}

impl QualityLevel {
    /// All levels, most precise first.
    pub const ALL: [QualityLevel; 3] = [Self::Accurate, Self::Balanced, Self::Fast];

    /// Stable lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accurate => "accurate",
            Self::Balanced => "balanced",
            Self::Fast => "fast",
        }
    }
}

impl fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityLevel {
    type Err = FramefxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|q| q.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                FramefxError::validation(format!(
                    "unknown quality level \"{s}\" (expected accurate, balanced or fast)"
                ))
            })
    }
}

/// Inference collaborator producing person/background masks.
pub trait SegmentationEngine: Send {
    /// Write a foreground mask for `frame` into `mask`, which is pre-sized to the frame.
    ///
    /// Returns `Ok(false)` when the engine produced no result for this frame.
    fn segment(
        &mut self,
        frame: &RawFrame,
        quality: QualityLevel,
        mask: &mut Mask,
    ) -> FramefxResult<bool>;
}

/// Segmentation variant of [`FrameAnalyzer`]: wraps an engine and owns the reused mask buffer.
pub struct SegmentationAnalyzer<E> {
    engine: E,
    quality: QualityLevel,
    mask: Mask,
}

impl<E: SegmentationEngine> SegmentationAnalyzer<E> {
    /// Wrap `engine`, running it at `quality` for every frame.
    pub fn new(engine: E, quality: QualityLevel) -> Self {
        Self {
            engine,
            quality,
            mask: Mask::new(0, 0),
        }
    }

    /// Configured quality.
    pub fn quality(&self) -> QualityLevel {
        self.quality
    }
}

impl<E: SegmentationEngine> FrameAnalyzer for SegmentationAnalyzer<E> {
    fn kind(&self) -> AnalysisKind {
        AnalysisKind::Mask
    }

    fn analyze(&mut self, frame: &RawFrame) -> Result<AnalysisResult<'_>, FailureReason> {
        self.mask.ensure_size(frame.width, frame.height);
        match self.engine.segment(frame, self.quality, &mut self.mask) {
            Ok(true) => {}
            Ok(false) => return Err(FailureReason::MissingSegmentationResult),
            Err(e) => return Err(FailureReason::Analysis(e.to_string())),
        }
        if self.mask.width() != frame.width || self.mask.height() != frame.height {
            return Err(FailureReason::Analysis(format!(
                "mask is {}x{}, frame is {}x{}",
                self.mask.width(),
                self.mask.height(),
                frame.width,
                frame.height
            )));
        }
        Ok(AnalysisResult::Mask(&self.mask))
    }
}

/// Chroma-key segmenter: pixels whose chroma is close to a key color are background.
///
/// Works directly on the NV12 chroma plane. Quality selects the block size over which chroma is
/// averaged: one chroma sample (`Accurate`), 2x2 samples (`Balanced`), 4x4 samples (`Fast`).
#[derive(Clone, Debug)]
pub struct ChromaKeySegmenter {
    key_cb: f32,
    key_cr: f32,
    tolerance: f32,
    softness: f32,
}

impl ChromaKeySegmenter {
    /// Key on `key` (an sRGB color, typically studio green).
    ///
    /// `tolerance` is the chroma distance (in 8-bit code values) fully keyed out; `softness` the
    /// width of the ramp above it.
    pub fn new(key: Rgb8, tolerance: f32, softness: f32) -> FramefxResult<Self> {
        if !(tolerance.is_finite() && tolerance >= 0.0) {
            return Err(FramefxError::validation("chroma key tolerance must be >= 0"));
        }
        if !(softness.is_finite() && softness >= 0.0) {
            return Err(FramefxError::validation("chroma key softness must be >= 0"));
        }
        let (key_cb, key_cr) = rgb_to_cbcr_bt709(key);
        Ok(Self {
            key_cb,
            key_cr,
            tolerance,
            softness,
        })
    }

    /// Studio green with default tolerance.
    pub fn green_screen() -> Self {
        let (key_cb, key_cr) = rgb_to_cbcr_bt709(Rgb8::new(0, 255, 0));
        Self {
            key_cb,
            key_cr,
            tolerance: 48.0,
            softness: 16.0,
        }
    }

    fn foreground(&self, cb: f32, cr: f32) -> f32 {
        let d = ((cb - self.key_cb).powi(2) + (cr - self.key_cr).powi(2)).sqrt();
        if d <= self.tolerance {
            0.0
        } else if self.softness <= 0.0 || d >= self.tolerance + self.softness {
            1.0
        } else {
            (d - self.tolerance) / self.softness
        }
    }
}

impl SegmentationEngine for ChromaKeySegmenter {
    fn segment(
        &mut self,
        frame: &RawFrame,
        quality: QualityLevel,
        mask: &mut Mask,
    ) -> FramefxResult<bool> {
        if !frame.has_pixels() {
            return Ok(false);
        }
        let block = match quality {
            QualityLevel::Accurate => 1usize,
            QualityLevel::Balanced => 2,
            QualityLevel::Fast => 4,
        };
        let (w, h) = (frame.width as usize, frame.height as usize);
        let (cw, ch) = (w / 2, h / 2);

        let mut by = 0;
        while by < ch {
            let bh = block.min(ch - by);
            let mut bx = 0;
            while bx < cw {
                let bw = block.min(cw - bx);
                let (mut sum_cb, mut sum_cr) = (0.0f32, 0.0f32);
                for cy in by..by + bh {
                    for cx in bx..bx + bw {
                        let i = (cy * cw + cx) * 2;
                        sum_cb += f32::from(frame.chroma[i]);
                        sum_cr += f32::from(frame.chroma[i + 1]);
                    }
                }
                let n = (bw * bh) as f32;
                let fg = self.foreground(sum_cb / n, sum_cr / n);

                let data = mask.as_mut_slice();
                for y in by * 2..((by + bh) * 2).min(h) {
                    let row = &mut data[y * w..(y + 1) * w];
                    row[bx * 2..((bx + bw) * 2).min(w)].fill(fg);
                }
                bx += block;
            }
            by += block;
        }
        Ok(true)
    }
}

/// Forward BT.709 video-range chroma of an sRGB color, in 8-bit code values.
pub(crate) fn rgb_to_cbcr_bt709(c: Rgb8) -> (f32, f32) {
    let r = f32::from(c.r) / 255.0;
    let g = f32::from(c.g) / 255.0;
    let b = f32::from(c.b) / 255.0;
    let cb = -0.114_572 * r - 0.385_428 * g + 0.5 * b;
    let cr = 0.5 * r - 0.454_153 * g - 0.045_847 * b;
    (128.0 + 224.0 * cb, 128.0 + 224.0 * cr)
}

#[cfg(test)]
#[path = "../../tests/unit/analysis/segmentation.rs"]
mod tests;
