use smallvec::SmallVec;

use crate::foundation::error::{FramefxError, FramefxResult};

/// Mask values strictly above this are foreground.
pub const MASK_THRESHOLD: f32 = 0.5;

/// Regions with confidence strictly above this take part in compositing.
pub const CONFIDENCE_THRESHOLD: f32 = 0.5;

/// Per-pixel foreground probability aligned to a video frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Mask {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl Mask {
    /// All-background mask.
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, 0.0)
    }

    /// Mask with every value set to `value`.
    pub fn filled(width: u32, height: u32, value: f32) -> Self {
        Self {
            width,
            height,
            data: vec![value; width as usize * height as usize],
        }
    }

    /// Wrap row-major values.
    pub fn from_vec(width: u32, height: u32, data: Vec<f32>) -> FramefxResult<Self> {
        if data.len() != width as usize * height as usize {
            return Err(FramefxError::validation(format!(
                "mask has {} values, expected {}x{}",
                data.len(),
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row-major values.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Mutable row-major values, for engines writing in place.
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Resize to `width x height`, reusing the allocation. Values are reset to background.
    pub fn ensure_size(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.data.clear();
        self.data.resize(width as usize * height as usize, 0.0);
    }

    /// Value at `(x, y)`.
    #[inline]
    pub fn value_at(&self, x: u32, y: u32) -> f32 {
        self.data[y as usize * self.width as usize + x as usize]
    }

    /// Binary classification: `> 0.5` is foreground, `<= 0.5` (and NaN) is background.
    #[inline]
    pub fn is_foreground(&self, x: u32, y: u32) -> bool {
        is_foreground_value(self.value_at(x, y))
    }
}

/// Threshold one mask value.
#[inline]
pub fn is_foreground_value(v: f32) -> bool {
    v > MASK_THRESHOLD
}

/// A detected subject: a normalized bounding box plus a confidence score.
///
/// Box coordinates are in `[0, 1]` relative to the frame, with the origin at the top-left
/// corner (`x0, y0` is the top-left, `x1, y1` the bottom-right).
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Region {
    /// Normalized bounding box.
    pub bbox: kurbo::Rect,
    /// Detection confidence in `[0, 1]`.
    pub confidence: f32,
}

impl Region {
    /// Build a region from a normalized origin and size.
    pub fn new(x: f64, y: f64, width: f64, height: f64, confidence: f32) -> Self {
        Self {
            bbox: kurbo::Rect::new(x, y, x + width, y + height),
            confidence,
        }
    }

    /// Return `true` when the region participates in compositing.
    pub fn is_confident(&self) -> bool {
        self.confidence > CONFIDENCE_THRESHOLD
    }

    /// Return `true` when every coordinate is finite.
    pub fn is_finite(&self) -> bool {
        self.bbox.is_finite() && self.confidence.is_finite()
    }
}

/// Region list produced for one frame, in detection order.
pub type Regions = SmallVec<[Region; 4]>;

/// Which analysis a pipeline variant produces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnalysisKind {
    /// Segmentation mask.
    Mask,
    /// Detected regions.
    Regions,
}

/// Analysis of one frame.
///
/// Borrows the analyzer's reused buffers, so at most one result is live per frame and it cannot
/// outlive the composite step that consumes it.
#[derive(Clone, Copy, Debug)]
pub enum AnalysisResult<'a> {
    /// Foreground mask with the frame's pixel dimensions.
    Mask(&'a Mask),
    /// Detected regions, possibly empty.
    Regions(&'a [Region]),
}

impl AnalysisResult<'_> {
    /// The variant tag.
    pub fn kind(&self) -> AnalysisKind {
        match self {
            Self::Mask(_) => AnalysisKind::Mask,
            Self::Regions(_) => AnalysisKind::Regions,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/analysis/result.rs"]
mod tests;
