//! Engines that replay analysis produced offline, one entry per frame in decode order.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::analysis::detection::DetectionEngine;
use crate::analysis::result::{Mask, Region, Regions};
use crate::analysis::segmentation::{QualityLevel, SegmentationEngine};
use crate::foundation::error::{FramefxError, FramefxResult};
use crate::media::frame::RawFrame;

/// Replays grayscale mask images named `frame_000000.png`, `frame_000001.png`, ...
///
/// A missing image means the engine has no result for that frame. Images whose size differs from
/// the frame are resampled (triangle filter). The quality level is not used: masks were produced
/// ahead of time.
pub struct MaskSequence {
    dir: PathBuf,
    next_index: u64,
}

impl MaskSequence {
    /// Replay masks from `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> FramefxResult<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(FramefxError::validation(format!(
                "mask directory '{}' does not exist",
                dir.display()
            )));
        }
        Ok(Self { dir, next_index: 0 })
    }

    /// Path of the mask image for frame `index`.
    pub fn mask_path(dir: &Path, index: u64) -> PathBuf {
        dir.join(format!("frame_{index:06}.png"))
    }
}

impl SegmentationEngine for MaskSequence {
    fn segment(
        &mut self,
        frame: &RawFrame,
        _quality: QualityLevel,
        mask: &mut Mask,
    ) -> FramefxResult<bool> {
        let path = Self::mask_path(&self.dir, self.next_index);
        self.next_index += 1;
        if !path.is_file() {
            return Ok(false);
        }

        let img = image::open(&path)
            .with_context(|| format!("failed to decode mask '{}'", path.display()))?
            .to_luma8();
        let img = if img.dimensions() == (frame.width, frame.height) {
            img
        } else {
            image::imageops::resize(
                &img,
                frame.width,
                frame.height,
                image::imageops::FilterType::Triangle,
            )
        };

        for (dst, src) in mask.as_mut_slice().iter_mut().zip(img.as_raw()) {
            *dst = f32::from(*src) / 255.0;
        }
        Ok(true)
    }
}

#[derive(serde::Deserialize)]
struct RegionTrackFile {
    frames: BTreeMap<u64, Vec<RegionDef>>,
}

#[derive(serde::Deserialize)]
struct RegionDef {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    confidence: f32,
}

/// Replays per-frame regions from a JSON document:
///
/// ```json
/// { "frames": { "0": [ { "x": 0.4, "y": 0.2, "width": 0.2, "height": 0.3, "confidence": 0.97 } ] } }
/// ```
///
/// Coordinates are normalized with a top-left origin. Frames without an entry have no regions.
pub struct RegionTrack {
    frames: BTreeMap<u64, Vec<Region>>,
    next_index: u64,
}

impl RegionTrack {
    /// Load a track from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> FramefxResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read region track '{}'", path.display()))?;
        Self::from_json(&text)
    }

    /// Parse a track from JSON text.
    pub fn from_json(text: &str) -> FramefxResult<Self> {
        let file: RegionTrackFile = serde_json::from_str(text)
            .map_err(|e| FramefxError::validation(format!("invalid region track: {e}")))?;
        let frames = file
            .frames
            .into_iter()
            .map(|(idx, defs)| {
                let regions = defs
                    .into_iter()
                    .map(|d| Region::new(d.x, d.y, d.width, d.height, d.confidence))
                    .collect();
                (idx, regions)
            })
            .collect();
        Ok(Self {
            frames,
            next_index: 0,
        })
    }

    /// Number of frames with an entry.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Return `true` when no frame has an entry.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl DetectionEngine for RegionTrack {
    fn detect(&mut self, _frame: &RawFrame, out: &mut Regions) -> FramefxResult<()> {
        if let Some(regions) = self.frames.get(&self.next_index) {
            out.extend(regions.iter().copied());
        }
        self.next_index += 1;
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/analysis/replay.rs"]
mod tests;
