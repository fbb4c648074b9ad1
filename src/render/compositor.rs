use std::path::Path;

use rayon::prelude::*;

use crate::analysis::result::{AnalysisKind, AnalysisResult, Mask, Region, is_foreground_value};
use crate::foundation::core::Rgb8;
use crate::foundation::error::{FailureReason, FramefxResult, SetupError};
use crate::foundation::math::blend_over_u8;
use crate::media::frame::RawFrame;
use crate::render::color::{TargetEncoding, ycbcr8_to_rgb8};
use crate::render::frame_pool::CompositeFrame;

/// Overlays are drawn at this multiple of the detected box size, centered on the box.
pub const OVERLAY_SCALE: f64 = 1.5;

/// Replacement shown where a segmentation mask is background.
#[derive(Clone, Debug)]
pub enum BackgroundFill {
    /// Flat color.
    Color(Rgb8),
    /// Image, scaled to cover the frame (center crop).
    Image(image::RgbImage),
}

/// Content composited over the decoded frame. Fixed for the whole sequence.
#[derive(Clone, Debug)]
pub enum OverlayContent {
    /// Segmentation variant: background replacement.
    Background(BackgroundFill),
    /// Detection variant: RGBA image (straight alpha) drawn over each confident region.
    RegionOverlay(image::RgbaImage),
}

impl OverlayContent {
    /// Flat background color.
    pub fn background_color(color: Rgb8) -> Self {
        Self::Background(BackgroundFill::Color(color))
    }

    /// Background image loaded from disk.
    pub fn background_image(path: impl AsRef<Path>) -> FramefxResult<Self> {
        let img = load_image(path.as_ref())?.to_rgb8();
        Ok(Self::Background(BackgroundFill::Image(img)))
    }

    /// Region overlay loaded from disk.
    pub fn region_overlay(path: impl AsRef<Path>) -> FramefxResult<Self> {
        let img = load_image(path.as_ref())?.to_rgba8();
        Ok(Self::RegionOverlay(img))
    }

    /// Analysis variant this content composites with.
    pub fn expects(&self) -> AnalysisKind {
        match self {
            Self::Background(_) => AnalysisKind::Mask,
            Self::RegionOverlay(_) => AnalysisKind::Regions,
        }
    }
}

fn load_image(path: &Path) -> FramefxResult<image::DynamicImage> {
    let img = image::ImageReader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map_err(|e| SetupError::OverlayAsset(format!("{}: {e}", path.display())))?
        .decode()
        .map_err(|e| SetupError::OverlayAsset(format!("{}: {e}", path.display())))?;
    if img.width() == 0 || img.height() == 0 {
        return Err(SetupError::OverlayAsset(format!("{}: image is empty", path.display())).into());
    }
    Ok(img)
}

/// Turns one decoded frame plus its analysis into a composited RGB frame.
///
/// `composite` returns only after every pixel of `target` is written, so the caller may hand the
/// target to the encoder immediately afterwards.
pub trait CompositeBackend: Send {
    /// Analysis variant this backend expects.
    fn expects(&self) -> AnalysisKind;

    /// Size per-run resources for `width x height` frames. Called once at setup.
    fn prepare(&mut self, width: u32, height: u32) -> FramefxResult<()>;

    /// Composite one frame into `target`.
    fn composite(
        &mut self,
        frame: &RawFrame,
        analysis: AnalysisResult<'_>,
        target: &mut CompositeFrame,
    ) -> Result<(), FailureReason>;
}

impl<B: CompositeBackend + ?Sized> CompositeBackend for Box<B> {
    fn expects(&self) -> AnalysisKind {
        (**self).expects()
    }

    fn prepare(&mut self, width: u32, height: u32) -> FramefxResult<()> {
        (**self).prepare(width, height)
    }

    fn composite(
        &mut self,
        frame: &RawFrame,
        analysis: AnalysisResult<'_>,
        target: &mut CompositeFrame,
    ) -> Result<(), FailureReason> {
        (**self).composite(frame, analysis, target)
    }
}

/// Row-parallel CPU compositor.
///
/// Every output pixel starts from the video-range BT.709 conversion in
/// [`crate::render::color`]. Segmentation selects per pixel between that color and the
/// background (`mask > 0.5` keeps the frame). Detection draws the overlay over each region with
/// confidence `> 0.5`, in list order, scaled by [`OVERLAY_SCALE`] and nearest-sampled.
pub struct CpuCompositor {
    overlay: OverlayContent,
    encoding: TargetEncoding,
    background: Option<image::RgbImage>,
}

impl CpuCompositor {
    /// Compositor for `overlay` writing an sRGB-encoded target.
    pub fn new(overlay: OverlayContent) -> Self {
        Self {
            overlay,
            encoding: TargetEncoding::default(),
            background: None,
        }
    }

    /// Select how linear values are stored.
    pub fn with_encoding(mut self, encoding: TargetEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// The overlay content.
    pub fn overlay(&self) -> &OverlayContent {
        &self.overlay
    }

    fn ensure_background(&mut self, width: u32, height: u32) {
        let OverlayContent::Background(BackgroundFill::Image(src)) = &self.overlay else {
            return;
        };
        if let Some(bg) = &self.background
            && bg.dimensions() == (width, height)
        {
            return;
        }
        let scaled = image::DynamicImage::ImageRgb8(src.clone())
            .resize_to_fill(width, height, image::imageops::FilterType::Triangle)
            .to_rgb8();
        self.background = Some(scaled);
    }

    fn composite_mask(
        &self,
        frame: &RawFrame,
        mask: &Mask,
        fill: &BackgroundFill,
        target: &mut CompositeFrame,
    ) -> Result<(), FailureReason> {
        if mask.width() != frame.width || mask.height() != frame.height {
            return Err(FailureReason::Analysis(format!(
                "mask is {}x{}, frame is {}x{}",
                mask.width(),
                mask.height(),
                frame.width,
                frame.height
            )));
        }

        let encoding = self.encoding;
        let width = frame.width as usize;
        let stride = target.stride();
        let image_bg = match fill {
            BackgroundFill::Color(_) => None,
            BackgroundFill::Image(_) => match &self.background {
                Some(bg) => Some(bg.as_raw().as_slice()),
                None => return Err(FailureReason::InconsistentState),
            },
        };
        let color_bg = match fill {
            BackgroundFill::Color(c) => c.to_array(),
            BackgroundFill::Image(_) => [0; 3],
        };

        target
            .data
            .par_chunks_mut(stride)
            .enumerate()
            .for_each(|(y, row)| {
                let mask_row = &mask.as_slice()[y * width..(y + 1) * width];
                let bg_row = image_bg.map(|bg| &bg[y * stride..(y + 1) * stride]);
                for (x, (px, &m)) in row.chunks_exact_mut(3).zip(mask_row).enumerate() {
                    let rgb = if is_foreground_value(m) {
                        let (cb, cr) = frame.chroma_at(x as u32, y as u32);
                        ycbcr8_to_rgb8(frame.luma_at(x as u32, y as u32), cb, cr, encoding)
                    } else if let Some(bg) = bg_row {
                        [bg[x * 3], bg[x * 3 + 1], bg[x * 3 + 2]]
                    } else {
                        color_bg
                    };
                    px.copy_from_slice(&rgb);
                }
            });
        Ok(())
    }

    fn composite_regions(
        &self,
        frame: &RawFrame,
        regions: &[Region],
        overlay: &image::RgbaImage,
        target: &mut CompositeFrame,
    ) {
        convert_frame(frame, self.encoding, target);
        for region in regions.iter().filter(|r| r.is_confident()) {
            draw_overlay(target, overlay, region);
        }
    }
}

impl CompositeBackend for CpuCompositor {
    fn expects(&self) -> AnalysisKind {
        self.overlay.expects()
    }

    fn prepare(&mut self, width: u32, height: u32) -> FramefxResult<()> {
        if width == 0 || height == 0 {
            return Err(SetupError::ResourceAllocation(format!(
                "cannot composite {width}x{height} frames"
            ))
            .into());
        }
        self.ensure_background(width, height);
        Ok(())
    }

    #[tracing::instrument(level = "trace", skip_all, fields(pts = ?frame.pts))]
    fn composite(
        &mut self,
        frame: &RawFrame,
        analysis: AnalysisResult<'_>,
        target: &mut CompositeFrame,
    ) -> Result<(), FailureReason> {
        if !frame.has_pixels() {
            return Err(FailureReason::MissingFrameImageBuffer);
        }
        if target.width != frame.width
            || target.height != frame.height
            || target.data.len() != target.stride() * target.height as usize
        {
            return Err(FailureReason::Internal(format!(
                "composite target is {}x{}, frame is {}x{}",
                target.width, target.height, frame.width, frame.height
            )));
        }
        self.ensure_background(frame.width, frame.height);

        match (analysis, &self.overlay) {
            (AnalysisResult::Mask(mask), OverlayContent::Background(fill)) => {
                self.composite_mask(frame, mask, fill, target)
            }
            (AnalysisResult::Regions(regions), OverlayContent::RegionOverlay(img)) => {
                self.composite_regions(frame, regions, img, target);
                Ok(())
            }
            (analysis, overlay) => Err(FailureReason::Internal(format!(
                "{:?} analysis cannot composite with {:?} overlay",
                analysis.kind(),
                overlay.expects()
            ))),
        }
    }
}

/// Convert the whole frame into `target`.
pub fn convert_frame(frame: &RawFrame, encoding: TargetEncoding, target: &mut CompositeFrame) {
    let stride = target.stride();
    target
        .data
        .par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, px) in row.chunks_exact_mut(3).enumerate() {
                let (cb, cr) = frame.chroma_at(x as u32, y as u32);
                px.copy_from_slice(&ycbcr8_to_rgb8(
                    frame.luma_at(x as u32, y as u32),
                    cb,
                    cr,
                    encoding,
                ));
            }
        });
}

/// Pixel-space rectangle an overlay covers for `region`: `(left, top, width, height)`.
pub fn overlay_rect(region: &Region, frame_w: u32, frame_h: u32) -> (f64, f64, f64, f64) {
    let bbox = region.bbox.abs();
    let fw = f64::from(frame_w);
    let fh = f64::from(frame_h);
    let w = bbox.width() * fw * OVERLAY_SCALE;
    let h = bbox.height() * fh * OVERLAY_SCALE;
    let c = bbox.center();
    (c.x * fw - w / 2.0, c.y * fh - h / 2.0, w, h)
}

fn draw_overlay(target: &mut CompositeFrame, overlay: &image::RgbaImage, region: &Region) {
    let (left, top, w, h) = overlay_rect(region, target.width, target.height);
    if !(w > 0.0 && h > 0.0) || overlay.width() == 0 || overlay.height() == 0 {
        return;
    }

    // Pixels whose centers fall inside [left, left + w) x [top, top + h).
    let span = |start: f64, len: f64, limit: u32| {
        let lo = (start - 0.5).ceil().max(0.0).min(f64::from(limit)) as u32;
        let hi = (start + len - 0.5).ceil().max(0.0).min(f64::from(limit)) as u32;
        (lo, hi)
    };
    let (x0, x1) = span(left, w, target.width);
    let (y0, y1) = span(top, h, target.height);
    if x0 >= x1 || y0 >= y1 {
        return;
    }

    let stride = target.stride();
    let (ow, oh) = overlay.dimensions();
    let rows = &mut target.data[y0 as usize * stride..y1 as usize * stride];
    rows.par_chunks_mut(stride).enumerate().for_each(|(i, row)| {
        let py = f64::from(y0) + i as f64;
        let v = (py + 0.5 - top) / h;
        let sy = ((v * f64::from(oh)) as u32).min(oh - 1);
        for px in x0..x1 {
            let u = (f64::from(px) + 0.5 - left) / w;
            let sx = ((u * f64::from(ow)) as u32).min(ow - 1);
            let src = overlay.get_pixel(sx, sy).0;
            let alpha = src[3];
            if alpha == 0 {
                continue;
            }
            let di = px as usize * 3;
            for c in 0..3 {
                row[di + c] = blend_over_u8(row[di + c], src[c], alpha);
            }
        }
    });
}

#[cfg(test)]
#[path = "../../tests/unit/render/compositor.rs"]
mod tests;
