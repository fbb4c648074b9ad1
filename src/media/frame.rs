use crate::foundation::core::MediaTime;
use crate::foundation::error::{FramefxError, FramefxResult};

/// One decoded frame in 4:2:0 semi-planar (NV12) layout.
///
/// The driver owns a single `RawFrame` for the whole run and sources refill it in place, so the
/// plane allocations are reused across frames.
#[derive(Clone, Debug)]
pub struct RawFrame {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Luma plane, `width * height` bytes, row-major.
    pub luma: Vec<u8>,
    /// Interleaved Cb/Cr plane, `(width / 2) * (height / 2) * 2` bytes, row-major.
    pub chroma: Vec<u8>,
    /// Presentation timestamp.
    pub pts: MediaTime,
    /// Frame duration.
    pub duration: MediaTime,
}

impl RawFrame {
    /// Frame with zero-sized planes. Sources size it on first use.
    pub fn empty() -> Self {
        Self {
            width: 0,
            height: 0,
            luma: Vec::new(),
            chroma: Vec::new(),
            pts: MediaTime::ZERO,
            duration: MediaTime::ZERO,
        }
    }

    /// Allocate planes for a `width x height` frame, filled with video black.
    pub fn new(width: u32, height: u32) -> Self {
        let mut f = Self::empty();
        f.ensure_size(width, height);
        f.fill_solid(16, 128, 128);
        f
    }

    /// Byte length of the luma plane.
    pub fn luma_len(width: u32, height: u32) -> usize {
        width as usize * height as usize
    }

    /// Byte length of the interleaved chroma plane.
    pub fn chroma_len(width: u32, height: u32) -> usize {
        (width as usize / 2) * (height as usize / 2) * 2
    }

    /// Byte length of a packed NV12 frame.
    pub fn nv12_len(width: u32, height: u32) -> usize {
        Self::luma_len(width, height) + Self::chroma_len(width, height)
    }

    /// Resize planes for `width x height`. Existing capacity is reused.
    pub fn ensure_size(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.luma.resize(Self::luma_len(width, height), 0);
        self.chroma.resize(Self::chroma_len(width, height), 0);
    }

    /// Return `true` when both planes hold a full frame.
    pub fn has_pixels(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.luma.len() == Self::luma_len(self.width, self.height)
            && self.chroma.len() == Self::chroma_len(self.width, self.height)
    }

    /// Copy a packed NV12 buffer (luma followed by interleaved chroma) into the planes.
    pub fn copy_from_nv12(&mut self, data: &[u8]) -> FramefxResult<()> {
        let luma_len = Self::luma_len(self.width, self.height);
        if data.len() != luma_len + Self::chroma_len(self.width, self.height) {
            return Err(FramefxError::frame(format!(
                "nv12 buffer has {} bytes, expected {}",
                data.len(),
                Self::nv12_len(self.width, self.height)
            )));
        }
        let (y, uv) = data.split_at(luma_len);
        self.luma.copy_from_slice(y);
        self.chroma.copy_from_slice(uv);
        Ok(())
    }

    /// Fill the whole frame with one YCbCr value.
    pub fn fill_solid(&mut self, y: u8, cb: u8, cr: u8) {
        self.luma.fill(y);
        for pair in self.chroma.chunks_exact_mut(2) {
            pair[0] = cb;
            pair[1] = cr;
        }
    }

    /// Luma sample at `(x, y)`.
    #[inline]
    pub fn luma_at(&self, x: u32, y: u32) -> u8 {
        self.luma[y as usize * self.width as usize + x as usize]
    }

    /// `(Cb, Cr)` sample covering pixel `(x, y)`.
    #[inline]
    pub fn chroma_at(&self, x: u32, y: u32) -> (u8, u8) {
        let cw = self.width as usize / 2;
        let i = ((y as usize / 2) * cw + (x as usize / 2)) * 2;
        (self.chroma[i], self.chroma[i + 1])
    }
}

#[cfg(test)]
#[path = "../../tests/unit/media/frame.rs"]
mod tests;
