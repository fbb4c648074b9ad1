use crate::foundation::error::FailureReason;

/// One composited output frame, packed RGB8 rows.
///
/// Leased from a [`FramePool`], written by the compositor, then moved into the encoder. The
/// encoder hands it back once it no longer reads the pixels, which is the only way the buffer
/// returns to the pool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompositeFrame {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// `width * height * 3` bytes, row-major RGB.
    pub data: Vec<u8>,
    slot: u32,
}

impl CompositeFrame {
    /// Allocate a black frame outside of any pool.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * 3],
            slot: u32::MAX,
        }
    }

    /// Bytes per row.
    pub fn stride(&self) -> usize {
        self.width as usize * 3
    }

    /// Pool slot this buffer was allocated for (`u32::MAX` when unpooled).
    pub fn slot(&self) -> u32 {
        self.slot
    }

    /// Pixel at `(x, y)`.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let i = (y as usize * self.width as usize + x as usize) * 3;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    /// Downscaled copy whose longer edge is at most `max_dim`.
    pub fn thumbnail(&self, max_dim: u32) -> Option<image::RgbImage> {
        let view =
            image::ImageBuffer::<image::Rgb<u8>, &[u8]>::from_raw(self.width, self.height, &self.data)?;
        let max_dim = max_dim.max(1);
        let longest = self.width.max(self.height).max(1);
        if longest <= max_dim {
            return image::RgbImage::from_raw(self.width, self.height, self.data.clone());
        }
        let scale = f64::from(max_dim) / f64::from(longest);
        let tw = ((f64::from(self.width) * scale).round() as u32).max(1);
        let th = ((f64::from(self.height) * scale).round() as u32).max(1);
        Some(image::imageops::thumbnail(&view, tw, th))
    }
}

/// Counters describing pool behavior over a run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FramePoolStats {
    /// Buffers allocated.
    pub allocated: u64,
    /// Leases served from a recycled buffer.
    pub reused: u64,
    /// Largest number of buffers leased at once.
    pub peak_outstanding: usize,
    /// Buffers dropped on release because their size no longer matched.
    pub dropped_on_release: u64,
}

/// Bounded set of reusable composite frames.
///
/// At most `capacity` buffers exist at once. `try_acquire` returns `None` when every buffer is
/// leased; callers wait for the encoder to release one.
#[derive(Debug)]
pub struct FramePool {
    width: u32,
    height: u32,
    capacity: usize,
    free: Vec<CompositeFrame>,
    outstanding: usize,
    next_slot: u32,
    stats: FramePoolStats,
}

impl FramePool {
    /// Pool of up to `capacity` frames of `width x height` (capacity is at least 1).
    pub fn new(width: u32, height: u32, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            width,
            height,
            capacity,
            free: Vec::with_capacity(capacity),
            outstanding: 0,
            next_slot: 0,
            stats: FramePoolStats::default(),
        }
    }

    /// Maximum number of buffers.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Buffers currently leased.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Return `true` when a lease would succeed.
    pub fn has_available(&self) -> bool {
        self.outstanding < self.capacity
    }

    /// Counters so far.
    pub fn stats(&self) -> FramePoolStats {
        self.stats.clone()
    }

    /// Lease a buffer, or `None` when all are out.
    pub fn try_acquire(&mut self) -> Option<CompositeFrame> {
        if !self.has_available() {
            return None;
        }
        let frame = match self.free.pop() {
            Some(f) => {
                self.stats.reused = self.stats.reused.saturating_add(1);
                f
            }
            None => {
                let mut f = CompositeFrame::new(self.width, self.height);
                f.slot = self.next_slot;
                self.next_slot = self.next_slot.saturating_add(1);
                self.stats.allocated = self.stats.allocated.saturating_add(1);
                f
            }
        };
        self.outstanding += 1;
        self.stats.peak_outstanding = self.stats.peak_outstanding.max(self.outstanding);
        Some(frame)
    }

    /// Return a leased buffer.
    ///
    /// Releasing when nothing is leased means a buffer was returned twice or came from
    /// elsewhere.
    pub fn release(&mut self, frame: CompositeFrame) -> Result<(), FailureReason> {
        if self.outstanding == 0 {
            return Err(FailureReason::InconsistentState);
        }
        self.outstanding -= 1;
        if frame.width != self.width
            || frame.height != self.height
            || frame.data.len() != self.width as usize * self.height as usize * 3
        {
            self.stats.dropped_on_release = self.stats.dropped_on_release.saturating_add(1);
            return Ok(());
        }
        self.free.push(frame);
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/frame_pool.rs"]
mod tests;
