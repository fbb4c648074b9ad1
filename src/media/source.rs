use crate::foundation::core::VideoDescriptor;
use crate::foundation::error::FramefxResult;
use crate::media::frame::RawFrame;

/// Reader status consulted by the driver once a source runs dry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceStatus {
    /// Reading has not started.
    Unknown,
    /// Frames may still be available.
    Reading,
    /// Every frame was delivered.
    Completed,
    /// Reading stopped on an error.
    Failed(String),
    /// Reading was cancelled.
    Cancelled,
}

/// Decoder collaborator: yields raw frames in file order.
///
/// Ordering contract: `read_next` fills frames in presentation order. When it returns `false`,
/// `status` reports why.
pub trait FrameSource: Send {
    /// Track description, available before reading starts.
    fn descriptor(&self) -> VideoDescriptor;

    /// Begin reading. Called once by the driver.
    fn start_reading(&mut self) -> FramefxResult<()>;

    /// Refill `frame` with the next decoded frame. Returns `false` when no frame is available.
    fn read_next(&mut self, frame: &mut RawFrame) -> bool;

    /// Current reader status.
    fn status(&self) -> SourceStatus;

    /// Stop reading. Later `read_next` calls return `false` and `status` reports `Cancelled`.
    fn cancel(&mut self);
}
