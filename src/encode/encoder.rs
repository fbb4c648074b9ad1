use std::sync::mpsc::Sender;

use crate::foundation::core::{MediaTime, VideoDescriptor};
use crate::foundation::error::FramefxResult;
use crate::render::frame_pool::CompositeFrame;

/// One compressed access unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedSample {
    /// Compressed bytes (Annex-B for the ffmpeg encoder).
    pub data: Vec<u8>,
    /// Presentation timestamp of the source frame.
    pub pts: MediaTime,
    /// Frame duration.
    pub duration: MediaTime,
    /// Return `true` for random-access points.
    pub is_keyframe: bool,
}

/// Encoder-side failure for one submitted frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodeFailure {
    /// Encoder status code (process exit code for ffmpeg, `-1` when unknown).
    pub status: i32,
    /// Human-readable detail.
    pub detail: String,
}

/// Events an encoder delivers on the channel it was given in [`Encoder::begin`].
///
/// Each submitted frame produces exactly one `FrameReleased` and one `Encoded` event, in any
/// relative order and possibly after later frames were submitted.
#[derive(Debug)]
pub enum EncoderEvent {
    /// The encoder no longer reads this buffer.
    FrameReleased(CompositeFrame),
    /// Result for the frame submitted with `seq`.
    Encoded {
        /// Submission sequence number.
        seq: u64,
        /// The sample, or why there is none.
        result: Result<EncodedSample, EncodeFailure>,
    },
}

/// Asynchronous frame encoder.
///
/// Calls are made from the driver thread only; completions come back on the event channel from
/// whatever thread the encoder uses internally.
pub trait Encoder: Send {
    /// Open an encoding session for frames described by `desc`.
    fn begin(&mut self, desc: &VideoDescriptor, events: Sender<EncoderEvent>)
    -> FramefxResult<()>;

    /// Queue one composited frame. Must not block on encoding.
    fn submit(
        &mut self,
        seq: u64,
        frame: CompositeFrame,
        pts: MediaTime,
        duration: MediaTime,
    ) -> FramefxResult<()>;

    /// Signal end of input. Results for every submitted frame still arrive afterwards.
    fn flush(&mut self) -> FramefxResult<()>;

    /// Tear the session down. Events still in flight may be dropped.
    fn invalidate(&mut self);
}

impl<E: Encoder + ?Sized> Encoder for Box<E> {
    fn begin(
        &mut self,
        desc: &VideoDescriptor,
        events: Sender<EncoderEvent>,
    ) -> FramefxResult<()> {
        (**self).begin(desc, events)
    }

    fn submit(
        &mut self,
        seq: u64,
        frame: CompositeFrame,
        pts: MediaTime,
        duration: MediaTime,
    ) -> FramefxResult<()> {
        (**self).submit(seq, frame, pts, duration)
    }

    fn flush(&mut self) -> FramefxResult<()> {
        (**self).flush()
    }

    fn invalidate(&mut self) {
        (**self).invalidate()
    }
}
