//! Decoding side of the pipeline: raw frames, the source contract and the ffmpeg-backed source.

/// `ffmpeg`-backed frame source.
pub mod ffmpeg_source;
/// Raw NV12 frames.
pub mod frame;
/// `ffprobe` metadata probing.
pub mod probe;
/// Frame source contract.
pub mod source;
/// `ffmpeg`/`ffprobe` process helpers.
pub mod tools;
