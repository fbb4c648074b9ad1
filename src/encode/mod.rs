//! Encoding and output: the asynchronous encoder and sample sink contracts plus their
//! ffmpeg-backed and in-memory implementations.

/// H.264 Annex-B access-unit framing.
pub mod annexb;
/// Encoder contract and encoded sample types.
pub mod encoder;
/// ffmpeg-backed encoder and MP4 sink.
pub mod ffmpeg;
/// Sample sink contract and the in-memory sink.
pub mod sink;
