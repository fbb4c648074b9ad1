//! framefx transforms videos one frame at a time.
//!
//! Each frame is decoded, analyzed (segmentation mask or detected regions), composited with a
//! replacement background or an overlay image, encoded to H.264 and written to an MP4 container.
//! The pipeline runs on its own thread and reports progress and a single terminal outcome
//! through a [`PipelineHandle`]:
//!
//! - Build a [`PipelineDriver`] from a source, analyzer, compositor, encoder and sink (or from a
//!   [`RunConfig`])
//! - [`PipelineDriver::start`] it and consume [`PipelineEvent`]s
//! - [`PipelineHandle::join`] for the final [`RunReport`]
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

/// Per-frame analysis adapters and result types.
pub mod analysis;
/// JSON run configuration.
pub mod config;
/// Encoders and sample sinks.
pub mod encode;
/// Frame sources and media probing.
pub mod media;
/// Pipeline driver, options and events.
pub mod pipeline;
/// Color conversion, composite buffers and compositing.
pub mod render;

pub use crate::foundation::core::{DisplayTransform, MediaTime, Rgb8, VideoDescriptor};
pub use crate::foundation::error::{FailureReason, FramefxError, FramefxResult, SetupError};

pub use analysis::analyzer::FrameAnalyzer;
pub use analysis::detection::{DetectionAnalyzer, DetectionEngine};
pub use analysis::replay::{MaskSequence, RegionTrack};
pub use analysis::result::{AnalysisKind, AnalysisResult, Mask, Region, Regions};
pub use analysis::segmentation::{
    ChromaKeySegmenter, QualityLevel, SegmentationAnalyzer, SegmentationEngine,
};
pub use config::{BackgroundConfig, ChromaKeyConfig, RunConfig, VariantConfig};
pub use encode::encoder::{EncodeFailure, EncodedSample, Encoder, EncoderEvent};
pub use encode::ffmpeg::{FfmpegEncoder, FfmpegEncoderOpts, FfmpegMp4Sink, FfmpegMp4SinkOpts};
pub use encode::sink::{InMemorySink, SampleSink, SinkState};
pub use media::ffmpeg_source::FfmpegSource;
pub use media::frame::RawFrame;
pub use media::probe::probe_video;
pub use media::source::{FrameSource, SourceStatus};
pub use pipeline::driver::{CancelToken, PipelineDriver, PipelineHandle};
pub use pipeline::events::{PipelineEvent, ProgressReport, RunReport, RunStats};
pub use pipeline::opts::{EncoderFailurePolicy, PipelineOpts, PreviewOpts};
pub use pipeline::state::PipelineState;
pub use render::color::TargetEncoding;
pub use render::compositor::{BackgroundFill, CompositeBackend, CpuCompositor, OverlayContent};
pub use render::frame_pool::{CompositeFrame, FramePool, FramePoolStats};
