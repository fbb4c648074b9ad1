use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::analysis::analyzer::FrameAnalyzer;
use crate::analysis::detection::DetectionAnalyzer;
use crate::analysis::replay::{MaskSequence, RegionTrack};
use crate::analysis::segmentation::{ChromaKeySegmenter, QualityLevel, SegmentationAnalyzer};
use crate::encode::ffmpeg::{FfmpegEncoder, FfmpegEncoderOpts, FfmpegMp4Sink, FfmpegMp4SinkOpts};
use crate::foundation::core::Rgb8;
use crate::foundation::error::{FramefxError, FramefxResult};
use crate::media::ffmpeg_source::FfmpegSource;
use crate::pipeline::driver::PipelineDriver;
use crate::pipeline::opts::PipelineOpts;
use crate::render::color::TargetEncoding;
use crate::render::compositor::{CpuCompositor, OverlayContent};

/// Replacement background for the segmentation variant.
///
/// JSON: `{ "color": "#00b140" }` or `{ "image": "studio.png" }`.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundConfig {
    /// Solid color.
    Color(Rgb8),
    /// Image scaled to fill the frame.
    Image(PathBuf),
}

/// Chroma-key engine settings, used when no mask directory is given.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ChromaKeyConfig {
    /// Key color.
    pub key: Rgb8,
    /// Chroma distance fully keyed out, in 8-bit code values.
    pub tolerance: f32,
    /// Width of the soft edge above `tolerance`.
    pub softness: f32,
}

impl Default for ChromaKeyConfig {
    fn default() -> Self {
        Self {
            key: Rgb8::new(0, 255, 0),
            tolerance: 48.0,
            softness: 16.0,
        }
    }
}

/// Which transformation to run.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VariantConfig {
    /// Replace the background behind segmented people.
    Segment {
        /// Segmentation quality for the whole run.
        #[serde(default)]
        quality: QualityLevel,
        /// Replacement background.
        background: BackgroundConfig,
        /// Directory of precomputed masks (`frame_000000.png`, ...). Chroma keying is used when
        /// absent.
        #[serde(default)]
        masks: Option<PathBuf>,
        /// Chroma-key settings.
        #[serde(default)]
        chroma_key: ChromaKeyConfig,
    },
    /// Draw an image over detected regions.
    Overlay {
        /// RGBA overlay image.
        image: PathBuf,
        /// Region track JSON, one entry per frame.
        regions: PathBuf,
    },
}

fn default_overwrite() -> bool {
    true
}

/// A complete, file-described run.
///
/// ```json
/// {
///   "input": "in.mp4",
///   "output": "out.mp4",
///   "effect": { "kind": "segment", "background": { "color": "#102030" } },
///   "pipeline": { "max_in_flight": 4 },
///   "encoder": { "crf": 20 }
/// }
/// ```
///
/// Relative paths in a config file resolve against the file's directory.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RunConfig {
    /// Input video.
    pub input: PathBuf,
    /// Output MP4.
    pub output: PathBuf,
    /// Replace an existing output file.
    #[serde(default = "default_overwrite")]
    pub overwrite: bool,
    /// Transformation variant.
    pub effect: VariantConfig,
    /// How composites are stored before encoding.
    #[serde(default)]
    pub encoding: TargetEncoding,
    /// Pipeline options.
    #[serde(default)]
    pub pipeline: PipelineOpts,
    /// libx264 options.
    #[serde(default)]
    pub encoder: FfmpegEncoderOpts,
}

impl RunConfig {
    /// Config with default options.
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>, effect: VariantConfig) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            overwrite: default_overwrite(),
            effect,
            encoding: TargetEncoding::default(),
            pipeline: PipelineOpts::default(),
            encoder: FfmpegEncoderOpts::default(),
        }
    }

    /// Parse a config from a JSON reader. Paths are kept as written.
    pub fn from_reader<R: std::io::Read>(r: R) -> FramefxResult<Self> {
        serde_json::from_reader(r)
            .map_err(|e| FramefxError::validation(format!("parse run config JSON: {e}")))
    }

    /// Parse a config file, resolving relative paths against its directory.
    pub fn from_path(path: impl AsRef<Path>) -> FramefxResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            FramefxError::validation(format!("open run config '{}': {e}", path.display()))
        })?;
        let mut cfg = Self::from_reader(BufReader::new(f))?;
        if let Some(base) = path.parent() {
            cfg.resolve_relative(base);
        }
        Ok(cfg)
    }

    /// Prefix every relative path with `base`.
    pub fn resolve_relative(&mut self, base: &Path) {
        let fix = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        fix(&mut self.input);
        fix(&mut self.output);
        match &mut self.effect {
            VariantConfig::Segment {
                background, masks, ..
            } => {
                if let BackgroundConfig::Image(p) = background {
                    fix(p);
                }
                if let Some(p) = masks {
                    fix(p);
                }
            }
            VariantConfig::Overlay { image, regions } => {
                fix(image);
                fix(regions);
            }
        }
    }

    /// Check option ranges without touching the filesystem.
    pub fn validate(&self) -> FramefxResult<()> {
        self.pipeline.validate()?;
        if self.encoder.crf > 51 {
            return Err(FramefxError::validation("encoder crf must be in 0..=51"));
        }
        if self.encoder.preset.trim().is_empty() {
            return Err(FramefxError::validation("encoder preset must not be empty"));
        }
        if self.input == self.output {
            return Err(FramefxError::validation(
                "output must not be the same file as the input",
            ));
        }
        Ok(())
    }

    /// Assemble the ffmpeg-backed pipeline this config describes.
    ///
    /// Every setup failure (unreadable input, missing track, missing asset, output that cannot
    /// be written) surfaces here, before any frame is read.
    pub fn build(&self) -> FramefxResult<PipelineDriver> {
        self.validate()?;

        let mut sink_opts = FfmpegMp4SinkOpts::new(&self.output);
        sink_opts.overwrite = self.overwrite;
        let sink = FfmpegMp4Sink::new(sink_opts);
        sink.check_writable()?;

        let source = FfmpegSource::open(&self.input)?;
        let (analyzer, overlay) = self.build_variant()?;
        let compositor = CpuCompositor::new(overlay).with_encoding(self.encoding);
        let encoder = FfmpegEncoder::new(self.encoder.clone());

        tracing::info!(
            input = %self.input.display(),
            output = %self.output.display(),
            "pipeline configured"
        );
        PipelineDriver::new(source, analyzer, compositor, encoder, sink, self.pipeline)
    }

    fn build_variant(&self) -> FramefxResult<(Box<dyn FrameAnalyzer>, OverlayContent)> {
        match &self.effect {
            VariantConfig::Segment {
                quality,
                background,
                masks,
                chroma_key,
            } => {
                let overlay = match background {
                    BackgroundConfig::Color(c) => OverlayContent::background_color(*c),
                    BackgroundConfig::Image(p) => OverlayContent::background_image(p)?,
                };
                let analyzer: Box<dyn FrameAnalyzer> = match masks {
                    Some(dir) => Box::new(SegmentationAnalyzer::new(
                        MaskSequence::new(dir)?,
                        *quality,
                    )),
                    None => Box::new(SegmentationAnalyzer::new(
                        ChromaKeySegmenter::new(
                            chroma_key.key,
                            chroma_key.tolerance,
                            chroma_key.softness,
                        )?,
                        *quality,
                    )),
                };
                Ok((analyzer, overlay))
            }
            VariantConfig::Overlay { image, regions } => {
                let overlay = OverlayContent::region_overlay(image)?;
                let track = RegionTrack::from_path(regions)?;
                Ok((Box::new(DetectionAnalyzer::new(track)), overlay))
            }
        }
    }
}

#[cfg(test)]
#[path = "../tests/unit/config.rs"]
mod tests;
