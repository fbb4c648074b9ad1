use std::io::Write as _;
use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use framefx::{
    BackgroundConfig, ChromaKeyConfig, EncoderFailurePolicy, PipelineEvent, QualityLevel, Rgb8,
    RunConfig, TargetEncoding, VariantConfig,
};

#[derive(Parser, Debug)]
#[command(name = "framefx", version)]
struct Cli {
    /// More log output (-v debug, -vv trace). `RUST_LOG` takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replace the background behind people (requires `ffmpeg` and `ffprobe` on PATH).
    Segment(SegmentArgs),
    /// Draw an image over detected regions (requires `ffmpeg` and `ffprobe` on PATH).
    Overlay(OverlayArgs),
    /// Print the input track description as JSON.
    Probe(ProbeArgs),
    /// Run a JSON run config.
    Run(RunArgs),
}

#[derive(Args, Debug)]
struct IoArgs {
    /// Input video.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output MP4 path.
    #[arg(long)]
    out: PathBuf,

    /// Fail instead of overwriting an existing output file.
    #[arg(long, default_value_t = false)]
    no_overwrite: bool,
}

#[derive(Args, Debug)]
struct PipelineArgs {
    /// Composite buffers in flight in the encoder.
    #[arg(long, default_value_t = 4)]
    max_in_flight: usize,

    /// Drop frames that fail to encode instead of failing the run.
    #[arg(long, default_value_t = false)]
    drop_failed_samples: bool,

    /// libx264 constant rate factor.
    #[arg(long, default_value_t = 18)]
    crf: u8,

    /// libx264 preset.
    #[arg(long, default_value = "medium")]
    preset: String,

    /// Store composites as linear light instead of sRGB.
    #[arg(long, default_value_t = false)]
    linear: bool,

    /// Do not print progress.
    #[arg(long, default_value_t = false)]
    no_progress: bool,
}

#[derive(Args, Debug)]
struct SegmentArgs {
    #[command(flatten)]
    io: IoArgs,

    /// Replacement background color (`#RRGGBB`).
    #[arg(long, conflicts_with = "background_image")]
    background_color: Option<Rgb8>,

    /// Replacement background image.
    #[arg(long)]
    background_image: Option<PathBuf>,

    /// Directory of precomputed masks (`frame_000000.png`, ...). Chroma keying is used otherwise.
    #[arg(long)]
    masks: Option<PathBuf>,

    /// Segmentation quality: accurate, balanced or fast.
    #[arg(long, default_value_t = QualityLevel::Balanced)]
    quality: QualityLevel,

    /// Chroma key color (`#RRGGBB`).
    #[arg(long, default_value = "#00ff00")]
    key_color: Rgb8,

    /// Chroma distance fully keyed out.
    #[arg(long, default_value_t = 48.0)]
    tolerance: f32,

    /// Soft edge width above the tolerance.
    #[arg(long, default_value_t = 16.0)]
    softness: f32,

    #[command(flatten)]
    pipeline: PipelineArgs,
}

#[derive(Args, Debug)]
struct OverlayArgs {
    #[command(flatten)]
    io: IoArgs,

    /// RGBA overlay image.
    #[arg(long)]
    image: PathBuf,

    /// Region track JSON, one entry per frame.
    #[arg(long)]
    regions: PathBuf,

    #[command(flatten)]
    pipeline: PipelineArgs,
}

#[derive(Args, Debug)]
struct ProbeArgs {
    /// Input video.
    #[arg(long = "in")]
    in_path: PathBuf,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Run config JSON.
    #[arg(long)]
    config: PathBuf,

    /// Do not print progress.
    #[arg(long, default_value_t = false)]
    no_progress: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.cmd {
        Command::Segment(args) => cmd_segment(args),
        Command::Overlay(args) => cmd_overlay(args),
        Command::Probe(args) => cmd_probe(args),
        Command::Run(args) => cmd_run(args),
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "framefx=info",
        1 => "framefx=debug",
        _ => "framefx=trace",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn cmd_segment(args: SegmentArgs) -> anyhow::Result<()> {
    let background = match (args.background_color, args.background_image) {
        (_, Some(path)) => BackgroundConfig::Image(path),
        (Some(color), None) => BackgroundConfig::Color(color),
        (None, None) => anyhow::bail!("pass --background-color or --background-image"),
    };
    let effect = VariantConfig::Segment {
        quality: args.quality,
        background,
        masks: args.masks,
        chroma_key: ChromaKeyConfig {
            key: args.key_color,
            tolerance: args.tolerance,
            softness: args.softness,
        },
    };
    let no_progress = args.pipeline.no_progress;
    run_config(config_from_args(args.io, effect, args.pipeline), no_progress)
}

fn cmd_overlay(args: OverlayArgs) -> anyhow::Result<()> {
    let effect = VariantConfig::Overlay {
        image: args.image,
        regions: args.regions,
    };
    let no_progress = args.pipeline.no_progress;
    run_config(config_from_args(args.io, effect, args.pipeline), no_progress)
}

fn cmd_probe(args: ProbeArgs) -> anyhow::Result<()> {
    let desc = framefx::probe_video(&args.in_path)?;
    let json = serde_json::to_string_pretty(&desc).context("serialize descriptor")?;
    println!("{json}");
    Ok(())
}

fn cmd_run(args: RunArgs) -> anyhow::Result<()> {
    let cfg = RunConfig::from_path(&args.config)?;
    run_config(cfg, args.no_progress)
}

fn config_from_args(io: IoArgs, effect: VariantConfig, p: PipelineArgs) -> RunConfig {
    let mut cfg = RunConfig::new(io.in_path, io.out, effect);
    cfg.overwrite = !io.no_overwrite;
    cfg.pipeline.max_in_flight = p.max_in_flight;
    if p.drop_failed_samples {
        cfg.pipeline.encoder_failure = EncoderFailurePolicy::DropSample;
    }
    // The CLI prints text progress only.
    cfg.pipeline.preview.enabled = false;
    cfg.encoder.crf = p.crf;
    cfg.encoder.preset = p.preset;
    if p.linear {
        cfg.encoding = TargetEncoding::Linear;
    }
    cfg
}

fn run_config(cfg: RunConfig, no_progress: bool) -> anyhow::Result<()> {
    let mut driver = cfg.build()?;
    let handle = driver
        .start()
        .context("pipeline was already started")?;

    let mut stderr = std::io::stderr();
    let report = handle.wait_with(|event| match event {
        PipelineEvent::Progress(p) if !no_progress => {
            let _ = write!(stderr, "\rframe {:>6}  {:>5.1}%", p.frame_index + 1, p.progress * 100.0);
            let _ = stderr.flush();
        }
        PipelineEvent::SampleDropped { seq, reason } => {
            tracing::warn!(seq, "dropped frame: {reason}");
        }
        PipelineEvent::Completed { .. } | PipelineEvent::Failed(_) if !no_progress => {
            let _ = writeln!(stderr);
        }
        _ => {}
    });

    match report.outcome {
        Ok(output) => {
            let out = output.unwrap_or(cfg.output);
            eprintln!(
                "wrote {} ({} frames, {} dropped)",
                out.display(),
                report.stats.samples_written,
                report.stats.samples_dropped
            );
            Ok(())
        }
        Err(reason) => Err(anyhow::anyhow!(reason)).context("pipeline failed"),
    }
}
