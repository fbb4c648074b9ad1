use super::*;

use crate::pipeline::opts::EncoderFailurePolicy;

#[test]
fn minimal_segment_config_fills_defaults() {
    let cfg = RunConfig::from_reader(
        r##"{
            "input": "in.mp4",
            "output": "out.mp4",
            "effect": { "kind": "segment", "background": { "color": "#102030" } }
        }"##
        .as_bytes(),
    )
    .unwrap();

    assert!(cfg.overwrite);
    assert_eq!(cfg.encoding, TargetEncoding::Srgb);
    assert_eq!(cfg.pipeline, PipelineOpts::default());
    assert_eq!(cfg.encoder, FfmpegEncoderOpts::default());
    match &cfg.effect {
        VariantConfig::Segment {
            quality,
            background,
            masks,
            chroma_key,
        } => {
            assert_eq!(*quality, QualityLevel::Balanced);
            assert_eq!(*background, BackgroundConfig::Color(Rgb8::new(0x10, 0x20, 0x30)));
            assert!(masks.is_none());
            assert_eq!(*chroma_key, ChromaKeyConfig::default());
        }
        other => panic!("unexpected variant {other:?}"),
    }
    cfg.validate().unwrap();
}

#[test]
fn overlay_config_with_options() {
    let cfg = RunConfig::from_reader(
        r#"{
            "input": "in.mp4",
            "output": "out.mp4",
            "overwrite": false,
            "encoding": "linear",
            "effect": { "kind": "overlay", "image": "badge.png", "regions": "faces.json" },
            "pipeline": { "max_in_flight": 2, "encoder_failure": "drop_sample" },
            "encoder": { "preset": "veryfast" }
        }"#
        .as_bytes(),
    )
    .unwrap();

    assert!(!cfg.overwrite);
    assert_eq!(cfg.encoding, TargetEncoding::Linear);
    assert_eq!(cfg.pipeline.max_in_flight, 2);
    assert_eq!(cfg.pipeline.encoder_failure, EncoderFailurePolicy::DropSample);
    assert_eq!(cfg.encoder.preset, "veryfast");
    assert_eq!(cfg.encoder.crf, 18);
    assert_eq!(
        cfg.effect,
        VariantConfig::Overlay {
            image: PathBuf::from("badge.png"),
            regions: PathBuf::from("faces.json"),
        }
    );
}

#[test]
fn unknown_variant_is_a_validation_error() {
    let err = RunConfig::from_reader(
        r#"{ "input": "a.mp4", "output": "b.mp4", "effect": { "kind": "blur" } }"#.as_bytes(),
    )
    .unwrap_err();
    assert!(err.to_string().starts_with("validation error:"), "{err}");
}

#[test]
fn relative_paths_resolve_against_base() {
    let mut cfg = RunConfig::new(
        "in.mp4",
        "/abs/out.mp4",
        VariantConfig::Segment {
            quality: QualityLevel::Fast,
            background: BackgroundConfig::Image(PathBuf::from("bg.png")),
            masks: Some(PathBuf::from("masks")),
            chroma_key: ChromaKeyConfig::default(),
        },
    );
    cfg.resolve_relative(Path::new("/work"));

    assert_eq!(cfg.input, PathBuf::from("/work/in.mp4"));
    assert_eq!(cfg.output, PathBuf::from("/abs/out.mp4"));
    match &cfg.effect {
        VariantConfig::Segment {
            background, masks, ..
        } => {
            assert_eq!(*background, BackgroundConfig::Image(PathBuf::from("/work/bg.png")));
            assert_eq!(masks.as_deref(), Some(Path::new("/work/masks")));
        }
        other => panic!("unexpected variant {other:?}"),
    }
}

#[test]
fn validate_rejects_bad_options() {
    let effect = VariantConfig::Overlay {
        image: PathBuf::from("o.png"),
        regions: PathBuf::from("r.json"),
    };

    let mut cfg = RunConfig::new("same.mp4", "same.mp4", effect.clone());
    assert!(cfg.validate().is_err());

    cfg = RunConfig::new("in.mp4", "out.mp4", effect);
    cfg.encoder.crf = 52;
    assert!(cfg.validate().is_err());
    cfg.encoder.crf = 23;
    cfg.pipeline.max_in_flight = 0;
    assert!(cfg.validate().is_err());
    cfg.pipeline.max_in_flight = 1;
    cfg.validate().unwrap();
}

#[test]
fn build_reports_missing_input_as_setup_error() {
    let dir = std::env::temp_dir().join(format!("framefx_cfg_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let cfg = RunConfig::new(
        dir.join("does_not_exist.mp4"),
        dir.join("out.mp4"),
        VariantConfig::Segment {
            quality: QualityLevel::Balanced,
            background: BackgroundConfig::Color(Rgb8::new(0, 0, 0)),
            masks: None,
            chroma_key: ChromaKeyConfig::default(),
        },
    );

    let err = match cfg.build() {
        Ok(_) => panic!("build should fail"),
        Err(e) => e,
    };
    assert!(err.to_string().starts_with("setup error:"), "{err}");
    let _ = std::fs::remove_dir_all(&dir);
}
