use super::*;

fn temp_dir(name: &str) -> PathBuf {
    let dir = PathBuf::from("target").join("unit_replay").join(name);
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn region_track_replays_in_frame_order() {
    let json = r#"{
      "frames": {
        "0": [ { "x": 0.4, "y": 0.2, "width": 0.2, "height": 0.3, "confidence": 0.97 } ],
        "2": [
          { "x": 0.0, "y": 0.0, "width": 0.1, "height": 0.1, "confidence": 0.2 },
          { "x": 0.5, "y": 0.5, "width": 0.1, "height": 0.1, "confidence": 0.8 }
        ]
      }
    }"#;
    let mut track = RegionTrack::from_json(json).unwrap();
    assert_eq!(track.len(), 2);

    let frame = RawFrame::new(4, 4);
    let mut out = Regions::new();
    let mut counts = Vec::new();
    for _ in 0..4 {
        out.clear();
        track.detect(&frame, &mut out).unwrap();
        counts.push(out.len());
    }
    assert_eq!(counts, vec![1, 0, 2, 0]);
}

#[test]
fn region_track_rejects_malformed_json() {
    assert!(RegionTrack::from_json("{ \"frames\": [1, 2] }").is_err());
    assert!(RegionTrack::from_json("not json").is_err());
}

#[test]
fn mask_sequence_reads_resizes_and_reports_gaps() {
    let dir = temp_dir("mask_sequence");
    // Frame 0: left half white (foreground). Frame 1 is missing.
    let img = image::GrayImage::from_fn(2, 2, |x, _| {
        if x == 0 {
            image::Luma([255u8])
        } else {
            image::Luma([0u8])
        }
    });
    img.save(MaskSequence::mask_path(&dir, 0)).unwrap();

    let mut seq = MaskSequence::new(&dir).unwrap();
    let frame = RawFrame::new(2, 2);
    let mut mask = Mask::new(2, 2);
    assert!(seq.segment(&frame, QualityLevel::Fast, &mut mask).unwrap());
    assert!(mask.is_foreground(0, 1));
    assert!(!mask.is_foreground(1, 1));

    assert!(!seq.segment(&frame, QualityLevel::Fast, &mut mask).unwrap());
}

#[test]
fn mask_sequence_requires_directory() {
    assert!(MaskSequence::new("target/definitely/not/here").is_err());
}
