use super::*;

const PORTRAIT_PHONE_CLIP: &str = r#"{
  "streams": [
    { "codec_type": "audio", "duration": "2.000000" },
    {
      "codec_type": "video",
      "width": 1920,
      "height": 1080,
      "r_frame_rate": "30/1",
      "avg_frame_rate": "30/1",
      "nb_frames": "60",
      "side_data_list": [
        { "side_data_type": "Display Matrix", "rotation": -90 }
      ]
    }
  ],
  "format": { "duration": "2.000000" }
}"#;

#[test]
fn probe_json_picks_the_video_stream() {
    let d = descriptor_from_probe_json(PORTRAIT_PHONE_CLIP.as_bytes()).unwrap();
    assert_eq!((d.width, d.height), (1920, 1080));
    assert_eq!(d.frame_duration, MediaTime::new(1, 30).unwrap());
    assert_eq!(d.duration, MediaTime::new(60, 30).unwrap());
    assert_eq!(d.transform.rotation_degrees, 270);
}

#[test]
fn probe_json_falls_back_to_format_duration_and_legacy_rotate_tag() {
    let json = r#"{
      "streams": [{
        "codec_type": "video", "width": 640, "height": 360,
        "r_frame_rate": "0/0", "avg_frame_rate": "30000/1001",
        "tags": { "rotate": "90" }
      }],
      "format": { "duration": "1.001000" }
    }"#;
    let d = descriptor_from_probe_json(json.as_bytes()).unwrap();
    assert_eq!(d.frame_duration, MediaTime::new(1001, 30000).unwrap());
    assert_eq!(d.frame_count_hint(), 30);
    assert_eq!(d.transform.rotation_degrees, 270);
}

#[test]
fn probe_json_without_video_is_missing_track() {
    let json = r#"{ "streams": [{ "codec_type": "audio" }] }"#;
    let err = descriptor_from_probe_json(json.as_bytes()).unwrap_err();
    assert!(matches!(
        err,
        FramefxError::Setup(SetupError::MissingVideoTrack)
    ));
}

#[test]
fn parse_rational_rejects_zero_and_garbage() {
    assert_eq!(parse_rational("30000/1001").unwrap(), (30000, 1001));
    assert!(parse_rational("0/0").is_err());
    assert!(parse_rational("30").is_err());
    assert!(parse_rational("a/b").is_err());
}

#[test]
fn probe_json_prefers_average_rate_over_field_rate() {
    // Interlaced H.264 reports the field rate as r_frame_rate.
    let json = r#"{
      "streams": [{
        "codec_type": "video", "width": 1920, "height": 1080,
        "r_frame_rate": "60/1", "avg_frame_rate": "30/1",
        "nb_frames": "300", "duration": "10.000000"
      }]
    }"#;
    let d = descriptor_from_probe_json(json.as_bytes()).unwrap();
    assert_eq!(d.frame_rate(), (30, 1));
    assert_eq!(d.frame_duration, MediaTime::new(1, 30).unwrap());
    assert!((d.duration.as_secs_f64() - 10.0).abs() < 1e-9);
}

fn stream_with_matrix(matrix: &str, rotation: f64) -> String {
    format!(
        r#"{{
          "streams": [{{
            "codec_type": "video", "width": 640, "height": 480,
            "avg_frame_rate": "25/1", "nb_frames": "25",
            "side_data_list": [{{
              "side_data_type": "Display Matrix",
              "displaymatrix": "{matrix}",
              "rotation": {rotation}
            }}]
          }}]
        }}"#
    )
}

#[test]
fn mirrored_display_matrix_sets_flip() {
    let json = stream_with_matrix(
        r"\n00000000:       -65536           0           0\n00000001:            0       65536           0\n00000002:            0           0  1073741824\n",
        -180.0,
    );
    let d = descriptor_from_probe_json(json.as_bytes()).unwrap();
    assert_eq!(d.transform, DisplayTransform::new(0, true).unwrap());
}

#[test]
fn mirrored_and_rotated_display_matrix_keeps_rotation() {
    let json = stream_with_matrix(
        r"\n00000000:            0       65536           0\n00000001:        65536           0           0\n00000002:            0           0  1073741824\n",
        -90.0,
    );
    let d = descriptor_from_probe_json(json.as_bytes()).unwrap();
    assert_eq!(d.transform, DisplayTransform::new(-90, true).unwrap());

    let plain = stream_with_matrix(
        r"\n00000000:            0       65536           0\n00000001:       -65536           0           0\n00000002:            0           0  1073741824\n",
        -90.0,
    );
    let d = descriptor_from_probe_json(plain.as_bytes()).unwrap();
    assert_eq!(d.transform, DisplayTransform::new(-90, false).unwrap());
}
