use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        FramefxError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(FramefxError::frame("x").to_string().contains("frame error:"));
    assert!(
        FramefxError::encode("x")
            .to_string()
            .contains("encode error:")
    );
    assert!(FramefxError::sink("x").to_string().contains("sink error:"));
    assert!(
        FramefxError::from(SetupError::MissingVideoTrack)
            .to_string()
            .contains("setup error: input has no video track")
    );
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = FramefxError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}

#[test]
fn failure_reasons_render_their_payload() {
    let r = FailureReason::EncoderFailed {
        status: -12902,
        detail: "bad param".to_owned(),
    };
    assert_eq!(r.to_string(), "encoder failed with status -12902: bad param");
    assert_eq!(
        FailureReason::ReadingCancelled.to_string(),
        "reading cancelled"
    );
}
