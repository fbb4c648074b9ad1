use super::*;
use crate::foundation::core::DisplayTransform;

fn desc() -> VideoDescriptor {
    VideoDescriptor {
        width: 4,
        height: 4,
        duration: MediaTime::new(1, 1).unwrap(),
        frame_duration: MediaTime::new(1, 30).unwrap(),
        transform: DisplayTransform::default(),
    }
}

fn sample(frame: i64) -> EncodedSample {
    EncodedSample {
        data: vec![frame as u8],
        pts: MediaTime::new(frame, 30).unwrap(),
        duration: MediaTime::new(1, 30).unwrap(),
        is_keyframe: frame == 0,
    }
}

#[test]
fn writes_in_order_and_finalizes_once() {
    let mut sink = InMemorySink::new();
    let view = sink.clone();
    assert_eq!(sink.state(), SinkState::Idle);
    sink.begin(&desc()).unwrap();
    for i in 0..3 {
        sink.append(sample(i)).unwrap();
    }
    sink.mark_finished().unwrap();
    sink.finalize().unwrap();
    assert_eq!(sink.state(), SinkState::Completed);
    assert!(sink.finalize().is_err());

    assert_eq!(view.samples().len(), 3);
    assert_eq!(view.finalize_calls(), 2);
    assert_eq!(view.descriptor(), Some(desc()));
}

#[test]
fn rejects_samples_outside_writing_state() {
    let mut sink = InMemorySink::new();
    assert!(sink.append(sample(0)).is_err());
    sink.begin(&desc()).unwrap();
    sink.mark_finished().unwrap();
    let err = sink.append(sample(0)).unwrap_err();
    assert!(err.to_string().starts_with("sink error:"), "{err}");
}

#[test]
fn rejects_non_increasing_timestamps() {
    let mut sink = InMemorySink::new();
    sink.begin(&desc()).unwrap();
    sink.append(sample(1)).unwrap();
    assert!(sink.append(sample(1)).is_err());
    assert!(sink.append(sample(0)).is_err());
    sink.append(sample(2)).unwrap();
}

#[test]
fn finalize_requires_finished_input() {
    let mut sink = InMemorySink::new();
    sink.begin(&desc()).unwrap();
    assert!(sink.finalize().is_err());
}

#[test]
fn abort_cancels_without_finalizing() {
    let mut sink = InMemorySink::new();
    sink.begin(&desc()).unwrap();
    sink.abort();
    assert_eq!(sink.state(), SinkState::Cancelled);
    assert!(sink.was_aborted());
    assert_eq!(sink.finalize_calls(), 0);
    assert!(sink.append(sample(0)).is_err());
}
