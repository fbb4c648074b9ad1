use super::*;

fn drain(buf: &mut ReorderBuffer<&'static str>) -> Vec<(u64, &'static str)> {
    std::iter::from_fn(|| buf.pop_ready()).collect()
}

#[test]
fn releases_in_sequence_order() {
    let mut buf = ReorderBuffer::new();
    buf.insert(2, "c").unwrap();
    buf.insert(1, "b").unwrap();
    assert!(drain(&mut buf).is_empty());
    assert_eq!(buf.len(), 2);

    buf.insert(0, "a").unwrap();
    assert_eq!(drain(&mut buf), vec![(0, "a"), (1, "b"), (2, "c")]);
    assert!(buf.is_empty());
    assert_eq!(buf.next_seq(), 3);
    assert_eq!(buf.peak(), 3);
}

#[test]
fn gaps_hold_back_later_items() {
    let mut buf = ReorderBuffer::new();
    buf.insert(0, "a").unwrap();
    buf.insert(3, "d").unwrap();
    assert_eq!(drain(&mut buf), vec![(0, "a")]);
    buf.insert(1, "b").unwrap();
    assert_eq!(drain(&mut buf), vec![(1, "b")]);
    assert_eq!(buf.len(), 1);
}

#[test]
fn stale_and_duplicate_sequences_are_rejected() {
    let mut buf = ReorderBuffer::new();
    buf.insert(0, "a").unwrap();
    buf.insert(2, "c").unwrap();
    assert!(buf.insert(2, "again").is_err());
    drain(&mut buf);
    assert!(buf.insert(0, "late").is_err());
}
