use super::*;

#[test]
fn pool_is_bounded_and_recycles() {
    let mut pool = FramePool::new(4, 2, 2);
    let a = pool.try_acquire().unwrap();
    let b = pool.try_acquire().unwrap();
    assert_ne!(a.slot(), b.slot());
    assert!(pool.try_acquire().is_none());
    assert_eq!(pool.outstanding(), 2);

    let slot_a = a.slot();
    pool.release(a).unwrap();
    let c = pool.try_acquire().unwrap();
    assert_eq!(c.slot(), slot_a);

    let s = pool.stats();
    assert_eq!(s.allocated, 2);
    assert_eq!(s.reused, 1);
    assert_eq!(s.peak_outstanding, 2);

    pool.release(b).unwrap();
    pool.release(c).unwrap();
    assert_eq!(pool.outstanding(), 0);
}

#[test]
fn releasing_more_than_leased_is_inconsistent() {
    let mut pool = FramePool::new(2, 2, 1);
    assert_eq!(
        pool.release(CompositeFrame::new(2, 2)),
        Err(FailureReason::InconsistentState)
    );
}

#[test]
fn mismatched_buffers_are_dropped_not_recycled() {
    let mut pool = FramePool::new(2, 2, 1);
    let _leased = pool.try_acquire().unwrap();
    pool.release(CompositeFrame::new(4, 4)).unwrap();
    assert_eq!(pool.stats().dropped_on_release, 1);
    let fresh = pool.try_acquire().unwrap();
    assert_eq!(fresh.data.len(), 2 * 2 * 3);
    assert_eq!(pool.stats().allocated, 2);
}

#[test]
fn zero_capacity_is_clamped_to_one() {
    let pool = FramePool::new(2, 2, 0);
    assert_eq!(pool.capacity(), 1);
}

#[test]
fn thumbnail_fits_max_dim() {
    let mut f = CompositeFrame::new(64, 32);
    f.data.fill(200);
    let t = f.thumbnail(16).unwrap();
    assert_eq!(t.dimensions(), (16, 8));
    assert!(t.pixels().all(|p| p.0 == [200, 200, 200]));

    let small = f.thumbnail(1000).unwrap();
    assert_eq!(small.dimensions(), (64, 32));
}
