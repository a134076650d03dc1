//! Integration tests for the LRU-K replacer

use kiln::buffer::LruKReplacer;
use kiln::common::FrameId;

#[test]
fn test_infinite_distance_frames_evict_first() {
    let replacer = LruKReplacer::new(2, 7);

    // Frames 1..=6 accessed once each, then frame 1 again. Frame 1 is the
    // only one with a full history; everything else has infinite backward
    // distance and goes first, oldest single access first.
    for fid in 1..=6u32 {
        replacer.record_access(FrameId::new(fid));
    }
    replacer.record_access(FrameId::new(1));

    for fid in 1..=6u32 {
        replacer.set_evictable(FrameId::new(fid), true);
    }
    assert_eq!(replacer.size(), 6);

    for fid in 2..=6u32 {
        assert_eq!(replacer.evict(), Some(FrameId::new(fid)));
    }
    assert_eq!(replacer.evict(), Some(FrameId::new(1)));
    assert_eq!(replacer.evict(), None);
    assert_eq!(replacer.size(), 0);
}

#[test]
fn test_largest_backward_distance_wins() {
    let replacer = LruKReplacer::new(2, 10);

    // Interleave so every frame has exactly k accesses; the frame whose
    // k-th most recent access is oldest has the largest distance.
    replacer.record_access(FrameId::new(0)); // t=0
    replacer.record_access(FrameId::new(1)); // t=1
    replacer.record_access(FrameId::new(2)); // t=2
    replacer.record_access(FrameId::new(1)); // t=3
    replacer.record_access(FrameId::new(2)); // t=4
    replacer.record_access(FrameId::new(0)); // t=5

    for fid in 0..3u32 {
        replacer.set_evictable(FrameId::new(fid), true);
    }

    // kth-recent: frame 0 -> t=0, frame 1 -> t=1, frame 2 -> t=2.
    assert_eq!(replacer.evict(), Some(FrameId::new(0)));
    assert_eq!(replacer.evict(), Some(FrameId::new(1)));
    assert_eq!(replacer.evict(), Some(FrameId::new(2)));
}

#[test]
fn test_pinned_frames_are_skipped() {
    let replacer = LruKReplacer::new(2, 10);

    for fid in 0..3u32 {
        replacer.record_access(FrameId::new(fid));
    }
    replacer.set_evictable(FrameId::new(1), true);
    replacer.set_evictable(FrameId::new(2), true);
    assert_eq!(replacer.size(), 2);

    assert_eq!(replacer.evict(), Some(FrameId::new(1)));
    assert_eq!(replacer.evict(), Some(FrameId::new(2)));
    // Frame 0 was never marked evictable.
    assert_eq!(replacer.evict(), None);
}

#[test]
fn test_size_tracks_evictable_flag() {
    let replacer = LruKReplacer::new(2, 10);

    replacer.record_access(FrameId::new(0));
    replacer.record_access(FrameId::new(1));
    assert_eq!(replacer.size(), 0);

    replacer.set_evictable(FrameId::new(0), true);
    replacer.set_evictable(FrameId::new(1), true);
    assert_eq!(replacer.size(), 2);

    replacer.set_evictable(FrameId::new(0), false);
    assert_eq!(replacer.size(), 1);

    replacer.remove(FrameId::new(1));
    assert_eq!(replacer.size(), 0);
    assert_eq!(replacer.evict(), None);
}

#[test]
fn test_access_refreshes_victim_order() {
    let replacer = LruKReplacer::new(2, 10);

    replacer.record_access(FrameId::new(0)); // t=0
    replacer.record_access(FrameId::new(0)); // t=1
    replacer.record_access(FrameId::new(1)); // t=2
    replacer.record_access(FrameId::new(1)); // t=3

    // Two fresh accesses push frame 0's k-th most recent access (now t=4)
    // past frame 1's (t=2), so frame 1 becomes the better victim.
    replacer.record_access(FrameId::new(0)); // t=4
    replacer.record_access(FrameId::new(0)); // t=5

    replacer.set_evictable(FrameId::new(0), true);
    replacer.set_evictable(FrameId::new(1), true);

    assert_eq!(replacer.evict(), Some(FrameId::new(1)));
    assert_eq!(replacer.evict(), Some(FrameId::new(0)));
}

#[test]
fn test_concurrent_access() {
    use std::sync::Arc;
    use std::thread;

    let replacer = Arc::new(LruKReplacer::new(2, 100));

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let replacer = Arc::clone(&replacer);
            thread::spawn(move || {
                for i in 0..25 {
                    let frame_id = FrameId::new((t * 25 + i) as u32);
                    replacer.record_access(frame_id);
                    replacer.set_evictable(frame_id, true);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(replacer.size(), 100);
    for _ in 0..100 {
        assert!(replacer.evict().is_some());
    }
    assert_eq!(replacer.size(), 0);
    assert_eq!(replacer.evict(), None);
}
