//! Integration tests for the B+Tree: ordering, balance, sibling chain,
//! fill factor, and round-trips back to the empty tree.

use std::collections::HashSet;
use std::sync::Arc;

use kiln::buffer::BufferPoolManager;
use kiln::common::{IndexKey, PageId, RecordId, SlotId, INVALID_PAGE_ID};
use kiln::index::btree_page::{BTreeInternalPage, BTreeLeafPage, BTreePage};
use kiln::index::BPlusTree;
use kiln::storage::disk::DiskManager;

use tempfile::NamedTempFile;

fn create_bpm(pool_size: usize) -> (Arc<BufferPoolManager>, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let disk_manager = Arc::new(DiskManager::new(temp_file.path()).unwrap());
    let bpm = Arc::new(BufferPoolManager::new(pool_size, 2, disk_manager));
    (bpm, temp_file)
}

fn rid_for(key: IndexKey) -> RecordId {
    RecordId::new(PageId::new(key as u32), SlotId::new((key % 50) as u16))
}

/// Checks every structural invariant: strictly sorted keys, fill bounds on
/// non-root pages, equal leaf depth, and a doubly consistent sibling chain
/// covering exactly the reachable leaves in key order.
fn validate_tree(bpm: &Arc<BufferPoolManager>, tree: &BPlusTree) {
    let root_id = tree.root_page_id().unwrap();
    if root_id == INVALID_PAGE_ID {
        return;
    }

    let mut stack = vec![(root_id, 0usize)];
    let mut leaf_depth = None;
    let mut reachable_leaves = HashSet::new();
    let mut leftmost = None;

    while let Some((page_id, depth)) = stack.pop() {
        let guard = bpm.read_page(page_id).unwrap();
        if BTreePage::new(guard.data()).is_leaf() {
            let leaf = BTreeLeafPage::new(guard.data());
            match leaf_depth {
                None => leaf_depth = Some(depth),
                Some(expected) => assert_eq!(depth, expected, "leaves at unequal depths"),
            }
            reachable_leaves.insert(page_id);
            for i in 1..leaf.size() {
                assert!(leaf.key_at(i - 1) < leaf.key_at(i), "leaf keys out of order");
            }
            if page_id != root_id {
                assert!(leaf.size() >= leaf.min_size(), "leaf under-full");
            }
            assert!(leaf.size() <= leaf.max_size(), "leaf over-full");
            if leaf.prev_page_id().is_none() {
                leftmost = Some(page_id);
            }
        } else {
            let internal = BTreeInternalPage::new(guard.data());
            for i in 2..internal.size() {
                assert!(
                    internal.key_at(i - 1) < internal.key_at(i),
                    "separators out of order"
                );
            }
            if page_id != root_id {
                assert!(internal.size() >= internal.min_size(), "internal under-full");
            } else {
                assert!(internal.size() >= 2, "internal root with a single child");
            }
            assert!(internal.size() <= internal.max_size(), "internal over-full");
            for i in 0..internal.size() {
                stack.push((internal.child_at(i), depth + 1));
            }
        }
    }

    // Walk the forward chain from the leftmost leaf: it must visit every
    // reachable leaf exactly once, in ascending key order, with prev
    // pointers mirroring next pointers.
    let mut chained = Vec::new();
    let mut last_key: Option<IndexKey> = None;
    let mut prev: Option<PageId> = None;
    let mut cursor = Some(leftmost.expect("no leftmost leaf"));
    while let Some(page_id) = cursor {
        let guard = bpm.read_page(page_id).unwrap();
        let leaf = BTreeLeafPage::new(guard.data());
        assert_eq!(leaf.prev_page_id(), prev, "prev pointer does not mirror next");
        for i in 0..leaf.size() {
            let key = leaf.key_at(i);
            if let Some(last) = last_key {
                assert!(last < key, "keys not ascending across the chain");
            }
            last_key = Some(key);
        }
        chained.push(page_id);
        prev = Some(page_id);
        cursor = leaf.next_page_id();
    }
    assert_eq!(chained.len(), reachable_leaves.len(), "chain misses leaves");
    assert!(chained.iter().all(|id| reachable_leaves.contains(id)));
}

fn collect_keys(tree: &BPlusTree) -> Vec<IndexKey> {
    let mut keys = Vec::new();
    let mut iter = tree.begin().unwrap();
    while !iter.is_end() {
        keys.push(iter.entry().0);
        iter.advance().unwrap();
    }
    keys
}

#[test]
fn test_empty_tree() {
    let (bpm, _temp) = create_bpm(16);
    let tree = BPlusTree::new(bpm.clone(), 4, 5).unwrap();

    assert!(tree.is_empty().unwrap());
    assert_eq!(tree.get_value(1).unwrap(), None);
    assert!(tree.begin().unwrap().is_end());
    tree.remove(1).unwrap();
    assert!(tree.is_empty().unwrap());
}

#[test]
fn test_small_tree_scenario() {
    let (bpm, _temp) = create_bpm(32);
    let tree = BPlusTree::new(bpm.clone(), 4, 5).unwrap();

    for key in [5, 4, 3, 2, 1, 6, 7, 8, 9, 10] {
        assert!(tree.insert(key, rid_for(key)).unwrap());
        validate_tree(&bpm, &tree);
    }

    // Ten keys with leaf_max = 4 must have split at least once.
    let root_id = tree.root_page_id().unwrap();
    let root_guard = bpm.read_page(root_id).unwrap();
    assert!(!BTreePage::new(root_guard.data()).is_leaf(), "root must be internal");
    drop(root_guard);

    assert_eq!(collect_keys(&tree), (1..=10).collect::<Vec<_>>());
    for key in 1..=10 {
        assert_eq!(tree.get_value(key).unwrap(), Some(rid_for(key)));
    }
    assert_eq!(tree.get_value(11).unwrap(), None);
}

#[test]
fn test_duplicate_insert_refused() {
    let (bpm, _temp) = create_bpm(16);
    let tree = BPlusTree::new(bpm, 4, 5).unwrap();

    assert!(tree.insert(7, rid_for(7)).unwrap());
    assert!(!tree.insert(7, rid_for(99)).unwrap());
    assert_eq!(tree.get_value(7).unwrap(), Some(rid_for(7)));
}

#[test]
fn test_remove_with_borrow_and_merge() {
    let (bpm, _temp) = create_bpm(32);
    let tree = BPlusTree::new(bpm.clone(), 4, 5).unwrap();

    for key in [5, 4, 3, 2, 1, 6, 7, 8, 9, 10] {
        tree.insert(key, rid_for(key)).unwrap();
    }

    // Low-end removals exercise borrow-from-right and merge-with-right.
    let mut remaining: Vec<IndexKey> = (1..=10).collect();
    for key in [1, 2, 3, 4] {
        tree.remove(key).unwrap();
        remaining.retain(|&k| k != key);
        validate_tree(&bpm, &tree);
        assert_eq!(collect_keys(&tree), remaining);
    }

    // High-end removals exercise borrow-from-left, merge-with-left, and
    // finally the root collapse back to a single leaf.
    for key in [10, 9, 8, 7] {
        tree.remove(key).unwrap();
        remaining.retain(|&k| k != key);
        validate_tree(&bpm, &tree);
        assert_eq!(collect_keys(&tree), remaining);
    }

    // Removing an absent key is a no-op.
    tree.remove(42).unwrap();
    assert_eq!(collect_keys(&tree), remaining);

    for key in [5, 6] {
        tree.remove(key).unwrap();
        validate_tree(&bpm, &tree);
    }
    assert!(tree.is_empty().unwrap());
    assert_eq!(tree.root_page_id().unwrap(), INVALID_PAGE_ID);
}

#[test]
fn test_iterator_lower_bound() {
    let (bpm, _temp) = create_bpm(32);
    let tree = BPlusTree::new(bpm, 4, 5).unwrap();

    for key in [10, 20, 30, 40, 50, 60, 70, 80] {
        tree.insert(key, rid_for(key)).unwrap();
    }

    // Exact hit.
    let iter = tree.begin_at(30).unwrap();
    assert_eq!(iter.entry().0, 30);

    // Between keys: lands on the next greater key.
    let iter = tree.begin_at(35).unwrap();
    assert_eq!(iter.entry().0, 40);

    // Before the smallest key.
    let iter = tree.begin_at(-5).unwrap();
    assert_eq!(iter.entry().0, 10);

    // Past the largest key: the end sentinel.
    let iter = tree.begin_at(99).unwrap();
    assert!(iter.is_end());

    let mut iter = tree.begin_at(45).unwrap();
    let mut tail = Vec::new();
    while !iter.is_end() {
        tail.push(iter.entry().0);
        iter.advance().unwrap();
    }
    assert_eq!(tail, vec![50, 60, 70, 80]);
}

#[test]
#[should_panic]
fn test_end_iterator_deref_panics() {
    let (bpm, _temp) = create_bpm(16);
    let tree = BPlusTree::new(bpm, 4, 5).unwrap();
    tree.end().entry();
}

#[test]
fn test_random_round_trip() {
    use rand::seq::SliceRandom;
    use rand::thread_rng;

    let (bpm, _temp) = create_bpm(64);
    let tree = BPlusTree::new(bpm.clone(), 4, 5).unwrap();

    let mut keys: Vec<IndexKey> = (0..200).collect();
    keys.shuffle(&mut thread_rng());

    for (i, &key) in keys.iter().enumerate() {
        assert!(tree.insert(key, rid_for(key)).unwrap());
        if i % 20 == 0 {
            validate_tree(&bpm, &tree);
        }
    }
    validate_tree(&bpm, &tree);
    assert_eq!(collect_keys(&tree), (0..200).collect::<Vec<_>>());
    for &key in &keys {
        assert_eq!(tree.get_value(key).unwrap(), Some(rid_for(key)));
    }

    keys.shuffle(&mut thread_rng());
    for (i, &key) in keys.iter().enumerate() {
        tree.remove(key).unwrap();
        assert_eq!(tree.get_value(key).unwrap(), None, "key {key} not removed");
        if i % 20 == 0 {
            validate_tree(&bpm, &tree);
        }
    }
    assert!(tree.is_empty().unwrap());
    assert_eq!(tree.root_page_id().unwrap(), INVALID_PAGE_ID);
}

#[test]
fn test_sequential_insert_large_fanout() {
    let (bpm, _temp) = create_bpm(64);
    let tree = BPlusTree::new(bpm.clone(), 16, 16).unwrap();

    for key in 0..1000 {
        tree.insert(key, rid_for(key)).unwrap();
    }
    validate_tree(&bpm, &tree);
    assert_eq!(collect_keys(&tree), (0..1000).collect::<Vec<_>>());

    for key in (0..1000).rev() {
        tree.remove(key).unwrap();
    }
    assert!(tree.is_empty().unwrap());
}

#[test]
fn test_concurrent_disjoint_inserts() {
    use std::thread;

    let (bpm, _temp) = create_bpm(128);
    let tree = Arc::new(BPlusTree::new(bpm.clone(), 8, 8).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let tree = Arc::clone(&tree);
            thread::spawn(move || {
                for i in 0..100 {
                    let key = (t * 100 + i) as IndexKey;
                    assert!(tree.insert(key, rid_for(key)).unwrap());
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    validate_tree(&bpm, &tree);
    assert_eq!(collect_keys(&tree), (0..400).collect::<Vec<_>>());
    for key in 0..400 {
        assert_eq!(tree.get_value(key).unwrap(), Some(rid_for(key)));
    }
}

#[test]
fn test_concurrent_readers_and_writer() {
    use std::thread;

    let (bpm, _temp) = create_bpm(128);
    let tree = Arc::new(BPlusTree::new(bpm, 8, 8).unwrap());

    for key in 0..100 {
        tree.insert(key, rid_for(key)).unwrap();
    }

    let writer = {
        let tree = Arc::clone(&tree);
        thread::spawn(move || {
            for key in 100..300 {
                tree.insert(key, rid_for(key)).unwrap();
            }
        })
    };
    let readers: Vec<_> = (0..3)
        .map(|_| {
            let tree = Arc::clone(&tree);
            thread::spawn(move || {
                // Keys present before the writer started must stay visible.
                for _ in 0..50 {
                    for key in 0..100 {
                        assert_eq!(tree.get_value(key).unwrap(), Some(rid_for(key)));
                    }
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(collect_keys(&tree), (0..300).collect::<Vec<_>>());
}
