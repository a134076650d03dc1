use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

use crate::common::{FrameId, Timestamp};

/// Access history for a single frame. The most recent access is at the
/// front of the deque, so the back is the oldest of the retained k.
#[derive(Debug, Default)]
struct LruKNode {
    history: VecDeque<Timestamp>,
    is_evictable: bool,
}

/// Everything the replacer tracks, behind one latch.
#[derive(Debug, Default)]
struct ReplacerState {
    node_store: HashMap<FrameId, LruKNode>,
    current_ts: Timestamp,
    curr_size: usize,
}

/// LRU-K replacement policy.
///
/// Evicts the evictable frame with the largest backward k-distance, where
/// backward k-distance is `current_ts` minus the timestamp of the k-th most
/// recent access. A frame with fewer than k recorded accesses has +inf
/// distance; all such frames dominate frames with full histories, and among
/// them the one whose oldest recorded access is earliest wins.
pub struct LruKReplacer {
    k: usize,
    num_frames: usize,
    state: Mutex<ReplacerState>,
}

impl LruKReplacer {
    pub fn new(k: usize, num_frames: usize) -> Self {
        assert!(k >= 1, "LRU-K requires k >= 1");
        Self {
            k,
            num_frames,
            state: Mutex::new(ReplacerState::default()),
        }
    }

    /// Picks and removes a victim frame, or returns None if no frame is
    /// evictable. The internal timestamp advances whether or not a victim
    /// is found.
    pub fn evict(&self) -> Option<FrameId> {
        let mut state = self.state.lock();

        let mut inf_victim: Option<(FrameId, Timestamp)> = None;
        let mut reg_victim: Option<(FrameId, Timestamp)> = None;

        for (&fid, node) in state.node_store.iter() {
            if !node.is_evictable {
                continue;
            }
            // back() is the oldest retained access
            let oldest = *node.history.back().expect("recorded frame has history");
            if node.history.len() < self.k {
                if inf_victim.map_or(true, |(_, ts)| oldest < ts) {
                    inf_victim = Some((fid, oldest));
                }
            } else {
                let distance = state.current_ts - oldest;
                if reg_victim.map_or(true, |(_, d)| distance > d) {
                    reg_victim = Some((fid, distance));
                }
            }
        }

        state.current_ts += 1;

        let victim = inf_victim.or(reg_victim).map(|(fid, _)| fid);
        if let Some(fid) = victim {
            state.node_store.remove(&fid);
            state.curr_size -= 1;
        }
        victim
    }

    /// Records an access to the given frame at the current timestamp,
    /// creating its history (non-evictable) on first sight.
    ///
    /// # Panics
    /// Panics if the frame id is outside `[0, num_frames)`.
    pub fn record_access(&self, frame_id: FrameId) {
        assert!(
            frame_id.as_usize() < self.num_frames,
            "frame id {frame_id} out of range"
        );

        let mut state = self.state.lock();
        let ts = state.current_ts;
        let node = state.node_store.entry(frame_id).or_default();
        node.history.push_front(ts);
        node.history.truncate(self.k);
        state.current_ts += 1;
    }

    /// Flips a frame's evictable flag, keeping the evictable count in step.
    ///
    /// # Panics
    /// Panics if the frame id is out of range or has no recorded access.
    pub fn set_evictable(&self, frame_id: FrameId, evictable: bool) {
        assert!(
            frame_id.as_usize() < self.num_frames,
            "frame id {frame_id} out of range"
        );

        let mut state = self.state.lock();
        let node = state
            .node_store
            .get_mut(&frame_id)
            .unwrap_or_else(|| panic!("frame {frame_id} has never been accessed"));
        if node.is_evictable == evictable {
            return;
        }
        node.is_evictable = evictable;
        if evictable {
            state.curr_size += 1;
        } else {
            state.curr_size -= 1;
        }
    }

    /// Erases a frame's history entirely. Unknown frames are a no-op.
    ///
    /// # Panics
    /// Panics if the frame is tracked but not evictable.
    pub fn remove(&self, frame_id: FrameId) {
        let mut state = self.state.lock();
        let Some(node) = state.node_store.get(&frame_id) else {
            return;
        };
        assert!(node.is_evictable, "removing a non-evictable frame");
        state.node_store.remove(&frame_id);
        state.curr_size -= 1;
    }

    /// Number of evictable frames.
    pub fn size(&self) -> usize {
        self.state.lock().curr_size
    }

    pub fn k(&self) -> usize {
        self.k
    }
}
